//! Programmatic shutdown: a one-way, idempotent cancellation handle.
//!
//! SockBridge deliberately installs **no OS signal handlers** — the sandboxed
//! hosts it is deployed under stop delivering socket readiness correctly once
//! the guest binds signals.  Instead, shutdown is modelled as a single
//! process-wide boolean that transitions exactly once from *not signalled* to
//! *signalled*:
//!
//! - [`ShutdownController::trigger`] flips the state.  Calling it again is a
//!   no-op, never an error or a panic.
//! - [`ShutdownSignal::triggered`] awaits the transition.  Because the state
//!   is *stored* (a `tokio::sync::watch` channel, not a broadcast event), a
//!   waiter that starts after the trigger fired resolves immediately — the
//!   signal is never lost, even if it fires before the accept loop exists.
//!
//! The controller is what the outermost embedding wires its own stop
//! mechanism to (an admin endpoint, a host callback, a test); the signal is
//! what the accept loop and the shutdown coordinator select on.

use tokio::sync::watch;

/// The triggering side of the shutdown handshake.
///
/// Usually wrapped in an `Arc` and shared between the embedding (which may
/// trigger it) and the accept loop (which triggers it on loop exit so that
/// a terminal accept error drives the same teardown path as an explicit
/// request).
#[derive(Debug)]
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// The awaiting side of the shutdown handshake.  Cheap to clone; every
/// component that needs to observe cancellation holds its own copy.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownController {
    /// Creates a fresh controller/signal pair in the *not signalled* state.
    pub fn new() -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownSignal { rx })
    }

    /// Fires the shutdown signal.
    ///
    /// The transition is one-way and idempotent: the first call wakes every
    /// waiter, later calls change nothing.
    pub fn trigger(&self) {
        // `send` only fails when no receiver exists, in which case there is
        // nobody left to wake and the stored value is irrelevant.
        let _ = self.tx.send(true);
    }

    /// Returns `true` once [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates an additional waiter bound to this controller.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// Waits until the shutdown signal fires.
    ///
    /// Resolves immediately if it already fired — including when the trigger
    /// happened before this waiter was created.  A dropped controller is
    /// treated as a fired signal: with nobody left able to trigger, waiting
    /// forever would wedge teardown.
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    /// Non-blocking check of the current state.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
