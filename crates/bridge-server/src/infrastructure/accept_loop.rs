//! The accept loop: admits clients and pairs each with a broker session.
//!
//! This module is responsible for:
//!
//! 1. Accepting incoming client connections from the (already adapted)
//!    listener.
//! 2. Opening one in-process broker session per accepted connection —
//!    synchronously, before the next accept, so a functioning pair exists
//!    before admission continues.
//! 3. Spawning a [`relay::bridge`] task per pair, tracked in a
//!    [`tokio::task::JoinSet`] so shutdown can wait for every in-flight
//!    bridge to drain.
//! 4. Exiting on the shutdown signal or a terminal accept error, then
//!    closing the listener and draining all bridges before returning.
//!
//! # Scalability
//!
//! Each bridge runs in its own Tokio task; the accept loop never waits on an
//! individual relay.  There is deliberately **no** backpressure or admission
//! control here: every accepted connection gets a bridge, and resource
//! limits are delegated to the host and the broker engine.
//!
//! # Ownership
//!
//! The loop owns the listener outright.  Closing it happens exactly once, by
//! drop, when the loop winds down — there is no second owner that could race
//! a close, so "close must be safe to call twice" holds by construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_core::{Broker, ShutdownController, ShutdownSignal};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::infrastructure::relay;

/// Runs the accept loop until the shutdown signal fires or the listener
/// reports a terminal error, then drains every in-flight bridge.
///
/// Either exit path calls `controller.trigger()` before draining — the
/// loop-exit notification the shutdown coordinator listens for, and the
/// reason a dying listener drives the same teardown as an explicit shutdown
/// request.  The trigger is idempotent, so the paths may overlap freely.
///
/// Blocks the calling task until the last bridge has finished.
pub async fn run_accept_loop<B: Broker>(
    listener: TcpListener,
    broker: Arc<B>,
    mut signal: ShutdownSignal,
    controller: Arc<ShutdownController>,
) {
    // In-flight bridges.  The JoinSet is the counted completion group that
    // drain-on-shutdown waits on.
    let mut bridges: JoinSet<()> = JoinSet::new();

    // Connection ids label log lines; they carry no protocol meaning.
    let conn_ids = AtomicU64::new(0);

    loop {
        tokio::select! {
            _ = signal.triggered() => {
                info!("shutdown signal received; closing listener");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((client, peer_addr)) => {
                        let conn_id = conn_ids.fetch_add(1, Ordering::Relaxed);
                        info!("conn {conn_id}: accepted connection from {peer_addr}");

                        // Open the session before the next accept.  A failure
                        // here is local: close this client and keep going.
                        match broker.open_session().await {
                            Ok(session) => {
                                bridges.spawn(async move {
                                    relay::bridge(conn_id, client, session).await;
                                });
                            }
                            Err(e) => {
                                warn!("conn {conn_id}: failed to open broker session: {e}");
                                drop(client);
                            }
                        }
                    }
                    Err(e) => {
                        // Terminal: the listener is gone (closed by the host,
                        // or the process is out of descriptors in a way that
                        // will not heal).  This is the normal shutdown
                        // trigger, not a crash.
                        warn!("accept failed; stopping accept loop: {e}");
                        break;
                    }
                }
            }
        }
    }

    // Loop-exit notification.  Idempotent, so it does not matter whether the
    // loop stopped because of this very trigger or a listener error.
    controller.trigger();

    // Close the listener before draining so connection attempts from here on
    // fail immediately instead of queueing in the backlog.
    drop(listener);

    let in_flight = bridges.len();
    if in_flight > 0 {
        info!("draining {in_flight} in-flight bridge(s)");
    }
    while let Some(joined) = bridges.join_next().await {
        if let Err(e) = joined {
            // A bridge panicking must not take the drain down with it.
            warn!("bridge task failed: {e}");
        }
    }
    debug!("accept loop stopped; all bridges drained");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use bridge_core::BrokerOptions;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::infrastructure::loopback::LoopbackBroker;

    fn started_broker() -> Arc<LoopbackBroker> {
        let broker = Arc::new(LoopbackBroker::new(BrokerOptions::default()));
        broker.start().expect("loopback broker must start");
        broker
    }

    #[tokio::test]
    async fn test_loop_exits_promptly_when_signal_fired_before_start() {
        // Arrange — trigger *before* the loop ever runs; the stored signal
        // must still be observed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let broker = started_broker();
        let (controller, signal) = bridge_core::ShutdownController::new();
        let controller = Arc::new(controller);
        controller.trigger();

        // Act / Assert — bounded so a regression cannot hang the suite
        tokio::time::timeout(
            Duration::from_secs(1),
            run_accept_loop(listener, broker, signal, Arc::clone(&controller)),
        )
        .await
        .expect("loop must exit without accepting anything");
    }

    #[tokio::test]
    async fn test_accepted_connection_is_bridged_to_a_session() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broker = started_broker();
        let (controller, signal) = bridge_core::ShutdownController::new();
        let controller = Arc::new(controller);

        let loop_task = tokio::spawn(run_accept_loop(
            listener,
            Arc::clone(&broker),
            signal,
            Arc::clone(&controller),
        ));

        // Act — speak the loopback broker's line protocol through the bridge
        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client.write_all(b"PING\n").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();

        // Assert
        assert_eq!(&buf, b"PONG\n");

        // Cleanup — close the client, then shut the loop down
        drop(client);
        controller.trigger();
        broker.shutdown();
        tokio::time::timeout(Duration::from_secs(2), loop_task)
            .await
            .expect("loop must drain and stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_loop_exit_notifies_the_controller() {
        // Arrange — shutdown via the broker is irrelevant here; we only care
        // that a stopped loop fires the loop-exit notification
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let broker = started_broker();
        let (controller, signal) = bridge_core::ShutdownController::new();
        let controller = Arc::new(controller);

        // Act — stop the loop through its own signal, then check the
        // controller state afterwards
        controller.trigger();
        run_accept_loop(listener, broker, signal, Arc::clone(&controller)).await;

        // Assert
        assert!(controller.is_triggered());
    }
}
