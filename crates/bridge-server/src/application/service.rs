//! BridgeService: startup sequencing and coordinated, drain-aware shutdown.
//!
//! The service drives the whole lifecycle:
//!
//! ```text
//! run()
//!  ├─ broker.start()                        (fatal on failure)
//!  ├─ broker.ready_for_connections(timeout) (fatal on timeout)
//!  ├─ open_listener(config.listener)        (fatal on failure)
//!  ├─ spawn shutdown coordinator            Running → Draining on trigger
//!  ├─ run_accept_loop(...)                  accepts, bridges, drains
//!  ├─ broker.wait_for_shutdown()
//!  └─ publish Stopped
//! ```
//!
//! # The shutdown state machine
//!
//! `Running → Draining` happens when the external trigger fires *or* the
//! accept loop dies on a terminal listener error (the loop reports its exit
//! through the same idempotent trigger, so both paths converge).  The
//! coordinator then requests broker shutdown, which makes every open session
//! reach end-of-stream — that is what unblocks bridges whose client side is
//! a long-lived idle producer.  The listener itself is closed by the accept
//! loop, which observes the same signal.
//!
//! `Draining → Stopped` requires all three of: the accept loop has exited,
//! every in-flight bridge has finished (the loop drains its completion group
//! before returning), and the broker reports shutdown complete.
//!
//! Fatal startup errors attempt a best-effort broker teardown before
//! surfacing, so a half-started process never leaves the engine running.

use std::sync::Arc;
use std::time::Duration;

use bridge_core::{Broker, BrokerError, ShutdownController, ShutdownSignal};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::ServerConfig;
use crate::infrastructure::accept_loop::run_accept_loop;
use crate::infrastructure::listener::{open_listener, AdaptError};

/// The coarse lifecycle of the bridge, published for observers and tests.
/// Transitions are monotonic: `Running → Draining → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Accepting connections (or still starting up).
    Running,
    /// Shutdown requested: no new admissions, in-flight bridges finishing.
    Draining,
    /// Accept loop exited, all bridges drained, broker fully stopped.
    Stopped,
}

/// Startup errors that abort the process.
///
/// Everything else — session-open failures, relay errors, terminal accept
/// errors — is absorbed locally and never reaches this type.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The embedded broker engine failed to boot.
    #[error("broker failed to start: {0}")]
    BrokerStartup(#[source] BrokerError),

    /// The engine never became ready for connections.  Carries the elapsed
    /// wait so a misconfigured timeout is diagnosable from the log line.
    #[error("broker not ready for connections after {waited:?}")]
    BrokerNotReady { waited: Duration },

    /// The listening socket could not be constructed.  The underlying
    /// [`AdaptError`] names the offending descriptor or address.
    #[error("failed to open the client listener: {0}")]
    Listener(#[from] AdaptError),
}

/// Orchestrates one bridge instance around a broker engine `B`.
pub struct BridgeService<B: Broker> {
    config: ServerConfig,
    broker: Arc<B>,
    controller: Arc<ShutdownController>,
    signal: ShutdownSignal,
    state_tx: watch::Sender<LifecycleState>,
}

impl<B: Broker> BridgeService<B> {
    /// Builds a service around an engine.  Nothing starts until
    /// [`run`](Self::run).
    pub fn new(config: ServerConfig, broker: Arc<B>) -> Self {
        let (controller, signal) = ShutdownController::new();
        let (state_tx, _) = watch::channel(LifecycleState::Running);
        Self {
            config,
            broker,
            controller: Arc::new(controller),
            signal,
            state_tx,
        }
    }

    /// The programmatic shutdown trigger.
    ///
    /// The embedding decides what gets wired to it — an admin endpoint, a
    /// host callback, a test harness.  Safe to trigger at any time,
    /// including before [`run`](Self::run) has been called, and safe to
    /// trigger repeatedly.
    pub fn shutdown_handle(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.controller)
    }

    /// Watches lifecycle transitions.  Mostly useful to tests asserting the
    /// drain ordering.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Runs the bridge to completion.
    ///
    /// Blocks until shutdown has fully finished (accept loop exited, bridges
    /// drained, broker stopped).
    ///
    /// # Errors
    ///
    /// Returns a [`FatalError`] only for startup failures; a triggered
    /// shutdown is the *success* path.
    pub async fn run(self) -> Result<(), FatalError> {
        let Self {
            config,
            broker,
            controller,
            signal,
            state_tx,
        } = self;

        broker.start().map_err(FatalError::BrokerStartup)?;
        if !config.broker.persistence_enabled() {
            warn!("running without a persistent store");
        }

        if !broker.ready_for_connections(config.ready_timeout).await {
            // Best-effort teardown so a half-started engine does not linger.
            broker.shutdown();
            broker.wait_for_shutdown().await;
            return Err(FatalError::BrokerNotReady {
                waited: config.ready_timeout,
            });
        }
        info!("broker ready for connections");

        let listener = match open_listener(&config.listener).await {
            Ok(listener) => listener,
            Err(e) => {
                broker.shutdown();
                broker.wait_for_shutdown().await;
                return Err(FatalError::Listener(e));
            }
        };

        // The coordinator waits for the trigger — external, or fired by the
        // accept loop itself on exit — and requests broker shutdown.  The
        // listener close happens in the accept loop, which observes the same
        // signal.
        let coordinator = tokio::spawn(coordinate(
            signal.clone(),
            Arc::clone(&broker),
            state_tx.clone(),
        ));

        info!("accepting connections");
        run_accept_loop(listener, Arc::clone(&broker), signal, Arc::clone(&controller)).await;

        // The loop has exited and every bridge has drained; the trigger has
        // fired (the loop guarantees it), so the coordinator has requested —
        // or is about to request — broker shutdown.
        broker.wait_for_shutdown().await;
        if let Err(e) = coordinator.await {
            warn!("shutdown coordinator task failed: {e}");
        }

        let _ = state_tx.send(LifecycleState::Stopped);
        info!("bridge stopped");
        Ok(())
    }
}

/// The shutdown coordinator: one await on the trigger, then teardown.
async fn coordinate<B: Broker>(
    mut signal: ShutdownSignal,
    broker: Arc<B>,
    state_tx: watch::Sender<LifecycleState>,
) {
    signal.triggered().await;
    let _ = state_tx.send(LifecycleState::Draining);
    info!("shutdown requested; draining connections");
    broker.shutdown();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
//
// The full lifecycle (accept, bridge, drain, stop) is covered by the
// integration tests in tests/bridge_integration.rs; the unit tests here pin
// down the fatal startup paths, which need uncooperative broker stubs.

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::DuplexStream;

    use crate::domain::ListenerSource;

    /// A broker that starts fine but never becomes ready.  Records whether
    /// the service attempted the best-effort teardown.
    struct NeverReadyBroker {
        shutdown_requested: AtomicBool,
    }

    impl NeverReadyBroker {
        fn new() -> Self {
            Self {
                shutdown_requested: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Broker for NeverReadyBroker {
        type Session = DuplexStream;

        fn start(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn ready_for_connections(&self, _timeout: Duration) -> bool {
            false
        }

        async fn open_session(&self) -> Result<DuplexStream, BrokerError> {
            Err(BrokerError::NotRunning)
        }

        fn shutdown(&self) {
            self.shutdown_requested.store(true, Ordering::SeqCst);
        }

        async fn wait_for_shutdown(&self) {}
    }

    /// A broker that refuses to boot at all.
    struct BrokenBroker;

    #[async_trait]
    impl Broker for BrokenBroker {
        type Session = DuplexStream;

        fn start(&self) -> Result<(), BrokerError> {
            Err(BrokerError::Startup {
                reason: "store directory is not writable".to_string(),
            })
        }

        async fn ready_for_connections(&self, _timeout: Duration) -> bool {
            false
        }

        async fn open_session(&self) -> Result<DuplexStream, BrokerError> {
            Err(BrokerError::NotRunning)
        }

        fn shutdown(&self) {}

        async fn wait_for_shutdown(&self) {}
    }

    fn bind_config() -> ServerConfig {
        ServerConfig {
            listener: ListenerSource::Bind {
                addr: "127.0.0.1:0".parse().unwrap(),
            },
            ready_timeout: Duration::from_millis(50),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_broker_that_never_readies_is_fatal_and_torn_down() {
        // Arrange
        let broker = Arc::new(NeverReadyBroker::new());
        let service = BridgeService::new(bind_config(), Arc::clone(&broker));

        // Act
        let result = service.run().await;

        // Assert — fatal error carries the elapsed wait, and the engine was
        // shut down best-effort before aborting
        match result {
            Err(FatalError::BrokerNotReady { waited }) => {
                assert_eq!(waited, Duration::from_millis(50));
            }
            other => panic!("expected BrokerNotReady, got {other:?}"),
        }
        assert!(broker.shutdown_requested.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_broker_startup_failure_is_fatal() {
        // Arrange
        let service = BridgeService::new(bind_config(), Arc::new(BrokenBroker));

        // Act
        let result = service.run().await;

        // Assert
        assert!(matches!(result, Err(FatalError::BrokerStartup(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unusable_inherited_descriptor_is_fatal() {
        use crate::infrastructure::LoopbackBroker;
        use bridge_core::BrokerOptions;

        // Arrange — a descriptor number nothing in this process opened
        let config = ServerConfig {
            listener: ListenerSource::Inherited { fd: 741 },
            ready_timeout: Duration::from_millis(50),
            ..ServerConfig::default()
        };
        let service = BridgeService::new(
            config,
            Arc::new(LoopbackBroker::new(BrokerOptions::default())),
        );

        // Act
        let result = service.run().await;

        // Assert
        assert!(matches!(
            result,
            Err(FatalError::Listener(AdaptError::InvalidHandle { fd: 741, .. }))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_starts_in_running() {
        let service = BridgeService::new(bind_config(), Arc::new(NeverReadyBroker::new()));
        assert_eq!(*service.lifecycle().borrow(), LifecycleState::Running);
    }
}
