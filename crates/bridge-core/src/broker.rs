//! The embedded-broker facade.
//!
//! The bridge treats the message broker as an external collaborator reached
//! exclusively through the [`Broker`] trait.  The trait mirrors the lifecycle
//! of an embedded broker engine that does not listen on any network socket:
//!
//! 1. [`Broker::start`] boots the engine.
//! 2. [`Broker::ready_for_connections`] blocks (up to a timeout) until the
//!    engine can admit sessions.
//! 3. [`Broker::open_session`] opens one in-process duplex byte stream per
//!    external client — the broker's *internal* entry point.
//! 4. [`Broker::shutdown`] requests teardown; [`Broker::wait_for_shutdown`]
//!    blocks until the engine and all of its sessions have fully stopped.
//!
//! # Why a trait?
//!
//! The deployable engine is supplied by the embedding (the reference
//! deployment embeds a full messaging engine; tests use a loopback stand-in).
//! Everything in the server crate is generic over `B: Broker`, so the accept
//! loop and the relay can be exercised without any real broker at all.
//!
//! # Thread safety
//!
//! Implementations must be internally thread-safe (`Send + Sync`): the facade
//! is a read-mostly shared reference used concurrently to originate new
//! sessions and to issue shutdown.  No external locking is applied around it.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Error type for broker facade operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The engine has not been started, or has already been shut down.
    #[error("broker is not running")]
    NotRunning,

    /// The engine refused to open a new internal session.
    ///
    /// This is a *per-connection* failure: the accept loop closes the
    /// affected client connection and keeps admitting others.
    #[error("broker refused to open a session: {reason}")]
    SessionRefused { reason: String },

    /// The engine failed to boot.  Always fatal to the process.
    #[error("broker failed to start: {reason}")]
    Startup { reason: String },
}

/// Startup options handed to the embedded broker engine.
///
/// Populated from the CLI by the server binary and passed through the facade
/// untouched; the bridge core attaches no meaning to these values beyond the
/// persistence toggle.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Human-readable engine name used in log output.
    pub name: String,

    /// Directory for the engine's persistent message store.
    ///
    /// `None` disables persistent mode entirely.  Engines that support
    /// durable streams enable them exactly when a store directory is given.
    pub store_dir: Option<PathBuf>,

    /// The address advertised to connecting clients.
    ///
    /// The engine does not bind this address — clients reach it through the
    /// bridge — but broker protocols commonly echo an advertised address in
    /// their connect handshake, so it is configurable here.
    pub client_advertise: String,
}

impl BrokerOptions {
    /// Returns `true` when a store directory is configured.
    ///
    /// Persistence is derived from the store directory rather than being a
    /// separate flag, so the two can never disagree.
    pub fn persistence_enabled(&self) -> bool {
        self.store_dir.is_some()
    }
}

impl Default for BrokerOptions {
    /// Defaults suitable for local development: no persistent store, and the
    /// conventional loopback advertise address.
    fn default() -> Self {
        Self {
            name: "sockbridge".to_string(),
            store_dir: None,
            client_advertise: "127.0.0.1:4222".to_string(),
        }
    }
}

/// The facade through which the bridge drives an embedded broker engine.
///
/// See the module documentation for the lifecycle contract.  All methods may
/// be called concurrently from multiple tasks.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// The in-process duplex byte stream connecting one external client to
    /// the engine.  A session must never outlive, or be reused across,
    /// client connections — the bridge opens exactly one per accepted client
    /// and closes it when that client's relay terminates.
    type Session: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Boots the engine.  Must be called before any other operation.
    fn start(&self) -> Result<(), BrokerError>;

    /// Waits until the engine can admit sessions, up to `timeout`.
    ///
    /// Returns `false` if the engine did not become ready in time.  The
    /// caller treats that as a fatal startup error.
    async fn ready_for_connections(&self, timeout: Duration) -> bool;

    /// Opens one new internal session.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not running or refuses the session.
    /// Failures here are local to one client connection.
    async fn open_session(&self) -> Result<Self::Session, BrokerError>;

    /// Requests engine teardown.  Must be idempotent: a second call is a
    /// no-op, never a panic.  Shutting down causes every open session to
    /// reach end-of-stream, which is what unblocks in-flight relays.
    fn shutdown(&self);

    /// Blocks until the engine and all of its sessions have fully stopped.
    ///
    /// Resolves only after [`Broker::shutdown`] has been requested (by any
    /// caller) and the last session has drained.
    async fn wait_for_shutdown(&self);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
