//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It can be constructed from CLI arguments (preferred for production) or
//! from sensible defaults (useful for local development and tests).
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) makes the bridge easy to embed in tests
//! and in host-specific launchers.  `main.rs` is responsible for populating
//! the struct from CLI args or environment variables.

use std::time::Duration;

use bridge_core::BrokerOptions;

/// The descriptor number conventionally agreed with the host process for the
/// inherited listening socket.  Descriptors 0–2 are stdio; the first
/// host-provided resource lands on 3.
pub const DEFAULT_INHERITED_FD: i32 = 3;

/// Where the listening socket comes from.
///
/// The bridge supports two listener constructions, selected by
/// configuration so the accept loop and relay can be exercised without any
/// host-specific descriptor plumbing:
///
/// - [`ListenerSource::Inherited`] — the sandboxed-host deployment.  The
///   host opens, binds, and listens on the socket *before* this process
///   starts, then hands over the raw descriptor.  Ownership of the
///   descriptor transfers to the bridge exactly once.
/// - [`ListenerSource::Bind`] — direct deployment and tests.  The bridge
///   binds an ordinary TCP listener itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerSource {
    /// Adapt a pre-opened, already-listening descriptor supplied by the host.
    Inherited {
        /// The raw descriptor number.  Stored as a plain integer here so the
        /// domain layer stays free of platform-specific descriptor types.
        fd: i32,
    },
    /// Bind a fresh TCP listener on the given address.
    Bind {
        /// Address to bind, e.g. `127.0.0.1:0` in tests to get an ephemeral
        /// port.
        addr: std::net::SocketAddr,
    },
}

/// All runtime configuration for the bridge server.
///
/// Build this struct once at startup and hand it to
/// [`BridgeService`](crate::application::BridgeService).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Where the listening socket comes from.
    pub listener: ListenerSource,

    /// Maximum time to wait for the embedded broker to become ready for
    /// connections before aborting startup.
    pub ready_timeout: Duration,

    /// Options handed to the embedded broker engine (store directory,
    /// advertised client address).
    pub broker: BrokerOptions,
}

impl Default for ServerConfig {
    /// Returns the configuration the sandboxed-host deployment uses when no
    /// flags are given: inherited descriptor 3 and a 15 second ready wait.
    fn default() -> Self {
        Self {
            listener: ListenerSource::Inherited {
                fd: DEFAULT_INHERITED_FD,
            },
            ready_timeout: Duration::from_secs(15),
            broker: BrokerOptions::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
