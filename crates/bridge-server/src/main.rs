//! SockBridge server — entry point.
//!
//! This binary bridges client connections arriving on a single inherited
//! socket handle to a message broker embedded in the same process.  The
//! broker never listens on any network socket; clients reach it exclusively
//! through the bridge, which relays bytes verbatim between each accepted
//! connection and a dedicated in-process broker session.
//!
//! # Why an inherited descriptor?
//!
//! In the sandboxed-host deployment the process is not allowed to open
//! listening sockets itself.  The host binds and listens on the socket
//! before launch and hands the descriptor over at a conventional number
//! (fd 3).  The bridge adapts that descriptor into an ordinary async
//! listener; `--bind` selects a normally bound listener instead for direct
//! deployment and local testing.
//!
//! # Usage
//!
//! ```text
//! bridge-server [OPTIONS]
//!
//! Options:
//!   --store <DIR>             Broker store directory; omit to disable persistence
//!   --client-advertise <ADDR> Address advertised to clients [default: 127.0.0.1:4222]
//!   --inherit-fd <FD>         Inherited listening descriptor [default: 3]
//!   --ready-timeout <SECS>    Broker readiness wait [default: 15]
//!   --bind <ADDR>             Bind a fresh listener instead of adapting a descriptor
//! ```
//!
//! # Environment variable overrides
//!
//! The CLI defaults can also be overridden with environment variables.
//! CLI args take precedence when both are present.
//!
//! | Variable                  | Default          | Description                   |
//! |---------------------------|------------------|-------------------------------|
//! | `BRIDGE_STORE`            | (unset)          | Broker store directory        |
//! | `BRIDGE_CLIENT_ADVERTISE` | `127.0.0.1:4222` | Advertised client address     |
//! | `BRIDGE_INHERIT_FD`       | `3`              | Inherited descriptor number   |
//! | `BRIDGE_READY_TIMEOUT`    | `15`             | Readiness wait (seconds)      |
//! | `BRIDGE_BIND`             | (unset)          | Direct-bind listener address  |
//!
//! # Shutdown
//!
//! No OS signal handlers are installed — the sandboxed host stops delivering
//! socket readiness correctly when the guest binds signals.  Shutdown is
//! purely programmatic via [`BridgeService::shutdown_handle`]; this binary
//! runs until the host tears the process down or the broker stops on its
//! own.
//!
//! # Exit codes
//!
//! `0` on clean shutdown; non-zero when the broker fails to become ready
//! within the timeout or the listening socket cannot be constructed.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bridge_core::BrokerOptions;
use bridge_server::application::BridgeService;
use bridge_server::domain::{ListenerSource, ServerConfig, DEFAULT_INHERITED_FD};
use bridge_server::infrastructure::LoopbackBroker;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// SockBridge server.
///
/// Accepts client connections on an inherited socket handle and bridges each
/// one to a dedicated in-process session of the embedded broker.
#[derive(Debug, Parser)]
#[command(
    name = "bridge-server",
    about = "Bridges an inherited listening socket to an embedded message broker",
    version
)]
struct Cli {
    /// Storage directory for the embedded broker.
    ///
    /// Omitting the flag (or passing an empty value) disables persistent
    /// mode entirely.
    #[arg(long, env = "BRIDGE_STORE")]
    store: Option<PathBuf>,

    /// Address advertised to connecting clients.
    ///
    /// The broker does not bind this address — clients reach it through the
    /// bridge — but broker protocols commonly echo an advertised address in
    /// their connect handshake.
    #[arg(long, default_value = "127.0.0.1:4222", env = "BRIDGE_CLIENT_ADVERTISE")]
    client_advertise: String,

    /// Descriptor number of the inherited listening socket, as agreed with
    /// the host process.
    #[arg(long, default_value_t = DEFAULT_INHERITED_FD, env = "BRIDGE_INHERIT_FD")]
    inherit_fd: i32,

    /// Seconds to wait for the broker to become ready before aborting.
    #[arg(long, default_value_t = 15, env = "BRIDGE_READY_TIMEOUT")]
    ready_timeout: u64,

    /// Bind a fresh TCP listener on this address instead of adapting an
    /// inherited descriptor.
    ///
    /// Intended for direct deployment and local testing outside a sandboxed
    /// host; when set, `--inherit-fd` is ignored.
    #[arg(long, env = "BRIDGE_BIND")]
    bind: Option<SocketAddr>,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ServerConfig`].
    fn into_server_config(self) -> ServerConfig {
        let listener = match self.bind {
            Some(addr) => ListenerSource::Bind { addr },
            None => ListenerSource::Inherited {
                fd: self.inherit_fd,
            },
        };

        // An empty --store means "no store", matching the flag convention of
        // the host tooling that launches this binary.
        let store_dir = self.store.filter(|dir| !dir.as_os_str().is_empty());

        ServerConfig {
            listener,
            ready_timeout: Duration::from_secs(self.ready_timeout),
            broker: BrokerOptions {
                store_dir,
                client_advertise: self.client_advertise,
                ..BrokerOptions::default()
            },
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_server_config();

    info!(
        "SockBridge starting — listener={:?}, advertise={}",
        config.listener, config.broker.client_advertise
    );

    let broker = Arc::new(LoopbackBroker::new(config.broker.clone()));
    let service = BridgeService::new(config, broker);

    // Deliberately no Ctrl+C / signal wiring (see the module docs).  The
    // handle is where a host-specific launcher would attach its own stop
    // mechanism.
    let _shutdown = service.shutdown_handle();

    service
        .run()
        .await
        .context("bridge terminated with a fatal startup error")?;
    Ok(())
}
