//! Listener construction: inherited-descriptor adaptation and direct bind.
//!
//! In the sandboxed-host deployment this process never calls `bind()` or
//! `listen()` itself.  The host opens the socket, binds it, starts it
//! listening, and then launches the bridge with the descriptor inherited at
//! a conventional number (see
//! [`DEFAULT_INHERITED_FD`](crate::domain::DEFAULT_INHERITED_FD)).  The
//! adapter's job is to turn that raw integer into an ordinary
//! [`tokio::net::TcpListener`]:
//!
//! 1. Take sole ownership of the descriptor (`from_raw_fd` — ownership
//!    transfers exactly once; the bridge is responsible for eventual
//!    closure).
//! 2. Validate that it actually refers to a socket (`local_addr`).
//! 3. Mark it non-blocking.  Hosts deliver the descriptor in blocking mode
//!    by default, which would stall the whole runtime on the first accept.
//! 4. Register it with the tokio reactor.
//!
//! On any failure the descriptor is closed on drop and left in an undefined
//! state — the caller must not retry adaptation on the same handle.  No
//! intermediate wrapper survives a successful adaptation; only the derived
//! listener remains live.
//!
//! The direct-bind path exists so the accept loop and relay can be exercised
//! without any host-specific descriptor plumbing (see the redesign notes in
//! DESIGN.md).

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::debug;

use crate::domain::ListenerSource;

/// Error type for listener construction.
#[derive(Debug, Error)]
pub enum AdaptError {
    /// The descriptor does not refer to a usable socket (bad number, closed,
    /// or a non-socket resource such as a file).
    #[error("descriptor {fd} does not refer to a usable socket: {source}")]
    InvalidHandle {
        fd: i32,
        #[source]
        source: std::io::Error,
    },

    /// The descriptor is a socket but could not be switched to non-blocking
    /// mode.
    #[error("failed to set descriptor {fd} non-blocking: {source}")]
    Configuration {
        fd: i32,
        #[source]
        source: std::io::Error,
    },

    /// Direct bind failed (port in use, missing permission, bad address).
    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Inherited descriptors only exist on Unix-like hosts.
    #[error("inherited descriptors are not supported on this platform")]
    Unsupported,
}

/// Turns the configured [`ListenerSource`] into a live async listener.
///
/// # Errors
///
/// Returns [`AdaptError::InvalidHandle`] / [`AdaptError::Configuration`] for
/// the inherited path and [`AdaptError::Bind`] for the direct path.  An
/// inherited-path error consumes the descriptor; do not retry with the same
/// handle.
pub async fn open_listener(source: &ListenerSource) -> Result<TcpListener, AdaptError> {
    match source {
        ListenerSource::Inherited { fd } => adapt_inherited(*fd),
        ListenerSource::Bind { addr } => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| AdaptError::Bind {
                    addr: *addr,
                    source,
                })?;
            debug!("bound listener on {}", addr);
            Ok(listener)
        }
    }
}

/// Adapts a pre-opened, already-listening descriptor into a
/// [`tokio::net::TcpListener`].
///
/// # Preconditions
///
/// `fd` must refer to a bound, listening TCP socket owned by the caller and
/// not otherwise in use.  Ownership transfers to the returned listener.
///
/// # Errors
///
/// See [`AdaptError`].  On error the descriptor has already been closed.
#[cfg(unix)]
pub fn adapt_inherited(fd: i32) -> Result<TcpListener, AdaptError> {
    use std::os::unix::io::FromRawFd;

    // SAFETY: the host hands this descriptor to the process exactly once and
    // nothing else in the bridge touches it by number; the std listener
    // becomes its sole owner and closes it on drop (including every error
    // path below).
    let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };

    // Validate before configuring: getsockname fails with ENOTSOCK/EBADF for
    // anything that is not a live socket, which is the distinction the two
    // error variants draw.
    if let Err(source) = std_listener.local_addr() {
        return Err(AdaptError::InvalidHandle { fd, source });
    }

    // The host delivers the descriptor in blocking mode by default.  A
    // blocking accept would stall the entire runtime, and the tokio reactor
    // refuses to register blocking sockets.
    std_listener
        .set_nonblocking(true)
        .map_err(|source| AdaptError::Configuration { fd, source })?;

    let listener = TcpListener::from_std(std_listener)
        .map_err(|source| AdaptError::InvalidHandle { fd, source })?;

    debug!("adapted inherited descriptor {fd} into a listener");
    Ok(listener)
}

/// Stub for non-Unix targets, where descriptor inheritance does not exist.
/// The direct-bind path still works everywhere.
#[cfg(not(unix))]
pub fn adapt_inherited(fd: i32) -> Result<TcpListener, AdaptError> {
    let _ = fd;
    Err(AdaptError::Unsupported)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
