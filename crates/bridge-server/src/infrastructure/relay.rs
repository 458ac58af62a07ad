//! The connection bridge: bidirectional byte relay for one client/session pair.
//!
//! Each accepted client connection is paired with exactly one in-process
//! broker session.  [`bridge`] owns both streams for the lifetime of the
//! pair and copies bytes in both directions *concurrently* — either peer may
//! be a long-lived producer while the other stays idle, so the directions
//! must never run sequentially.
//!
//! # Termination model
//!
//! A direction ends when its source reaches end-of-stream or errors.  The
//! moment *either* direction ends, the whole pair is torn down: both copy
//! futures live in the same task and are joined by `tokio::select!`, so the
//! surviving direction is cancelled synchronously when the function returns
//! and both connections are closed exactly once by drop.  Half-close is
//! deliberately not preserved — this is a full-duplex-or-nothing relay.
//!
//! Copy errors are local to the pair: they are logged and absorbed here,
//! never surfaced to the accept loop or the process.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Buffer size for each copy direction.
const RELAY_BUFFER: usize = 8 * 1024;

/// Byte counts observed by a finished bridge, for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Bytes relayed client → session.
    pub to_session: u64,
    /// Bytes relayed session → client.
    pub to_client: u64,
}

/// Relays bytes between one client connection and its broker session until
/// either side closes, then closes both sides and returns.
///
/// `conn_id` only labels log lines.  The function never returns an error:
/// relay failures are a normal way for a connection pair to end.
pub async fn bridge<C, S>(conn_id: u64, client: C, session: S) -> RelayOutcome
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut session_read, mut session_write) = tokio::io::split(session);

    let mut outcome = RelayOutcome::default();

    // Both directions run concurrently in this task.  select! returns as
    // soon as one of them ends; dropping the other future cancels it on the
    // spot, which is what tears the pair down as a unit.
    let (direction, result) = {
        let forward = copy_until_end(&mut client_read, &mut session_write, &mut outcome.to_session);
        let backward = copy_until_end(&mut session_read, &mut client_write, &mut outcome.to_client);

        tokio::select! {
            res = forward => ("client→session", res),
            res = backward => ("session→client", res),
        }
    };

    match result {
        Ok(()) => debug!("conn {conn_id}: {direction} relay reached end of stream"),
        Err(e) => warn!("conn {conn_id}: {direction} relay failed: {e}"),
    }

    // Signal end-of-stream to both peers before the drops below close the
    // underlying connections for good.  Failures here only mean the peer is
    // already gone.
    let _ = session_write.shutdown().await;
    let _ = client_write.shutdown().await;

    debug!(
        "conn {conn_id}: bridge finished ({} bytes to session, {} bytes to client)",
        outcome.to_session, outcome.to_client
    );

    outcome
}

/// Copies bytes from `reader` to `writer` until end-of-stream, crediting
/// `copied` after every successful write.
///
/// Counting through a caller-owned field (rather than a return value) keeps
/// the tally accurate even when this future is cancelled mid-relay by the
/// opposite direction ending first.
async fn copy_until_end<R, W>(
    reader: &mut R,
    writer: &mut W,
    copied: &mut u64,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            // End of stream — the source half-closed or disconnected.
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
