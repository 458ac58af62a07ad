//! The loopback development broker.
//!
//! The reference deployment embeds a full messaging engine behind the
//! [`Broker`] facade.  That engine lives out of tree; this module supplies
//! the stand-in the binary and the integration tests run against: an
//! in-process engine whose sessions are [`tokio::io::duplex`] pipes served
//! by a trivial line responder (`PING` → `PONG`, anything else echoed back).
//!
//! The responder exists purely so that a byte written into one end of a
//! session produces an observable byte on the way back — the bridge itself
//! never interprets the stream.  What the loopback engine does model
//! faithfully is the *lifecycle* contract of the facade:
//!
//! - sessions refuse to open once shutdown has been requested,
//! - shutdown makes every open session reach end-of-stream, and
//! - `wait_for_shutdown` resolves only after the last session has drained.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::{Broker, BrokerError, BrokerOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::watch;
use tracing::{debug, info};

/// Buffer size of each session's duplex pipe.
const SESSION_BUFFER: usize = 8 * 1024;

/// An in-process broker engine for development and tests.
///
/// Internally thread-safe, as the facade requires: all state lives in
/// atomics and `watch` channels, so `&self` methods can be called from any
/// number of tasks at once.
pub struct LoopbackBroker {
    options: BrokerOptions,
    started: AtomicBool,
    /// Broadcast to every responder task when shutdown is requested.
    stop_tx: watch::Sender<bool>,
    /// Live session count; `wait_for_shutdown` waits for it to reach zero.
    sessions_tx: watch::Sender<usize>,
    session_ids: AtomicU64,
}

impl LoopbackBroker {
    /// Creates a stopped engine.  Call [`Broker::start`] before opening
    /// sessions.
    pub fn new(options: BrokerOptions) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (sessions_tx, _) = watch::channel(0usize);
        Self {
            options,
            started: AtomicBool::new(false),
            stop_tx,
            sessions_tx,
            session_ids: AtomicU64::new(0),
        }
    }

    /// Number of sessions currently open.  Exposed for tests that assert a
    /// closed client tears its session down within a bounded grace period.
    pub fn active_sessions(&self) -> usize {
        *self.sessions_tx.borrow()
    }

    /// The options this engine was built with.
    pub fn options(&self) -> &BrokerOptions {
        &self.options
    }
}

#[async_trait]
impl Broker for LoopbackBroker {
    type Session = DuplexStream;

    fn start(&self) -> Result<(), BrokerError> {
        if *self.stop_tx.borrow() {
            return Err(BrokerError::NotRunning);
        }
        if !self.started.swap(true, Ordering::SeqCst) {
            info!(
                "loopback broker '{}' started (persistence: {})",
                self.options.name,
                if self.options.persistence_enabled() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
        }
        Ok(())
    }

    async fn ready_for_connections(&self, _timeout: Duration) -> bool {
        // The loopback engine has no warm-up phase: it is ready the moment
        // it has been started and not yet shut down.
        self.started.load(Ordering::SeqCst) && !*self.stop_tx.borrow()
    }

    async fn open_session(&self) -> Result<DuplexStream, BrokerError> {
        if !self.started.load(Ordering::SeqCst) || *self.stop_tx.borrow() {
            return Err(BrokerError::NotRunning);
        }

        let (bridge_side, broker_side) = tokio::io::duplex(SESSION_BUFFER);
        let session_id = self.session_ids.fetch_add(1, Ordering::Relaxed);
        self.sessions_tx.send_modify(|n| *n += 1);

        let mut stop_rx = self.stop_tx.subscribe();
        let sessions_tx = self.sessions_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = respond(broker_side, session_id) => {
                    if let Err(e) = result {
                        debug!("session {session_id}: responder ended with error: {e}");
                    }
                }
                _ = stop_rx.wait_for(|stopped| *stopped) => {
                    debug!("session {session_id}: closed by broker shutdown");
                }
            }
            // Dropping `broker_side` (owned by the finished/cancelled
            // responder) is what surfaces end-of-stream to the bridge.
            sessions_tx.send_modify(|n| *n -= 1);
        });

        debug!("session {session_id}: opened");
        Ok(bridge_side)
    }

    fn shutdown(&self) {
        // First call flips the stored value and wakes every responder;
        // repeat calls store the same value again, which wakes nobody.
        let was_stopped = self.stop_tx.send_replace(true);
        if !was_stopped {
            info!("loopback broker '{}' shutting down", self.options.name);
        }
    }

    async fn wait_for_shutdown(&self) {
        let mut stop_rx = self.stop_tx.subscribe();
        let _ = stop_rx.wait_for(|stopped| *stopped).await;

        let mut sessions_rx = self.sessions_tx.subscribe();
        let _ = sessions_rx.wait_for(|count| *count == 0).await;
        debug!("loopback broker '{}' fully stopped", self.options.name);
    }
}

/// Serves one session: replies `PONG` to the line `PING` and echoes every
/// other line verbatim.  Returns when the bridge side closes.
async fn respond(stream: DuplexStream, session_id: u64) -> std::io::Result<()> {
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        let reply: &str = if line == "PING" { "PONG" } else { &line };
        write_half.write_all(reply.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;
    }
    debug!("session {session_id}: peer closed");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn started() -> LoopbackBroker {
        let broker = LoopbackBroker::new(BrokerOptions::default());
        broker.start().expect("start must succeed");
        broker
    }

    async fn read_line<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> String {
        // Reads byte-by-byte up to the newline; sessions stay open, so
        // read_to_end would block forever.
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = reader.read(&mut byte).await.expect("read must succeed");
            assert_ne!(n, 0, "session must not close mid-line");
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).expect("responder output must be UTF-8")
    }

    #[tokio::test]
    async fn test_session_answers_ping_with_pong() {
        // Arrange
        let broker = started();
        let mut session = broker.open_session().await.expect("session must open");

        // Act
        session.write_all(b"PING\n").await.unwrap();

        // Assert
        assert_eq!(read_line(&mut session).await, "PONG");
    }

    #[tokio::test]
    async fn test_session_echoes_other_lines_in_order() {
        // Arrange
        let broker = started();
        let mut session = broker.open_session().await.expect("session must open");

        // Act
        session.write_all(b"alpha\nbeta\n").await.unwrap();

        // Assert — same lines, same order
        assert_eq!(read_line(&mut session).await, "alpha");
        assert_eq!(read_line(&mut session).await, "beta");
    }

    #[tokio::test]
    async fn test_open_session_before_start_is_refused() {
        // Arrange — deliberately not started
        let broker = LoopbackBroker::new(BrokerOptions::default());

        // Act
        let result = broker.open_session().await;

        // Assert
        assert!(matches!(result, Err(BrokerError::NotRunning)));
    }

    #[tokio::test]
    async fn test_open_session_after_shutdown_is_refused() {
        // Arrange
        let broker = started();
        broker.shutdown();

        // Act
        let result = broker.open_session().await;

        // Assert
        assert!(matches!(result, Err(BrokerError::NotRunning)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_open_sessions() {
        // Arrange
        let broker = started();
        let mut session = broker.open_session().await.expect("session must open");

        // Act
        broker.shutdown();

        // Assert — the session reaches end-of-stream within a bounded wait
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(std::time::Duration::from_secs(2), session.read(&mut buf))
            .await
            .expect("read must unblock after shutdown")
            .expect("end-of-stream, not an error");
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves_after_last_session_drains() {
        // Arrange
        let broker = std::sync::Arc::new(started());
        let session = broker.open_session().await.expect("session must open");
        assert_eq!(broker.active_sessions(), 1);

        // Act
        broker.shutdown();
        drop(session);

        // Assert
        tokio::time::timeout(std::time::Duration::from_secs(2), broker.wait_for_shutdown())
            .await
            .expect("wait_for_shutdown must resolve once sessions are gone");
        assert_eq!(broker.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_double_shutdown_is_a_noop() {
        // Arrange
        let broker = started();

        // Act / Assert — must not panic or corrupt the session count
        broker.shutdown();
        broker.shutdown();
        assert_eq!(broker.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_ready_reflects_lifecycle() {
        let broker = LoopbackBroker::new(BrokerOptions::default());
        assert!(
            !broker
                .ready_for_connections(Duration::from_millis(10))
                .await
        );

        broker.start().unwrap();
        assert!(broker.ready_for_connections(Duration::from_millis(10)).await);

        broker.shutdown();
        assert!(
            !broker
                .ready_for_connections(Duration::from_millis(10))
                .await
        );
    }
}
