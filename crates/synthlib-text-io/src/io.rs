//! IO task types and implementation for line-protocol instruments.
//!
//! One tokio task owns the transport exclusively and serializes every
//! command/reply exchange. Callers talk to it through [`SynthIo`]; requests
//! are served strictly in arrival order. While no command is in flight the
//! task keeps reading the line so stray output cannot be mistaken for the
//! reply to a later command.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use synthlib_core::error::{Error, Result};
use synthlib_core::transport::Transport;

use crate::protocol::{self, DecodeResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the line-protocol IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Timeout for a single command/reply exchange.
    pub command_timeout: Duration,
    /// Whether to resend a query that timed out. Setters are never resent.
    pub auto_retry: bool,
    /// Maximum number of retries when `auto_retry` is enabled.
    pub max_retries: u32,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(1000),
            auto_retry: true,
            max_retries: 2,
        }
    }
}

impl IoConfig {
    fn attempts(&self) -> u32 {
        if self.auto_retry {
            self.max_retries + 1
        } else {
            1
        }
    }
}

/// A request sent from driver methods to the IO task.
pub enum Request {
    /// A command that expects exactly one reply line.
    Command {
        cmd_bytes: Vec<u8>,
        reply: oneshot::Sender<Result<String>>,
    },
    /// Close the transport once earlier commands are done, then exit.
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the IO task. Stored inside the driver struct.
pub struct SynthIo {
    /// Request channel into the IO task.
    pub tx: mpsc::Sender<Request>,
    /// Cancellation token for hard shutdown.
    pub cancel: CancellationToken,
    /// Join handle for the IO task, taken by [`close`](SynthIo::close).
    task: Mutex<Option<JoinHandle<()>>>,
    attempts: u32,
}

impl SynthIo {
    /// Send a command and await its reply line.
    ///
    /// `timeout` is the per-attempt timeout the task was configured with;
    /// the wait here covers every retry the task may make.
    pub async fn command(&self, cmd: Vec<u8>, timeout: Duration) -> Result<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Command {
                cmd_bytes: cmd,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        // Each attempt may spend one timeout waiting and up to
        // QUIET_WINDOWS more draining a late reply.
        let backoff = Duration::from_millis(20 * u64::from(self.attempts * self.attempts));
        let budget =
            timeout * (1 + QUIET_WINDOWS) * self.attempts + backoff + Duration::from_millis(500);

        match tokio::time::timeout(budget, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Whether the IO task is still accepting requests.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed() && !self.cancel.is_cancelled()
    }

    /// Close the transport and wait for the IO task to exit.
    ///
    /// Commands queued before the close still run. Returns once the
    /// transport's own `close` has completed; closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let result = match self.tx.send(Request::Close { reply: reply_tx }).await {
            // A dropped reply means another caller's close got there first.
            Ok(()) => reply_rx.await.unwrap_or(Ok(())),
            Err(_) => Ok(()),
        };
        self.cancel.cancel();

        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            let _ = task.await;
        }
        result
    }
}

impl Drop for SynthIo {
    fn drop(&mut self) {
        // The task notices, finishes any command in flight and closes the
        // transport on its own.
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for sending commands.
pub fn spawn_io_task(transport: Box<dyn Transport>, config: IoConfig) -> SynthIo {
    let (tx, rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();
    let attempts = config.attempts();

    let task = tokio::spawn(io_loop(transport, config, rx, cancel.clone()));

    SynthIo {
        tx,
        cancel,
        task: Mutex::new(Some(task)),
        attempts,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// Maximum buffer size before reset to prevent unbounded growth.
/// Reply lines are rarely longer than 64 bytes.
const MAX_BUF: usize = 8192;

/// After a timeout, input is drained until one full `command_timeout`
/// passes in silence, but for no longer than this many timeouts in total.
const QUIET_WINDOWS: u32 = 2;

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Priorities (`biased` select):
/// 1. Cancellation
/// 2. Command dispatch
/// 3. Idle read of stray lines
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut idle_buf = Vec::new();
    let mut close_reply = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("line IO task cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Close { reply }) => {
                        debug!("IO task close requested");
                        close_reply = Some(reply);
                        break;
                    }
                    Some(Request::Command { cmd_bytes, reply }) => {
                        if !idle_buf.is_empty() {
                            debug!(
                                bytes = idle_buf.len(),
                                "discarding partial unsolicited data before command"
                            );
                            idle_buf.clear();
                        }
                        let result = execute_command(&mut *transport, &cmd_bytes, &config).await;
                        let _ = reply.send(result);
                    }
                    None => {
                        debug!("request channel closed, exiting IO task");
                        break;
                    }
                }
            }

            _ = async {
                let mut buf = [0u8; 256];
                match transport.receive(&mut buf, Duration::from_millis(100)).await {
                    Ok(n) if n > 0 => {
                        idle_buf.extend_from_slice(&buf[..n]);
                        if idle_buf.len() > MAX_BUF {
                            tracing::warn!(
                                len = idle_buf.len(),
                                "idle buffer overflow, resetting"
                            );
                            idle_buf.clear();
                            return;
                        }
                        drain_idle_lines(&mut idle_buf);
                    }
                    _ => {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            } => {}
        }
    }

    let closed = transport.close().await;
    if let Err(e) = &closed {
        debug!(error = %e, "error closing transport on IO task exit");
    }
    if let Some(reply) = close_reply {
        let _ = reply.send(closed);
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Execute one command on the transport.
///
/// Sends the command and reads until a complete reply line arrives. After a
/// timeout the line is drained until quiet, so a late reply cannot be taken
/// as the answer to whatever is sent next. Only queries are resent, with
/// backoff, when retries are enabled; rejections and transport failures
/// are returned immediately.
async fn execute_command(
    transport: &mut dyn Transport,
    cmd: &[u8],
    config: &IoConfig,
) -> Result<String> {
    let attempts = if protocol::is_query(cmd) {
        config.attempts()
    } else {
        1
    };
    let command = String::from_utf8_lossy(cmd);
    let command = command.trim_end();

    for attempt in 0..attempts {
        if attempt > 0 {
            debug!(attempt, command, "line protocol query retry");
            tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
        }

        transport.send(cmd).await?;

        let mut recv_buf = [0u8; 256];
        let mut response_buf = Vec::new();

        loop {
            match transport.receive(&mut recv_buf, config.command_timeout).await {
                Ok(n) => {
                    response_buf.extend_from_slice(&recv_buf[..n]);

                    if response_buf.len() > MAX_BUF {
                        tracing::warn!(
                            len = response_buf.len(),
                            "response buffer overflow, discarding reply"
                        );
                        break;
                    }

                    match protocol::decode_line(&response_buf) {
                        DecodeResult::Line { text, consumed } => {
                            if consumed < response_buf.len() {
                                debug!(
                                    extra = response_buf.len() - consumed,
                                    "discarding bytes after reply line"
                                );
                            }
                            return Ok(text);
                        }
                        DecodeResult::Rejected { text, .. } => {
                            debug!(command, reply = %text, "instrument rejected command");
                            return Err(Error::Rejected(text));
                        }
                        DecodeResult::Malformed(_) => {
                            return Err(Error::Protocol(format!(
                                "non-UTF-8 reply to {command}"
                            )));
                        }
                        DecodeResult::Incomplete => continue,
                    }
                }
                Err(Error::Timeout) => break,
                Err(e) => return Err(e),
            }
        }

        drain_until_quiet(transport, config.command_timeout).await?;
    }

    Err(Error::Timeout)
}

/// Read and discard input until `quiet` passes with nothing received, or
/// until [`QUIET_WINDOWS`] times `quiet` has elapsed overall.
async fn drain_until_quiet(transport: &mut dyn Transport, quiet: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + quiet * QUIET_WINDOWS;
    let mut buf = [0u8; 256];
    let mut discarded = 0usize;

    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        match transport.receive(&mut buf, quiet.min(deadline - now)).await {
            Ok(n) => discarded += n,
            Err(Error::Timeout) => break,
            Err(e) => return Err(e),
        }
    }
    if discarded > 0 {
        debug!(bytes = discarded, "discarded late reply");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Idle line processing
// ---------------------------------------------------------------------------

/// Discard every complete line in the idle buffer. Returns how many were
/// dropped; an incomplete tail stays for the next read.
fn drain_idle_lines(buf: &mut Vec<u8>) -> usize {
    let mut dropped = 0;
    loop {
        match protocol::decode_line(buf) {
            DecodeResult::Line { text, consumed } | DecodeResult::Rejected { text, consumed } => {
                debug!(line = %text, "discarding unsolicited line");
                buf.drain(..consumed);
                dropped += 1;
            }
            DecodeResult::Malformed(consumed) => {
                buf.drain(..consumed);
                dropped += 1;
            }
            DecodeResult::Incomplete => {
                // Blank lines alone never decode; drop them once fully terminated.
                if buf.iter().all(|&b| matches!(b, b'\r' | b'\n' | 0 | b' ')) {
                    buf.clear();
                }
                break;
            }
        }
    }
    dropped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use synthlib_test_harness::MockTransport;
    use tokio::time::Instant;

    fn test_config() -> IoConfig {
        IoConfig {
            command_timeout: Duration::from_millis(200),
            auto_retry: false,
            max_retries: 0,
        }
    }

    #[test]
    fn default_config() {
        let config = IoConfig::default();
        assert_eq!(config.command_timeout, Duration::from_millis(1000));
        assert!(config.auto_retry);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.attempts(), 3);
        assert_eq!(test_config().attempts(), 1);
    }

    #[tokio::test]
    async fn command_returns_reply_line() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH1:FREQ?", "1000.000000 MHz");

        let io = spawn_io_task(Box::new(mock), test_config());
        let reply = io
            .command(b":CH1:FREQ?\n".to_vec(), Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(reply, "1000.000000 MHz");

        io.close().await.unwrap();
    }

    #[tokio::test]
    async fn reply_with_crlf_and_leading_blank_line() {
        let mut mock = MockTransport::new();
        mock.expect(b":PWR?\n", b"\r\n-10.00\r\n");

        let io = spawn_io_task(Box::new(mock), test_config());
        let reply = io
            .command(b":PWR?\n".to_vec(), Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(reply, "-10.00");
    }

    #[tokio::test]
    async fn rejection_is_reported() {
        let mut mock = MockTransport::new();
        mock.expect_line(":FREQ:99GHz", "Invalid Frequency");

        let io = spawn_io_task(Box::new(mock), test_config());
        let result = io
            .command(b":FREQ:99GHz\n".to_vec(), Duration::from_millis(200))
            .await;
        match result {
            Err(Error::Rejected(text)) => assert_eq!(text, "Invalid Frequency"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let mut mock = MockTransport::new();
        mock.expect_line(":SYST:RCL", "Error: no saved state");
        let log = mock.sent_log();

        let config = IoConfig {
            auto_retry: true,
            max_retries: 3,
            ..test_config()
        };
        let io = spawn_io_task(Box::new(mock), config);
        let result = io
            .command(b":SYST:RCL\n".to_vec(), Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(Error::Rejected(_))));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn timeout_without_retry() {
        let mut mock = MockTransport::new();
        mock.expect(b":PWR:RF?\n", b"");

        let io = spawn_io_task(Box::new(mock), test_config());
        let result = io
            .command(b":PWR:RF?\n".to_vec(), Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn timeout_is_retried() {
        let mut mock = MockTransport::new();
        mock.expect(b"*IDN?\n", b"");
        mock.expect_line("*IDN?", "Holzworth Instrumentation,HSM1001A,1234,1.0");
        let log = mock.sent_log();

        let config = IoConfig {
            auto_retry: true,
            max_retries: 1,
            ..test_config()
        };
        let io = spawn_io_task(Box::new(mock), config);
        let reply = io
            .command(b"*IDN?\n".to_vec(), Duration::from_millis(200))
            .await
            .unwrap();
        assert!(reply.starts_with("Holzworth"));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn transport_error_is_propagated() {
        let mock = MockTransport::new();
        let io = spawn_io_task(Box::new(mock), test_config());
        let result = io
            .command(b":FREQ?\n".to_vec(), Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn commands_are_served_in_order() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH1:PWR:5.00dBm", "Power set");
        mock.expect_line(":CH1:PWR?", "5.00");

        let io = spawn_io_task(Box::new(mock), test_config());
        let timeout = Duration::from_millis(200);
        assert_eq!(
            io.command(b":CH1:PWR:5.00dBm\n".to_vec(), timeout)
                .await
                .unwrap(),
            "Power set"
        );
        assert_eq!(
            io.command(b":CH1:PWR?\n".to_vec(), timeout).await.unwrap(),
            "5.00"
        );
    }

    #[tokio::test]
    async fn cancelled_task_is_not_connected() {
        let io = spawn_io_task(Box::new(MockTransport::new()), test_config());
        assert!(io.is_running());
        io.cancel.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!io.is_running());

        let result = io
            .command(b"*IDN?\n".to_vec(), Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn close_waits_for_transport_close() {
        let mock = MockTransport::new();
        let closed = mock.closed_flag();
        let io = spawn_io_task(Box::new(mock), test_config());

        io.close().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
        assert!(!io.is_running());

        // Second close is a no-op; commands after close fail.
        io.close().await.unwrap();
        let result = io.command(b"*IDN?\n".to_vec(), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn close_runs_after_queued_command() {
        let mut mock = MockTransport::new();
        mock.expect_line(":SYST:SAV", "Saved");
        let closed = mock.closed_flag();
        let log = mock.sent_log();
        let io = spawn_io_task(Box::new(mock), test_config());

        let (reply, closing) = tokio::join!(
            io.command(b":SYST:SAV\n".to_vec(), Duration::from_millis(200)),
            io.close()
        );
        assert_eq!(reply.unwrap(), "Saved");
        closing.unwrap();
        assert_eq!(log.len(), 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropping_handle_closes_transport() {
        let mock = MockTransport::new();
        let closed = mock.closed_flag();
        drop(spawn_io_task(Box::new(mock), test_config()));

        for _ in 0..50 {
            if closed.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    /// Peer that answers every line with `REPLY-<line>`, the n-th reply
    /// arriving after `delays[n]` (10 ms once the list runs out).
    struct SlowPeer {
        delays: VecDeque<Duration>,
        pending: VecDeque<(Instant, Vec<u8>)>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl SlowPeer {
        fn new(delays: &[u64]) -> (Self, Arc<StdMutex<Vec<String>>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let peer = SlowPeer {
                delays: delays.iter().map(|&ms| Duration::from_millis(ms)).collect(),
                pending: VecDeque::new(),
                sent: Arc::clone(&sent),
            };
            (peer, sent)
        }
    }

    #[async_trait]
    impl Transport for SlowPeer {
        async fn send(&mut self, data: &[u8]) -> Result<()> {
            let line = String::from_utf8_lossy(data).trim_end().to_string();
            let delay = self.delays.pop_front().unwrap_or(Duration::from_millis(10));
            self.pending
                .push_back((Instant::now() + delay, format!("REPLY-{line}\n").into_bytes()));
            self.sent.lock().unwrap().push(line);
            Ok(())
        }

        async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            let deadline = Instant::now() + timeout;
            match self.pending.front() {
                Some((ready, _)) if *ready <= deadline => {
                    tokio::time::sleep_until(*ready).await;
                    let (_, reply) = self.pending.pop_front().unwrap();
                    buf[..reply.len()].copy_from_slice(&reply);
                    Ok(reply.len())
                }
                _ => {
                    tokio::time::sleep_until(deadline).await;
                    Err(Error::Timeout)
                }
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn retrying_config() -> IoConfig {
        IoConfig {
            command_timeout: Duration::from_millis(200),
            auto_retry: true,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn slow_setter_is_sent_once_and_late_reply_dropped() {
        let (peer, sent) = SlowPeer::new(&[300]);
        let io = spawn_io_task(Box::new(peer), retrying_config());
        let timeout = Duration::from_millis(200);

        let result = io
            .command(b":LIST:WIDE:ADD:1000000Hz\n".to_vec(), timeout)
            .await;
        assert!(matches!(result, Err(Error::Timeout)));

        let reply = io.command(b":PWR?\n".to_vec(), timeout).await.unwrap();
        assert_eq!(reply, "REPLY-:PWR?");
        assert_eq!(
            *sent.lock().unwrap(),
            vec![":LIST:WIDE:ADD:1000000Hz".to_string(), ":PWR?".to_string()]
        );
    }

    #[tokio::test]
    async fn retried_query_does_not_shift_replies() {
        let (peer, sent) = SlowPeer::new(&[300]);
        let io = spawn_io_task(Box::new(peer), retrying_config());
        let timeout = Duration::from_millis(200);

        let reply = io.command(b":FREQ?\n".to_vec(), timeout).await.unwrap();
        assert_eq!(reply, "REPLY-:FREQ?");
        assert_eq!(sent.lock().unwrap().len(), 2);

        let reply = io.command(b":PWR?\n".to_vec(), timeout).await.unwrap();
        assert_eq!(reply, "REPLY-:PWR?");
    }

    #[test]
    fn idle_drain_keeps_partial_tail() {
        let mut buf = b"RF ON\r\nInvalid\nFREQ".to_vec();
        assert_eq!(drain_idle_lines(&mut buf), 2);
        assert_eq!(buf, b"FREQ");
    }

    #[test]
    fn idle_drain_clears_blank_lines() {
        let mut buf = b"\r\n\r\n".to_vec();
        assert_eq!(drain_idle_lines(&mut buf), 0);
        assert!(buf.is_empty());
    }
}
