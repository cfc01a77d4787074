//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs, so command encoding and reply parsing can be
//! tested without an instrument on the bench.
//!
//! # Example
//!
//! ```
//! use synthlib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the driver sends this command, answer with this line.
//! mock.expect(b":CH1:FREQ?\n", b"1000.000000 MHz\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use synthlib_core::error::{Error, Result};
use synthlib_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to return when the matching request is received.
    response: Vec<u8>,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; the
/// corresponding response is then handed out by subsequent `receive()`
/// calls. An empty response makes the next `receive()` time out.
///
/// If the data does not match or the queue is exhausted, `send()` returns
/// [`Error::Protocol`].
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    /// Reply bytes not yet handed out by `receive()`.
    unread: VecDeque<u8>,
    connected: bool,
    /// Every `send()` payload, shared so tests can inspect it after the
    /// transport has been moved into a driver.
    sent_log: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Set once `close()` has run.
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            unread: VecDeque::new(),
            connected: true,
            sent_log: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Add an expected command line and its one-line reply.
    ///
    /// Both are newline-terminated automatically, so
    /// `expect_line(":CH1:PWR?", "10.00")` is the same as
    /// `expect(b":CH1:PWR?\n", b"10.00\n")`.
    pub fn expect_line(&mut self, command: &str, reply: &str) {
        self.expect(
            format!("{command}\n").as_bytes(),
            format!("{reply}\n").as_bytes(),
        );
    }

    /// Return a copy of everything sent through this transport, one element
    /// per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.sent_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Return a handle to the sent-data log that stays valid after the
    /// transport is boxed and handed to a driver.
    pub fn sent_log(&self) -> SentLog {
        SentLog(Arc::clone(&self.sent_log))
    }

    /// Flag that turns `true` when the transport's `close()` is called,
    /// readable after the transport has been handed to a driver.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared view of the bytes a [`MockTransport`] has sent.
#[derive(Debug, Clone)]
pub struct SentLog(Arc<Mutex<Vec<Vec<u8>>>>);

impl SentLog {
    /// Every sent payload decoded as (lossy) UTF-8, terminators included.
    pub fn lines(&self) -> Vec<String> {
        self.0
            .lock()
            .map(|log| {
                log.iter()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of `send()` calls recorded so far.
    pub fn len(&self) -> usize {
        self.0.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if let Ok(mut log) = self.sent_log.lock() {
            log.push(data.to_vec());
        }

        let Some(next) = self.expectations.pop_front() else {
            return Err(Error::Protocol(format!(
                "mock got {:?} after its script ran out",
                String::from_utf8_lossy(data)
            )));
        };
        if data != next.request.as_slice() {
            return Err(Error::Protocol(format!(
                "mock expected {:?}, got {:?}",
                String::from_utf8_lossy(&next.request),
                String::from_utf8_lossy(data)
            )));
        }
        // A reply the driver never read is replaced, as a real port's
        // stale input would be drained by the next exchange.
        self.unread = next.response.into();
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if self.unread.is_empty() {
            return Err(Error::Timeout);
        }
        let n = self.unread.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.unread.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.unread.clear();
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
