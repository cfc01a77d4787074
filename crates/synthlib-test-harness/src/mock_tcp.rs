//! Mock TCP server for protocol-level testing.
//!
//! [`MockTcpServer`] is a small TCP listener pre-loaded with scripted
//! replies. It stands in for an HSM module's Ethernet command port so the
//! TCP connection path can be tested end to end.
//!
//! # Example
//!
//! ```
//! use synthlib_test_harness::MockTcpServer;
//!
//! # async fn example() -> synthlib_core::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//! server.expect(b"*IDN?\n", b"Holzworth Instrumentation,HSM1001A,1,1.0\n");
//! server.start();
//! let addr = server.addr().to_string();
//! // ... connect a TcpTransport to `addr` ...
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;

use synthlib_core::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A pre-loaded request/response pair for the mock TCP server.
#[derive(Debug, Clone)]
struct TcpExpectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

/// Scripted stand-in for an HSM command socket.
///
/// Binds an ephemeral localhost port on construction. After
/// [`start`](MockTcpServer::start) it accepts one client and walks the
/// script: read a newline-terminated command, compare, write the reply.
pub struct MockTcpServer {
    addr: String,
    /// Held until `start()` moves it into the server task.
    listener: Option<TcpListener>,
    expectations: VecDeque<TcpExpectation>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockTcpServer {
    /// Create a new mock TCP server listening on a random port.
    ///
    /// The listener is bound immediately, so clients may connect before
    /// [`start`](MockTcpServer::start); the connection is accepted once the
    /// server task runs.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock TCP server: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();

        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(TcpExpectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Script a command line and its reply; both get a trailing newline.
    pub fn expect_line(&mut self, command: &str, reply: &str) {
        self.expect(
            format!("{command}\n").as_bytes(),
            format!("{reply}\n").as_bytes(),
        );
    }

    /// Address the server is listening on (e.g. `"127.0.0.1:54321"`).
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    }

    /// Start serving one client connection in a background task.
    ///
    /// Calling `start` twice has no effect.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations: Vec<TcpExpectation> = self.expectations.drain(..).collect();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;
            serve(&mut stream, &expectations).await
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task to complete and return any errors.
    ///
    /// Call this after the client has finished its interactions to verify
    /// that all expectations were met.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Ok(()),
        }
    }
}

/// Answer one command line at a time, the way an HSM module does.
async fn serve(
    stream: &mut TcpStream,
    expectations: &[TcpExpectation],
) -> std::result::Result<(), String> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    for (step, expected) in expectations.iter().enumerate() {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| format!("step {step}: read failed: {e}"))?;
        if n == 0 {
            return Err(format!(
                "step {step}: client hung up before sending {:?}",
                String::from_utf8_lossy(&expected.request)
            ));
        }
        if line != expected.request {
            return Err(format!(
                "step {step}: request mismatch: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expected.request),
                String::from_utf8_lossy(&line)
            ));
        }
        writer
            .write_all(&expected.response)
            .await
            .map_err(|e| format!("step {step}: reply failed: {e}"))?;
    }

    Ok(())
}
