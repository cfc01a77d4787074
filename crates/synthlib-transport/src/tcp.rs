//! Ethernet command socket of HSM-series modules.
//!
//! The socket carries the same newline-terminated command set as the USB
//! port. A hostname may resolve to several addresses (commonly an IPv6 and
//! an IPv4 one); each is tried in turn inside a single connect deadline.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use synthlib_core::error::{Error, Result};
use synthlib_core::transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// TCP port HSM modules listen on for commands.
pub const DEFAULT_COMMAND_PORT: u16 = 9760;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport over an HSM module's command socket.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    addr: String,
    peer: Option<SocketAddr>,
}

impl TcpTransport {
    /// Connect to `host:port` within the default deadline.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to `host:port`, giving up once `timeout` has elapsed across
    /// name resolution and every candidate address.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        debug!(addr = %addr, timeout_ms = timeout.as_millis(), "connecting to command socket");
        let stream = tokio::time::timeout(timeout, dial(addr))
            .await
            .map_err(|_| {
                warn!(addr = %addr, "command socket connect deadline passed");
                Error::Timeout
            })??;

        // Every command waits on a short reply; Nagle only adds latency.
        if let Err(e) = stream.set_nodelay(true) {
            debug!(addr = %addr, error = %e, "TCP_NODELAY not applied");
        }
        let peer = stream.peer_addr().ok();
        info!(addr = %addr, peer = ?peer, "command socket connected");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
            peer,
        })
    }

    /// The `host:port` string this transport was opened with.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The resolved address actually connected to.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

async fn dial(addr: &str) -> Result<TcpStream> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| Error::Transport(format!("cannot resolve {addr}: {e}")))?
        .collect();

    let mut last_err = None;
    for candidate in &candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(addr = %addr, candidate = %candidate, error = %e, "candidate refused");
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {addr}"))
        }
        Some(e) => Error::Io(e),
        None => Error::Transport(format!("{addr} resolved to no addresses")),
    })
}

/// Join a host and port, bracketing bare IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// A reset or aborted socket means the module rebooted or the cable was
/// pulled; the session cannot continue.
fn socket_error(e: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!(addr = %self.addr, line = ?String::from_utf8_lossy(data), "tx");
        let stream = self.stream()?;
        stream.write_all(data).await.map_err(socket_error)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let addr = self.addr.clone();
        let stream = self.stream()?;
        let n = match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(read) => read.map_err(socket_error)?,
            Err(_) => return Err(Error::Timeout),
        };
        if n == 0 {
            warn!(addr = %addr, "module closed the command socket");
            return Err(Error::ConnectionLost);
        }
        trace!(addr = %addr, bytes = n, data = ?String::from_utf8_lossy(&buf[..n]), "rx");
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        if let Err(e) = stream.shutdown().await {
            debug!(addr = %self.addr, error = %e, "shutdown on close failed");
        }
        info!(addr = %self.addr, "command socket closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
