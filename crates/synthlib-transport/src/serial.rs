//! USB virtual COM port transport.
//!
//! Holzworth instruments enumerate as USB CDC-ACM devices. The link is
//! always 8N1 without flow control; the baud rate is nominal for CDC but
//! stays configurable for instruments reached through a USB-RS232 adapter.
//!
//! # Example
//!
//! ```no_run
//! use synthlib_transport::SerialTransport;
//! use synthlib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> synthlib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyACM0", 115_200).await?;
//! transport.send(b":FREQ?\n").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use synthlib_core::error::{Error, Result};
use synthlib_core::transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace, warn};

/// Baud rate used when neither the caller nor the model specifies one.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How the virtual COM port is prepared when it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Assert DTR after opening. CDC firmware commonly holds its output
    /// until the host raises DTR.
    pub assert_dtr: bool,
    /// Drop whatever the OS buffered before we opened the port, such as
    /// replies to a previous session's last command.
    pub discard_stale_input: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            assert_dtr: true,
            discard_stale_input: true,
        }
    }
}

/// Transport over the instrument's USB virtual COM port.
pub struct SerialTransport {
    stream: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open `port` at `baud_rate` with the default preparation.
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_config(
            port,
            SerialConfig {
                baud_rate,
                ..SerialConfig::default()
            },
        )
        .await
    }

    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        debug!(port = %port, ?config, "opening virtual COM port");

        let mut stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| Error::Transport(format!("cannot open {port}: {e}")))?;

        if config.assert_dtr {
            if let Err(e) = stream.write_data_terminal_ready(true) {
                warn!(port = %port, error = %e, "could not assert DTR");
            }
        }
        if config.discard_stale_input {
            if let Err(e) = stream.clear(ClearBuffer::Input) {
                warn!(port = %port, error = %e, "could not discard stale input");
            }
        }

        info!(port = %port, baud_rate = config.baud_rate, "virtual COM port open");
        Ok(Self {
            stream: Some(stream),
            port_name: port.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn stream(&mut self) -> Result<&mut SerialStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

/// Unplugging the instrument surfaces as a broken pipe or a vanished
/// device; both mean the link is gone rather than a transient fault.
fn link_error(e: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::NotFound => {
            Error::ConnectionLost
        }
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!(port = %self.port_name, line = ?String::from_utf8_lossy(data), "tx");
        let stream = self.stream()?;
        stream.write_all(data).await.map_err(link_error)?;
        stream.flush().await.map_err(link_error)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port_name = self.port_name.clone();
        let stream = self.stream()?;
        let n = tokio::time::timeout(timeout, stream.read(buf))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(link_error)?;
        if n == 0 {
            warn!(port = %port_name, "virtual COM port reported end of stream");
            return Err(Error::ConnectionLost);
        }
        trace!(port = %port_name, bytes = n, data = ?String::from_utf8_lossy(&buf[..n]), "rx");
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.flush().await {
                debug!(port = %self.port_name, error = %e, "flush on close failed");
            }
            info!(port = %self.port_name, "virtual COM port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_prepare_the_port() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert!(config.assert_dtr);
        assert!(config.discard_stale_input);
    }

    #[test]
    fn unplugged_device_is_connection_lost() {
        use std::io::ErrorKind;
        for kind in [ErrorKind::BrokenPipe, ErrorKind::NotConnected, ErrorKind::NotFound] {
            assert!(matches!(link_error(kind.into()), Error::ConnectionLost));
        }
        assert!(matches!(link_error(ErrorKind::InvalidData.into()), Error::Io(_)));
    }

    #[tokio::test]
    async fn open_missing_port_is_transport_error() {
        let result = SerialTransport::open("/dev/synthlib-does-not-exist", 115_200).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
