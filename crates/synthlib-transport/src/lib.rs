//! Transport implementations for synthlib.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](synthlib_core::Transport) trait from `synthlib-core`:
//!
//! - [`SerialTransport`]: the instrument's USB virtual COM port
//! - [`TcpTransport`]: the Ethernet command socket of HSM modules
//!
//! # Example
//!
//! ```no_run
//! use synthlib_transport::TcpTransport;
//! use synthlib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> synthlib_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.1.50:9760").await?;
//! transport.send(b":CH1:FREQ?\n").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;
pub mod tcp;

pub use serial::{DEFAULT_BAUD_RATE, SerialConfig, SerialTransport};
pub use tcp::{DEFAULT_COMMAND_PORT, TcpTransport};
