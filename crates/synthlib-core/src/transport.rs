//! Transport trait for instrument communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a
//! synthesizer: the USB virtual COM port or the Ethernet command socket.
//! Mock transports from `synthlib-test-harness` implement it as well, so
//! protocol engines can be unit tested without hardware.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to an instrument.
///
/// Implementations handle buffering and error mapping at the physical
/// layer. Line framing and command semantics belong to the protocol
/// engines that consume this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the instrument.
    ///
    /// Implementations should wait until all bytes have been handed to the
    /// underlying serial TX buffer or TCP socket.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the instrument into the provided buffer.
    ///
    /// Returns the number of bytes read. Waits up to `timeout` for data to
    /// arrive; returns [`Error::Timeout`](crate::error::Error::Timeout) if
    /// nothing arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
