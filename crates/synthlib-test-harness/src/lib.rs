//! synthlib-test-harness: mock transports for testing synthlib drivers.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! protocol engines without an instrument attached, and [`MockTcpServer`]
//! for exercising the Ethernet path against a scripted local listener.

pub mod mock_serial;
pub mod mock_tcp;

pub use mock_serial::{MockTransport, SentLog};
pub use mock_tcp::MockTcpServer;
