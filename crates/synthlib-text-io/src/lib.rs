//! Shared IO task for line-protocol synthesizer backends.
//!
//! One tokio task owns the transport exclusively and handles command/reply
//! exchanges, retries, rejection detection and graceful shutdown.
//!
//! # Architecture
//!
//! - [`protocol`]: decode/encode for `\n`-terminated reply lines
//! - [`io`]: IO task types, spawn, and the select loop

pub mod io;
pub mod protocol;

pub use io::{IoConfig, SynthIo, spawn_io_task};
