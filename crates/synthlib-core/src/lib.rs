//! synthlib-core: Core traits, types, and error definitions for synthlib.
//!
//! This crate defines the instrument-agnostic abstractions that synthlib
//! drivers implement. Applications depend on these types without pulling in
//! a specific driver or transport.
//!
//! # Key types
//!
//! - [`Synthesizer`] -- the unified trait for controlling a signal generator
//! - [`Transport`] -- byte-level communication channel
//! - [`SynthEvent`] -- state change notifications
//! - [`units`] -- parsing of unit-bearing values like `1.5GHz` or `-10dBm`
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod synth;
pub mod transport;
pub mod types;
pub mod units;

pub use error::{Error, Result};
pub use events::SynthEvent;
pub use synth::Synthesizer;
pub use transport::Transport;
pub use types::*;
pub use units::format_freq_mhz;
