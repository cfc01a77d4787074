//! Holzworth synthesizer backend for synthlib.
//!
//! This crate drives Holzworth RF synthesizers through their line-oriented
//! ASCII command set, over either the USB virtual COM port or the Ethernet
//! command socket. It provides:
//!
//! - **Command builders** ([`commands`]) -- construct commands for both the
//!   legacy HS dialect and the channel-prefixed HSM dialect, and parse the
//!   replies.
//! - **Model definitions** ([`models`]) -- static capability data for the
//!   HS1001A, HS2001A, HSM1001A, HSM2001A and HSM4001A.
//! - **Driver** ([`synth`]) -- full [`Synthesizer`](synthlib_core::Synthesizer)
//!   implementation with argument validation and event emission.
//! - **Builder** ([`builder`]) -- fluent construction with model detection.
//! - **Discovery** ([`discovery`]) -- find attached instruments by USB
//!   descriptor.
//! - **List files** ([`list_file`]) -- import frequency lists for
//!   wideband/narrowband list sweeps.
//!
//! # Example
//!
//! ```
//! use synthlib_core::{ChannelId, CommandSet};
//! use synthlib_holzworth::commands::{cmd_set_frequency, parse_frequency_response};
//!
//! let cmd = cmd_set_frequency(CommandSet::Hsm, ChannelId::CH1, 1_000_000_000);
//! assert_eq!(cmd, b":CH1:FREQ:1000000000Hz\n");
//!
//! assert_eq!(parse_frequency_response("1000.000000 MHz").unwrap(), 1_000_000_000);
//! ```

pub mod builder;
pub mod commands;
pub mod discovery;
pub mod list_file;
pub mod models;
pub mod synth;

pub use builder::HolzworthBuilder;
pub use discovery::{DiscoveredDevice, discover, find_device};
pub use list_file::FrequencyList;
pub use models::HolzworthModel;
pub use synth::HolzworthSynth;
