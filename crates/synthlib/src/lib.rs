//! # synthlib -- Control of Holzworth RF Synthesizers
//!
//! `synthlib` is an asynchronous Rust library for driving Holzworth
//! HS-series and HSM-series RF synthesizers over their USB virtual COM port
//! or Ethernet command socket. It targets production test benches where
//! instruments are programmed from test sequencers, and it backs the
//! HS1001-compatible C library in `synthlib-capi`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use synthlib::{ChannelId, Synthesizer};
//! use synthlib::holzworth::{HolzworthBuilder, models::hsm2001a};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let synth = HolzworthBuilder::new(hsm2001a())
//!         .build_tcp("192.168.1.50")
//!         .await?;
//!
//!     synth.set_frequency(ChannelId::CH1, 2_400_000_000).await?;
//!     synth.set_power(ChannelId::CH1, -10.0).await?;
//!     synth.set_rf_output(ChannelId::CH1, true).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                         |
//! |------------------------|-------------------------------------------------|
//! | `synthlib-core`        | [`Synthesizer`] trait, types, units, errors     |
//! | `synthlib-transport`   | Serial and TCP transport implementations        |
//! | `synthlib-text-io`     | Line codec and the per-device IO task           |
//! | `synthlib-holzworth`   | Holzworth command sets, models, discovery       |
//! | `synthlib-capi`        | `HolzworthHS1001`-compatible C ABI              |
//! | **`synthlib`**         | This facade crate -- re-exports everything      |
//!
//! ## Events
//!
//! Drivers emit [`SynthEvent`]s through a broadcast channel:
//!
//! ```no_run
//! use synthlib::{Synthesizer, SynthEvent};
//! # async fn example(synth: &dyn Synthesizer) -> synthlib::Result<()> {
//! let mut events = synth.subscribe()?;
//! while let Ok(event) = events.recv().await {
//!     if let SynthEvent::FrequencyChanged { channel, freq_hz } = event {
//!         println!("{channel}: {freq_hz} Hz");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub use synthlib_core::*;

/// Transport implementations (serial, TCP).
pub mod transport {
    pub use synthlib_transport::*;
}

/// Holzworth backend.
///
/// Provides [`HolzworthSynth`](holzworth::HolzworthSynth),
/// [`HolzworthBuilder`](holzworth::HolzworthBuilder), USB discovery and
/// frequency list import for the HS1001A, HS2001A and HSM series.
#[cfg(feature = "holzworth")]
pub mod holzworth {
    pub use synthlib_holzworth::*;
}

/// Every supported model, as `(name, capabilities)` pairs.
///
/// ```
/// let models = synthlib::supported_models();
/// assert!(models.iter().any(|(name, _)| *name == "HSM4001A"));
/// ```
#[cfg(feature = "holzworth")]
pub fn supported_models() -> Vec<(&'static str, SynthCapabilities)> {
    holzworth::models::all_models()
        .into_iter()
        .map(|m| (m.name, m.capabilities))
        .collect()
}
