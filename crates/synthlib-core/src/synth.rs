//! The `Synthesizer` trait: unified interface for RF signal generators.
//!
//! Application code (test sequencers, the C ABI shim, the CLI) programs
//! against `dyn Synthesizer` without caring which command dialect or
//! physical link the instrument uses.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::events::SynthEvent;
use crate::types::*;

/// Unified asynchronous interface for controlling a synthesizer.
///
/// Methods that talk to the instrument are `async`; methods that return
/// static data ([`info()`](Synthesizer::info),
/// [`capabilities()`](Synthesizer::capabilities)) are synchronous.
///
/// Operations that only some instruments offer have default
/// implementations returning [`Error::Unsupported`].
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Return static information about the connected instrument.
    fn info(&self) -> &SynthInfo;

    /// Return the capabilities of the connected instrument.
    fn capabilities(&self) -> &SynthCapabilities;

    /// Query the instrument's identification string (`*IDN?`).
    async fn identify(&self) -> Result<String>;

    /// Send a raw command line and return the instrument's reply verbatim.
    ///
    /// The terminator is appended if missing. No validation is performed.
    async fn write_raw(&self, command: &str) -> Result<String>;

    /// Switch the RF output of a channel on or off.
    async fn set_rf_output(&self, channel: ChannelId, on: bool) -> Result<()>;

    /// Return whether the RF output of a channel is on.
    async fn get_rf_output(&self, channel: ChannelId) -> Result<bool>;

    /// Select the frequency reference source.
    async fn set_reference(&self, reference: Reference) -> Result<()>;

    /// Set the CW frequency of a channel in hertz.
    async fn set_frequency(&self, channel: ChannelId, freq_hz: u64) -> Result<()>;

    /// Get the CW frequency of a channel in hertz.
    async fn get_frequency(&self, channel: ChannelId) -> Result<u64>;

    /// Set the output power of a channel in dBm.
    async fn set_power(&self, channel: ChannelId, dbm: f32) -> Result<()>;

    /// Get the output power of a channel in dBm.
    async fn get_power(&self, channel: ChannelId) -> Result<f32>;

    /// Set the output phase of a channel in degrees (0 to 360).
    async fn set_phase(&self, channel: ChannelId, degrees: f32) -> Result<()>;

    /// Get the output phase of a channel in degrees.
    async fn get_phase(&self, channel: ChannelId) -> Result<f32>;

    /// Select the modulation mode of a channel.
    async fn set_modulation(&self, _channel: ChannelId, _mode: ModulationMode) -> Result<()> {
        Err(Error::Unsupported("modulation not supported".into()))
    }

    /// Set the FM deviation of a channel in hertz.
    async fn set_fm_deviation(&self, _channel: ChannelId, _deviation_hz: u64) -> Result<()> {
        Err(Error::Unsupported("FM not supported".into()))
    }

    /// Set the AM depth of a channel in percent.
    async fn set_am_depth(&self, _channel: ChannelId, _percent: f32) -> Result<()> {
        Err(Error::Unsupported("AM not supported".into()))
    }

    /// Set the PM deviation of a channel in degrees.
    async fn set_pm_deviation(&self, _channel: ChannelId, _degrees: f32) -> Result<()> {
        Err(Error::Unsupported("PM not supported".into()))
    }

    /// Set the start frequency of the stepped sweep.
    async fn set_sweep_start(&self, _channel: ChannelId, _freq_hz: u64) -> Result<()> {
        Err(Error::Unsupported("frequency sweep not supported".into()))
    }

    /// Set the stop frequency of the stepped sweep.
    async fn set_sweep_stop(&self, _channel: ChannelId, _freq_hz: u64) -> Result<()> {
        Err(Error::Unsupported("frequency sweep not supported".into()))
    }

    /// Set the dwell time per sweep point.
    async fn set_sweep_dwell(&self, _channel: ChannelId, _dwell: Duration) -> Result<()> {
        Err(Error::Unsupported("frequency sweep not supported".into()))
    }

    /// Set the number of sweep points.
    async fn set_sweep_points(&self, _channel: ChannelId, _points: u16) -> Result<()> {
        Err(Error::Unsupported("frequency sweep not supported".into()))
    }

    /// Restore the factory default state.
    async fn recall_factory_preset(&self) -> Result<()>;

    /// Restore the state previously stored with
    /// [`save_current_state`](Synthesizer::save_current_state).
    async fn recall_saved_state(&self) -> Result<()>;

    /// Store the current state in the instrument's non-volatile memory.
    async fn save_current_state(&self) -> Result<()>;

    /// Make the given list the active sweep source.
    async fn enable_list(&self, _band: ListBand) -> Result<()> {
        Err(Error::Unsupported("list sweeps not supported".into()))
    }

    /// Replace the contents of a stored list with `points` (hertz).
    async fn load_list(&self, _band: ListBand, _points: &[u64]) -> Result<()> {
        Err(Error::Unsupported("list sweeps not supported".into()))
    }

    /// Select how the list advances.
    async fn set_list_trigger(&self, _band: ListBand, _trigger: ListTrigger) -> Result<()> {
        Err(Error::Unsupported("list sweeps not supported".into()))
    }

    /// Set the dwell time per list point.
    async fn set_list_dwell(&self, _band: ListBand, _dwell: Duration) -> Result<()> {
        Err(Error::Unsupported("list sweeps not supported".into()))
    }

    /// Subscribe to state change events.
    ///
    /// Returns a broadcast receiver. The channel is bounded; if the
    /// consumer falls behind, older events are dropped (lagged).
    fn subscribe(&self) -> Result<broadcast::Receiver<SynthEvent>>;

    /// Stop background IO and close the underlying transport.
    async fn close(&self) -> Result<()>;
}
