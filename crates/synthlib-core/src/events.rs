//! Asynchronous synthesizer event types.
//!
//! Drivers publish a [`SynthEvent`] through a [`tokio::sync::broadcast`]
//! channel after each successful state change, so dashboards and test
//! sequencers can follow the instrument without polling it.

use crate::types::{ChannelId, ListBand, ModulationMode, Reference};

/// An event emitted by a synthesizer driver when instrument state changes.
///
/// Events are delivered on a best-effort basis through a bounded broadcast
/// channel; slow consumers may miss events during rapid sweeps.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthEvent {
    /// The CW frequency of a channel changed.
    FrequencyChanged { channel: ChannelId, freq_hz: u64 },

    /// The output power of a channel changed.
    PowerChanged { channel: ChannelId, dbm: f32 },

    /// The output phase of a channel changed.
    PhaseChanged { channel: ChannelId, degrees: f32 },

    /// The RF output of a channel was switched on or off.
    RfOutputChanged { channel: ChannelId, on: bool },

    /// The frequency reference source changed.
    ReferenceChanged { reference: Reference },

    /// The modulation mode of a channel changed.
    ModulationChanged {
        channel: ChannelId,
        mode: ModulationMode,
    },

    /// A frequency list was uploaded to the instrument.
    ListLoaded { band: ListBand, points: usize },

    /// The instrument state was replaced by a preset or saved state, so
    /// any cached values are stale.
    StateRecalled,

    /// Successfully connected to the instrument.
    Connected,

    /// The connection to the instrument was closed or lost.
    Disconnected,
}
