//! Core types used throughout synthlib.
//!
//! These types describe synthesizer state independently of the command
//! dialect (legacy single-channel instruments vs. HSM modules) used to
//! talk to the hardware.

use std::fmt;
use std::str::FromStr;

/// Output channel identifier (1-based).
///
/// Legacy instruments expose a single channel; HSM modules expose one, two
/// or four. The command builders turn this into the `:CH<n>` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    /// The first (and on legacy instruments, only) output channel.
    pub const CH1: ChannelId = ChannelId(1);

    /// Create a `ChannelId` from a 1-based channel number.
    ///
    /// Returns `None` for channel 0.
    pub fn new(number: u8) -> Option<Self> {
        if number == 0 { None } else { Some(ChannelId(number)) }
    }

    /// Return the 1-based channel number.
    pub fn number(&self) -> u8 {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        ChannelId::CH1
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

/// Command dialect spoken by an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandSet {
    /// Older single-channel instruments (HS1001A and friends). Commands
    /// carry no channel prefix.
    Legacy,
    /// HSM synthesizer modules. Channel-scoped commands are prefixed with
    /// `:CH<n>`.
    Hsm,
}

impl fmt::Display for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSet::Legacy => write!(f, "legacy"),
            CommandSet::Hsm => write!(f, "HSM"),
        }
    }
}

/// Physical link used to reach the instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    /// USB virtual COM port.
    Usb,
    /// TCP socket to the instrument's Ethernet command port.
    Ethernet,
}

/// Frequency reference source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Internal 100 MHz oven-controlled reference.
    Internal100MHz,
    /// External 10 MHz reference input.
    External10MHz,
    /// External 100 MHz reference input.
    External100MHz,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reference::Internal100MHz => "internal 100 MHz",
            Reference::External10MHz => "external 10 MHz",
            Reference::External100MHz => "external 100 MHz",
        };
        write!(f, "{s}")
    }
}

/// Modulation mode of an output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModulationMode {
    /// Continuous wave, no modulation.
    Off,
    /// Frequency modulation.
    Fm,
    /// Amplitude modulation.
    Am,
    /// Phase modulation.
    Pm,
    /// Pulse modulation.
    Pulse,
    /// Stepped frequency sweep between the configured start/stop points.
    Sweep,
}

impl fmt::Display for ModulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModulationMode::Off => "OFF",
            ModulationMode::Fm => "FM",
            ModulationMode::Am => "AM",
            ModulationMode::Pm => "PM",
            ModulationMode::Pulse => "PULSE",
            ModulationMode::Sweep => "SWEEP",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into one of the enums in
/// this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError {
    kind: &'static str,
    input: String,
}

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.input)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for ModulationMode {
    type Err = ParseKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OFF" | "NONE" | "CW" => Ok(ModulationMode::Off),
            "FM" => Ok(ModulationMode::Fm),
            "AM" => Ok(ModulationMode::Am),
            "PM" => Ok(ModulationMode::Pm),
            "PULSE" => Ok(ModulationMode::Pulse),
            "SWEEP" => Ok(ModulationMode::Sweep),
            _ => Err(ParseKindError {
                kind: "modulation mode",
                input: s.to_string(),
            }),
        }
    }
}

/// Which of the two on-instrument sweep tables a list command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListBand {
    /// Wideband list: large frequency steps, synthesizer relocks per point.
    Wide,
    /// Narrowband list: fine steps within the current loop bandwidth.
    Narrow,
}

impl ListBand {
    /// The keyword used in `:LIST:<band>:...` commands.
    pub fn keyword(&self) -> &'static str {
        match self {
            ListBand::Wide => "WIDE",
            ListBand::Narrow => "NARROW",
        }
    }
}

impl fmt::Display for ListBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListBand::Wide => write!(f, "wideband"),
            ListBand::Narrow => write!(f, "narrowband"),
        }
    }
}

impl FromStr for ListBand {
    type Err = ParseKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wide" | "wideband" => Ok(ListBand::Wide),
            "narrow" | "narrowband" => Ok(ListBand::Narrow),
            _ => Err(ParseKindError {
                kind: "list band",
                input: s.to_string(),
            }),
        }
    }
}

/// How a stored list advances from one point to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListTrigger {
    /// Step through the list continuously at the configured dwell time.
    FreeRunning,
    /// Advance one point per external trigger.
    TriggerPoint,
    /// Run the whole list once per external trigger.
    TriggerList,
}

impl ListTrigger {
    /// The keyword used in `:LIST:<band>:MODE:<trigger>` commands.
    pub fn keyword(&self) -> &'static str {
        match self {
            ListTrigger::FreeRunning => "FREE",
            ListTrigger::TriggerPoint => "POINT",
            ListTrigger::TriggerList => "LIST",
        }
    }
}

impl FromStr for ListTrigger {
    type Err = ParseKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" | "free-running" | "freerunning" => Ok(ListTrigger::FreeRunning),
            "point" | "trigger-point" => Ok(ListTrigger::TriggerPoint),
            "list" | "trigger-list" => Ok(ListTrigger::TriggerList),
            _ => Err(ParseKindError {
                kind: "list trigger",
                input: s.to_string(),
            }),
        }
    }
}

/// An inclusive frequency range in hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyRange {
    /// Lowest settable frequency in hertz.
    pub min_hz: u64,
    /// Highest settable frequency in hertz.
    pub max_hz: u64,
}

impl FrequencyRange {
    pub const fn new(min_hz: u64, max_hz: u64) -> Self {
        FrequencyRange { min_hz, max_hz }
    }

    pub fn contains(&self, freq_hz: u64) -> bool {
        freq_hz >= self.min_hz && freq_hz <= self.max_hz
    }
}

/// An inclusive output power range in dBm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerRange {
    pub min_dbm: f32,
    pub max_dbm: f32,
}

impl PowerRange {
    pub const fn new(min_dbm: f32, max_dbm: f32) -> Self {
        PowerRange { min_dbm, max_dbm }
    }

    pub fn contains(&self, dbm: f32) -> bool {
        dbm >= self.min_dbm && dbm <= self.max_dbm
    }
}

/// Static identity of a connected synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthInfo {
    /// Manufacturer string as reported by `*IDN?`.
    pub manufacturer: String,
    /// Human-readable model name (e.g. "HSM4001A").
    pub model_name: String,
    /// Model identifier used for lookups.
    pub model_id: String,
    /// Instrument serial number, empty when the instrument did not report one.
    pub serial: String,
    /// Firmware version, empty when unknown.
    pub firmware: String,
}

/// What a given synthesizer model can do.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthCapabilities {
    /// Number of independent output channels.
    pub channels: u8,
    /// Command dialect spoken by the instrument.
    pub command_set: CommandSet,
    /// Settable CW frequency range.
    pub frequency_range: FrequencyRange,
    /// Settable output power range.
    pub power_range: PowerRange,
    /// Whether AM/FM/PM/pulse modulation is available.
    pub has_modulation: bool,
    /// Whether wideband/narrowband list sweeps are available.
    pub has_lists: bool,
    /// Maximum number of points in one stored list.
    pub max_list_points: usize,
}

impl SynthCapabilities {
    /// Whether `channel` exists on this model.
    pub fn has_channel(&self, channel: ChannelId) -> bool {
        channel.number() <= self.channels
    }
}
