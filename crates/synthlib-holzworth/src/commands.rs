//! Holzworth command builders and reply parsers.
//!
//! All functions are pure: they produce or consume byte vectors / string
//! slices without performing any I/O. The driver sends the bytes through
//! the IO task and feeds the reply line back into the parsers here.
//!
//! # Command dialects
//!
//! HSM modules address each output through a `:CH<n>` prefix on
//! channel-scoped commands (`:CH2:FREQ:1000000000Hz`). Legacy HS
//! instruments have a single output and take the same command without the
//! prefix (`:FREQ:1000000000Hz`). Instrument-wide commands (reference,
//! save/recall, lists) never carry a channel prefix.
//!
//! Frequencies are always sent as integer hertz. Bare numbers in
//! frequency replies are megahertz.

use std::time::Duration;

use synthlib_core::units::{self, FrequencyUnit};
use synthlib_core::{
    ChannelId, CommandSet, Error, ListBand, ListTrigger, ModulationMode, Reference, Result,
};
use synthlib_text_io::protocol::encode_command;

/// Manufacturer string reported in the first `*IDN?` field.
pub const MANUFACTURER: &str = "Holzworth Instrumentation";

/// Channel prefix for a channel-scoped command in the given dialect.
pub fn channel_prefix(set: CommandSet, channel: ChannelId) -> String {
    match set {
        CommandSet::Hsm => format!(":CH{}", channel.number()),
        CommandSet::Legacy => String::new(),
    }
}

fn channel_command(set: CommandSet, channel: ChannelId, body: &str) -> Vec<u8> {
    encode_command(&format!("{}{}", channel_prefix(set, channel), body))
}

/// Format a float with a fixed number of decimals, never printing `-0`.
fn fixed(value: f32, decimals: usize) -> String {
    let rounded = format!("{:.*}", decimals, value);
    if rounded.trim_start_matches('-').bytes().all(|b| b == b'0' || b == b'.') {
        rounded.trim_start_matches('-').to_string()
    } else {
        rounded
    }
}

// ---------------------------------------------------------------
// Identity / raw
// ---------------------------------------------------------------

/// Build the identification query (`*IDN?`).
pub fn cmd_identify() -> Vec<u8> {
    encode_command("*IDN?")
}

// ---------------------------------------------------------------
// RF output
// ---------------------------------------------------------------

/// Build an RF output on/off command (`P:PWR:RF:ON` / `P:PWR:RF:OFF`).
pub fn cmd_set_rf_output(set: CommandSet, channel: ChannelId, on: bool) -> Vec<u8> {
    let state = if on { "ON" } else { "OFF" };
    channel_command(set, channel, &format!(":PWR:RF:{state}"))
}

/// Build an RF output state query (`P:PWR:RF?`).
pub fn cmd_read_rf_output(set: CommandSet, channel: ChannelId) -> Vec<u8> {
    channel_command(set, channel, ":PWR:RF?")
}

// ---------------------------------------------------------------
// Reference
// ---------------------------------------------------------------

/// Build a reference source selection command.
pub fn cmd_set_reference(reference: Reference) -> Vec<u8> {
    let body = match reference {
        Reference::Internal100MHz => ":REF:INT:100MHz",
        Reference::External10MHz => ":REF:EXT:10MHz",
        Reference::External100MHz => ":REF:EXT:100MHz",
    };
    encode_command(body)
}

/// Build a reference status query (`:REF:STATUS?`).
pub fn cmd_read_reference_status() -> Vec<u8> {
    encode_command(":REF:STATUS?")
}

// ---------------------------------------------------------------
// Modulation
// ---------------------------------------------------------------

/// Build a modulation mode command (`P:MOD:MODE:<mode>`).
pub fn cmd_set_modulation(set: CommandSet, channel: ChannelId, mode: ModulationMode) -> Vec<u8> {
    channel_command(set, channel, &format!(":MOD:MODE:{mode}"))
}

/// Build an FM deviation command (`P:MOD:FM:DEV:<hz>Hz`).
pub fn cmd_set_fm_deviation(set: CommandSet, channel: ChannelId, deviation_hz: u64) -> Vec<u8> {
    channel_command(set, channel, &format!(":MOD:FM:DEV:{deviation_hz}Hz"))
}

/// Build an AM depth command (`P:MOD:AM:DEPTH:<v>%`), one decimal.
pub fn cmd_set_am_depth(set: CommandSet, channel: ChannelId, percent: f32) -> Vec<u8> {
    channel_command(set, channel, &format!(":MOD:AM:DEPTH:{}%", fixed(percent, 1)))
}

/// Build a PM deviation command (`P:MOD:PM:DEV:<v>deg`), one decimal.
pub fn cmd_set_pm_deviation(set: CommandSet, channel: ChannelId, degrees: f32) -> Vec<u8> {
    channel_command(set, channel, &format!(":MOD:PM:DEV:{}deg", fixed(degrees, 1)))
}

// ---------------------------------------------------------------
// Power / phase / frequency
// ---------------------------------------------------------------

/// Build a power set command (`P:PWR:<v>dBm`), two decimals.
pub fn cmd_set_power(set: CommandSet, channel: ChannelId, dbm: f32) -> Vec<u8> {
    channel_command(set, channel, &format!(":PWR:{}dBm", fixed(dbm, 2)))
}

/// Build a power query (`P:PWR?`).
pub fn cmd_read_power(set: CommandSet, channel: ChannelId) -> Vec<u8> {
    channel_command(set, channel, ":PWR?")
}

/// Build a phase set command (`P:PHASE:<v>deg`), one decimal.
pub fn cmd_set_phase(set: CommandSet, channel: ChannelId, degrees: f32) -> Vec<u8> {
    channel_command(set, channel, &format!(":PHASE:{}deg", fixed(degrees, 1)))
}

/// Build a phase query (`P:PHASE?`).
pub fn cmd_read_phase(set: CommandSet, channel: ChannelId) -> Vec<u8> {
    channel_command(set, channel, ":PHASE?")
}

/// Build a CW frequency set command (`P:FREQ:<hz>Hz`).
pub fn cmd_set_frequency(set: CommandSet, channel: ChannelId, freq_hz: u64) -> Vec<u8> {
    channel_command(set, channel, &format!(":FREQ:{freq_hz}Hz"))
}

/// Build a CW frequency query (`P:FREQ?`).
pub fn cmd_read_frequency(set: CommandSet, channel: ChannelId) -> Vec<u8> {
    channel_command(set, channel, ":FREQ?")
}

// ---------------------------------------------------------------
// Stepped sweep
// ---------------------------------------------------------------

pub fn cmd_set_sweep_start(set: CommandSet, channel: ChannelId, freq_hz: u64) -> Vec<u8> {
    channel_command(set, channel, &format!(":FREQ:START:{freq_hz}Hz"))
}

pub fn cmd_set_sweep_stop(set: CommandSet, channel: ChannelId, freq_hz: u64) -> Vec<u8> {
    channel_command(set, channel, &format!(":FREQ:STOP:{freq_hz}Hz"))
}

/// Build a sweep dwell command (`P:FREQ:DWELL:<ms>ms`). The instrument
/// takes whole milliseconds; sub-millisecond remainders are truncated.
pub fn cmd_set_sweep_dwell(set: CommandSet, channel: ChannelId, dwell: Duration) -> Vec<u8> {
    channel_command(set, channel, &format!(":FREQ:DWELL:{}ms", dwell.as_millis()))
}

pub fn cmd_set_sweep_points(set: CommandSet, channel: ChannelId, points: u16) -> Vec<u8> {
    channel_command(set, channel, &format!(":FREQ:POINTS:{points}"))
}

// ---------------------------------------------------------------
// Instrument state
// ---------------------------------------------------------------

pub fn cmd_recall_factory_preset() -> Vec<u8> {
    encode_command(":SYST:PRESET")
}

pub fn cmd_recall_saved_state() -> Vec<u8> {
    encode_command(":SYST:RCL")
}

pub fn cmd_save_current_state() -> Vec<u8> {
    encode_command(":SYST:SAV")
}

// ---------------------------------------------------------------
// Wideband / narrowband lists
// ---------------------------------------------------------------

fn list_command(band: ListBand, body: &str) -> Vec<u8> {
    encode_command(&format!(":LIST:{}:{body}", band.keyword()))
}

/// Build a list enable command (`:LIST:<band>:ENABLE`).
pub fn cmd_list_enable(band: ListBand) -> Vec<u8> {
    list_command(band, "ENABLE")
}

/// Build a list clear command (`:LIST:<band>:CLEAR`).
pub fn cmd_list_clear(band: ListBand) -> Vec<u8> {
    list_command(band, "CLEAR")
}

/// Build an add-point command (`:LIST:<band>:ADD:<hz>Hz`).
pub fn cmd_list_add(band: ListBand, freq_hz: u64) -> Vec<u8> {
    list_command(band, &format!("ADD:{freq_hz}Hz"))
}

/// Build a list trigger mode command (`:LIST:<band>:MODE:<FREE|POINT|LIST>`).
pub fn cmd_list_trigger(band: ListBand, trigger: ListTrigger) -> Vec<u8> {
    list_command(band, &format!("MODE:{}", trigger.keyword()))
}

/// Build a list dwell command (`:LIST:<band>:DWELL:<us>us`), whole
/// microseconds.
pub fn cmd_list_dwell(band: ListBand, dwell: Duration) -> Vec<u8> {
    list_command(band, &format!("DWELL:{}us", dwell.as_micros()))
}

// ---------------------------------------------------------------
// Reply parsers
// ---------------------------------------------------------------

/// Parse a frequency reply such as `1000.000000 MHz`, `1.5GHz` or a bare
/// `1000` (megahertz) into hertz.
pub fn parse_frequency_response(reply: &str) -> Result<u64> {
    units::parse_frequency(reply, FrequencyUnit::MHz)
        .map_err(|_| Error::Protocol(format!("unparseable frequency reply: {reply:?}")))
}

/// Parse a power reply such as `-10.00` or `5.5 dBm`.
pub fn parse_power_response(reply: &str) -> Result<f32> {
    units::parse_power(reply)
        .map_err(|_| Error::Protocol(format!("unparseable power reply: {reply:?}")))
}

/// Parse a phase reply such as `45.0` or `90 deg`.
pub fn parse_phase_response(reply: &str) -> Result<f32> {
    units::parse_phase(reply)
        .map_err(|_| Error::Protocol(format!("unparseable phase reply: {reply:?}")))
}

/// Parse an RF state reply. Accepts `ON`/`OFF`/`1`/`0`, optionally
/// preceded by other words (`RF ON`).
pub fn parse_rf_state_response(reply: &str) -> Result<bool> {
    let word = reply
        .split_whitespace()
        .last()
        .unwrap_or("")
        .to_ascii_uppercase();
    match word.as_str() {
        "ON" | "1" => Ok(true),
        "OFF" | "0" => Ok(false),
        _ => Err(Error::Protocol(format!(
            "unparseable RF state reply: {reply:?}"
        ))),
    }
}

/// Fields of an `*IDN?` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

/// Parse `Holzworth Instrumentation,<model>,<serial>,<fw>`.
///
/// Serial and firmware may be missing on older firmware; the model is
/// required.
pub fn parse_identity(reply: &str) -> Result<Identity> {
    let mut fields = reply.split(',').map(str::trim);
    let manufacturer = fields.next().unwrap_or("").to_string();
    let model = fields.next().unwrap_or("").to_string();
    if manufacturer.is_empty() || model.is_empty() {
        return Err(Error::Protocol(format!(
            "unrecognized identification reply: {reply:?}"
        )));
    }
    Ok(Identity {
        manufacturer,
        model,
        serial: fields.next().unwrap_or("").to_string(),
        firmware: fields.next().unwrap_or("").to_string(),
    })
}
