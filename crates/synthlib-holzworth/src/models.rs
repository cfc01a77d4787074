//! Holzworth model definitions.
//!
//! Each supported instrument is described by a [`HolzworthModel`] that
//! captures its command dialect, channel count and settable ranges. Models
//! are defined as factory functions (e.g. [`hsm4001a()`]) that return a
//! fully populated definition.
//!
//! | Model     | Dialect | Channels | Frequency          | Power          |
//! |-----------|---------|----------|--------------------|----------------|
//! | HS1001A   | Legacy  | 1        | 250 kHz – 6.7 GHz  | −100…+13 dBm   |
//! | HS2001A   | Legacy  | 1        | 10 MHz – 12 GHz    | −100…+13 dBm   |
//! | HSM1001A  | HSM     | 1        | 250 kHz – 6.7 GHz  | −100…+13 dBm   |
//! | HSM2001A  | HSM     | 2        | 250 kHz – 6.7 GHz  | −100…+13 dBm   |
//! | HSM4001A  | HSM     | 4        | 250 kHz – 6.7 GHz  | −100…+13 dBm   |

use synthlib_core::{CommandSet, FrequencyRange, PowerRange, SynthCapabilities};

/// Static model definition for a Holzworth synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct HolzworthModel {
    /// Model name as printed on the front panel and reported by `*IDN?`.
    pub name: &'static str,
    /// Machine-readable identifier.
    pub model_id: &'static str,
    /// Default baud rate for the USB virtual COM port.
    pub default_baud_rate: u32,
    pub capabilities: SynthCapabilities,
}

impl HolzworthModel {
    pub fn command_set(&self) -> CommandSet {
        self.capabilities.command_set
    }
}

const STANDARD_FREQ: FrequencyRange = FrequencyRange::new(250_000, 6_700_000_000);
const STANDARD_POWER: PowerRange = PowerRange::new(-100.0, 13.0);

/// Points per stored list on legacy instruments.
const LEGACY_LIST_POINTS: usize = 1000;
/// Points per stored list on HSM modules.
const HSM_LIST_POINTS: usize = 2000;

fn caps(
    command_set: CommandSet,
    channels: u8,
    frequency_range: FrequencyRange,
) -> SynthCapabilities {
    SynthCapabilities {
        channels,
        command_set,
        frequency_range,
        power_range: STANDARD_POWER,
        has_modulation: true,
        has_lists: true,
        max_list_points: match command_set {
            CommandSet::Legacy => LEGACY_LIST_POINTS,
            CommandSet::Hsm => HSM_LIST_POINTS,
        },
    }
}

/// HS1001A: single-channel legacy synthesizer, 250 kHz to 6.7 GHz.
pub fn hs1001a() -> HolzworthModel {
    HolzworthModel {
        name: "HS1001A",
        model_id: "HS1001A",
        default_baud_rate: 115_200,
        capabilities: caps(CommandSet::Legacy, 1, STANDARD_FREQ),
    }
}

/// HS2001A: single-channel legacy synthesizer with extended coverage to
/// 12 GHz (10 MHz minimum).
pub fn hs2001a() -> HolzworthModel {
    HolzworthModel {
        name: "HS2001A",
        model_id: "HS2001A",
        default_baud_rate: 115_200,
        capabilities: caps(
            CommandSet::Legacy,
            1,
            FrequencyRange::new(10_000_000, 12_000_000_000),
        ),
    }
}

/// HSM1001A: one-channel HSM module.
pub fn hsm1001a() -> HolzworthModel {
    HolzworthModel {
        name: "HSM1001A",
        model_id: "HSM1001A",
        default_baud_rate: 115_200,
        capabilities: caps(CommandSet::Hsm, 1, STANDARD_FREQ),
    }
}

/// HSM2001A: two phase-coherent channels.
pub fn hsm2001a() -> HolzworthModel {
    HolzworthModel {
        name: "HSM2001A",
        model_id: "HSM2001A",
        default_baud_rate: 115_200,
        capabilities: caps(CommandSet::Hsm, 2, STANDARD_FREQ),
    }
}

/// HSM4001A: four phase-coherent channels.
pub fn hsm4001a() -> HolzworthModel {
    HolzworthModel {
        name: "HSM4001A",
        model_id: "HSM4001A",
        default_baud_rate: 115_200,
        capabilities: caps(CommandSet::Hsm, 4, STANDARD_FREQ),
    }
}

/// Fallback for instruments not in the table: one channel of the given
/// dialect with the standard ranges.
pub fn generic(command_set: CommandSet) -> HolzworthModel {
    let name = match command_set {
        CommandSet::Legacy => "Holzworth HS",
        CommandSet::Hsm => "Holzworth HSM",
    };
    HolzworthModel {
        name,
        model_id: "generic",
        default_baud_rate: 115_200,
        capabilities: caps(command_set, 1, STANDARD_FREQ),
    }
}

/// Every model in the table.
pub fn all_models() -> Vec<HolzworthModel> {
    vec![hs1001a(), hs2001a(), hsm1001a(), hsm2001a(), hsm4001a()]
}

/// Look up a model by name, ignoring case and surrounding whitespace.
pub fn by_name(name: &str) -> Option<HolzworthModel> {
    let name = name.trim();
    all_models()
        .into_iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Resolve the model reported in an `*IDN?` reply. Unknown models fall
/// back to [`generic`], with the dialect guessed from the name.
pub fn from_identity(model: &str) -> HolzworthModel {
    by_name(model).unwrap_or_else(|| {
        let set = if model.trim().to_ascii_uppercase().starts_with("HSM") {
            CommandSet::Hsm
        } else {
            CommandSet::Legacy
        };
        tracing::warn!(model, dialect = %set, "unknown Holzworth model, using generic definition");
        generic(set)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthlib_core::ChannelId;

    #[test]
    fn table_is_consistent() {
        for model in all_models() {
            let c = &model.capabilities;
            assert!(c.channels >= 1, "{}", model.name);
            assert!(c.frequency_range.min_hz < c.frequency_range.max_hz);
            assert!(c.power_range.min_dbm < c.power_range.max_dbm);
            assert!(c.max_list_points > 0);
            assert_eq!(model.name, model.model_id);
        }
    }

    #[test]
    fn dialects_follow_model_family() {
        assert_eq!(hs1001a().command_set(), CommandSet::Legacy);
        assert_eq!(hs2001a().command_set(), CommandSet::Legacy);
        assert_eq!(hsm1001a().command_set(), CommandSet::Hsm);
        assert_eq!(hsm4001a().command_set(), CommandSet::Hsm);
    }

    #[test]
    fn channel_counts() {
        assert!(hsm4001a().capabilities.has_channel(ChannelId::new(4).unwrap()));
        assert!(!hsm2001a().capabilities.has_channel(ChannelId::new(3).unwrap()));
        assert!(!hs1001a().capabilities.has_channel(ChannelId::new(2).unwrap()));
    }

    #[test]
    fn hs2001a_extended_range() {
        let r = hs2001a().capabilities.frequency_range;
        assert!(r.contains(12_000_000_000));
        assert!(!r.contains(5_000_000));
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("hsm2001a").unwrap().name, "HSM2001A");
        assert_eq!(by_name(" HS1001A ").unwrap().name, "HS1001A");
        assert!(by_name("HP8657").is_none());
    }

    #[test]
    fn unknown_identity_falls_back() {
        let m = from_identity("HSM6001B");
        assert_eq!(m.model_id, "generic");
        assert_eq!(m.command_set(), CommandSet::Hsm);
        assert_eq!(from_identity("HS9001").command_set(), CommandSet::Legacy);
        assert_eq!(from_identity("HSM4001A").name, "HSM4001A");
    }
}
