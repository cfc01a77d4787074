//! Parsing and formatting of unit-bearing quantities.
//!
//! Synthesizer commands and replies carry values such as `1.5GHz`,
//! `-10.00 dBm`, `45deg` or `250us`. The functions here turn those strings
//! into typed values and back. Unit suffixes are case-insensitive and may
//! be separated from the number by whitespace. A bare number is interpreted
//! in the caller-supplied default unit.

use std::time::Duration;

use crate::error::{Error, Result};

/// Frequency units understood by [`parse_frequency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Hz,
    KHz,
    MHz,
    GHz,
}

impl FrequencyUnit {
    fn multiplier(self) -> u128 {
        match self {
            FrequencyUnit::Hz => 1,
            FrequencyUnit::KHz => 1_000,
            FrequencyUnit::MHz => 1_000_000,
            FrequencyUnit::GHz => 1_000_000_000,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "hz" => Some(FrequencyUnit::Hz),
            "khz" | "k" => Some(FrequencyUnit::KHz),
            "mhz" | "m" => Some(FrequencyUnit::MHz),
            "ghz" | "g" => Some(FrequencyUnit::GHz),
            _ => None,
        }
    }
}

/// Time units understood by [`parse_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanos,
    Micros,
    Millis,
    Seconds,
}

impl TimeUnit {
    fn nanos(self) -> u128 {
        match self {
            TimeUnit::Nanos => 1,
            TimeUnit::Micros => 1_000,
            TimeUnit::Millis => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "ns" => Some(TimeUnit::Nanos),
            "us" | "µs" => Some(TimeUnit::Micros),
            "ms" => Some(TimeUnit::Millis),
            "s" | "sec" => Some(TimeUnit::Seconds),
            _ => None,
        }
    }
}

/// Split `"1.5 GHz"` into `("1.5", "GHz")`.
fn split_quantity(input: &str) -> (&str, &str) {
    let s = input.trim();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(s.len());
    (&s[..end], s[end..].trim())
}

/// Parse an unsigned decimal string exactly, scaled by `multiplier`.
///
/// Returns the scaled value rounded half-up to an integer, so
/// `("1.5", 1_000_000_000)` gives `1_500_000_000` with no float error.
fn parse_scaled_decimal(number: &str, multiplier: u128) -> Option<u128> {
    let number = number.strip_prefix('+').unwrap_or(number);
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    // Anything past 18 fractional digits is below the finest unit we scale by.
    let frac_part = &frac_part[..frac_part.len().min(18)];

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut scaled = int_value.checked_mul(multiplier)?;

    if !frac_part.is_empty() {
        let frac_value: u128 = frac_part.parse().ok()?;
        let denom = 10u128.pow(frac_part.len() as u32);
        let numer = frac_value.checked_mul(multiplier)?;
        scaled = scaled.checked_add((numer + denom / 2) / denom)?;
    }
    Some(scaled)
}

/// Parse a frequency such as `"1.5GHz"`, `"1500 MHz"` or `"1500"` into hertz.
///
/// `default_unit` applies when the string carries no unit suffix.
///
/// # Example
///
/// ```
/// use synthlib_core::units::{parse_frequency, FrequencyUnit};
///
/// assert_eq!(parse_frequency("1.5GHz", FrequencyUnit::MHz).unwrap(), 1_500_000_000);
/// assert_eq!(parse_frequency("1500", FrequencyUnit::MHz).unwrap(), 1_500_000_000);
/// ```
pub fn parse_frequency(input: &str, default_unit: FrequencyUnit) -> Result<u64> {
    let (number, suffix) = split_quantity(input);
    let unit = if suffix.is_empty() {
        default_unit
    } else {
        FrequencyUnit::from_suffix(suffix).ok_or_else(|| {
            Error::InvalidParameter(format!("unknown frequency unit in {input:?}"))
        })?
    };
    if number.starts_with('-') {
        return Err(Error::InvalidParameter(format!(
            "frequency must not be negative: {input:?}"
        )));
    }
    let hz = parse_scaled_decimal(number, unit.multiplier())
        .ok_or_else(|| Error::InvalidParameter(format!("malformed frequency: {input:?}")))?;
    u64::try_from(hz)
        .map_err(|_| Error::InvalidParameter(format!("frequency too large: {input:?}")))
}

/// Parse a signed number with an optional, case-insensitive unit suffix.
fn parse_signed(input: &str, what: &str, units: &[&str]) -> Result<f32> {
    let (number, suffix) = split_quantity(input);
    if !suffix.is_empty() && !units.iter().any(|u| u.eq_ignore_ascii_case(suffix)) {
        return Err(Error::InvalidParameter(format!(
            "unknown {what} unit in {input:?}"
        )));
    }
    let value: f32 = number
        .parse()
        .map_err(|_| Error::InvalidParameter(format!("malformed {what}: {input:?}")))?;
    if !value.is_finite() {
        return Err(Error::InvalidParameter(format!("malformed {what}: {input:?}")));
    }
    Ok(value)
}

/// Parse an output power such as `"-10.5dBm"` or `"3"` into dBm.
pub fn parse_power(input: &str) -> Result<f32> {
    parse_signed(input, "power", &["dBm"])
}

/// Parse a phase such as `"45deg"` or `"90.5"` into degrees.
pub fn parse_phase(input: &str) -> Result<f32> {
    parse_signed(input, "phase", &["deg", "degrees", "°"])
}

/// Parse a percentage such as `"50%"` or `"50"`.
pub fn parse_percent(input: &str) -> Result<f32> {
    parse_signed(input, "percentage", &["%", "pct"])
}

/// Parse a time such as `"250us"`, `"10 ms"` or `"10"` into a [`Duration`].
///
/// `default_unit` applies when the string carries no unit suffix.
pub fn parse_duration(input: &str, default_unit: TimeUnit) -> Result<Duration> {
    let (number, suffix) = split_quantity(input);
    let unit = if suffix.is_empty() {
        default_unit
    } else {
        TimeUnit::from_suffix(suffix)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown time unit in {input:?}")))?
    };
    if number.starts_with('-') {
        return Err(Error::InvalidParameter(format!(
            "time must not be negative: {input:?}"
        )));
    }
    let nanos = parse_scaled_decimal(number, unit.nanos())
        .ok_or_else(|| Error::InvalidParameter(format!("malformed time: {input:?}")))?;
    let nanos = u64::try_from(nanos)
        .map_err(|_| Error::InvalidParameter(format!("time too large: {input:?}")))?;
    Ok(Duration::from_nanos(nanos))
}

/// Format a frequency in hertz as a human-readable MHz string.
///
/// ```
/// use synthlib_core::units::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(1_500_000_000), "1500.000000 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: u64) -> String {
    let mhz = freq_hz as f64 / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_with_units() {
        assert_eq!(parse_frequency("1.5GHz", FrequencyUnit::Hz).unwrap(), 1_500_000_000);
        assert_eq!(parse_frequency("1500 MHz", FrequencyUnit::Hz).unwrap(), 1_500_000_000);
        assert_eq!(parse_frequency("250khz", FrequencyUnit::Hz).unwrap(), 250_000);
        assert_eq!(parse_frequency("  42 Hz ", FrequencyUnit::MHz).unwrap(), 42);
    }

    #[test]
    fn frequency_bare_number_uses_default_unit() {
        assert_eq!(parse_frequency("1500", FrequencyUnit::MHz).unwrap(), 1_500_000_000);
        assert_eq!(parse_frequency("1500", FrequencyUnit::Hz).unwrap(), 1_500);
    }

    #[test]
    fn frequency_fraction_is_exact() {
        assert_eq!(
            parse_frequency("6.700000001GHz", FrequencyUnit::Hz).unwrap(),
            6_700_000_001
        );
        assert_eq!(parse_frequency(".5MHz", FrequencyUnit::Hz).unwrap(), 500_000);
        assert_eq!(parse_frequency("1000.000000 MHz", FrequencyUnit::Hz).unwrap(), 1_000_000_000);
    }

    #[test]
    fn frequency_rejects_garbage() {
        assert!(parse_frequency("", FrequencyUnit::MHz).is_err());
        assert!(parse_frequency("abc", FrequencyUnit::MHz).is_err());
        assert!(parse_frequency("10 parsecs", FrequencyUnit::MHz).is_err());
        assert!(parse_frequency("-5MHz", FrequencyUnit::MHz).is_err());
        assert!(parse_frequency("1.2.3MHz", FrequencyUnit::MHz).is_err());
    }

    #[test]
    fn power_parse() {
        assert_eq!(parse_power("-10.5dBm").unwrap(), -10.5);
        assert_eq!(parse_power("13 DBM").unwrap(), 13.0);
        assert_eq!(parse_power("0").unwrap(), 0.0);
        assert!(parse_power("10W").is_err());
    }

    #[test]
    fn phase_and_percent_parse() {
        assert_eq!(parse_phase("45deg").unwrap(), 45.0);
        assert_eq!(parse_phase("90.5").unwrap(), 90.5);
        assert_eq!(parse_percent("50%").unwrap(), 50.0);
        assert!(parse_percent("fifty").is_err());
    }

    #[test]
    fn duration_parse() {
        assert_eq!(
            parse_duration("250us", TimeUnit::Millis).unwrap(),
            Duration::from_micros(250)
        );
        assert_eq!(
            parse_duration("10", TimeUnit::Millis).unwrap(),
            Duration::from_millis(10)
        );
        assert_eq!(
            parse_duration("1.5 s", TimeUnit::Millis).unwrap(),
            Duration::from_millis(1500)
        );
        assert!(parse_duration("-1ms", TimeUnit::Millis).is_err());
        assert!(parse_duration("3 fortnights", TimeUnit::Millis).is_err());
    }

    #[test]
    fn format_mhz() {
        assert_eq!(format_freq_mhz(10_000_000), "10.000000 MHz");
    }
}
