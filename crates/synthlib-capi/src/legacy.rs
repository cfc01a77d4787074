//! Per-setting exports of the HS1001 API.
//!
//! Every function takes the instrument's serial number (or socket address)
//! first and acts on channel 1. Numeric arguments use the legacy units:
//! hertz for frequencies, kHz for FM deviation, milliseconds for sweep
//! dwell and microseconds for list dwell. The `S` variants take the same
//! quantity as a string, with an optional unit suffix.

use std::ffi::{c_char, c_int, c_long, c_longlong, c_short, c_ushort};
use std::path::PathBuf;
use std::time::Duration;

use synthlib_core::units::{self, FrequencyUnit, TimeUnit};
use synthlib_core::{
    ChannelId, Error, ListBand, ListTrigger, ModulationMode, Reference, Result,
};
use synthlib_holzworth::list_file::import_list;

use crate::ffi::{c_str, device_call, device_status, guarded};
use crate::status::{HOLZ_ERR_PANIC, HOLZ_FALSE, HOLZ_OK, READ_POWER_ERROR, status_code};

const CH: ChannelId = ChannelId::CH1;

fn non_negative_hz(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| Error::InvalidParameter(format!("{what} must not be negative: {value}")))
}

fn parse_count(input: &str) -> Result<u16> {
    input
        .trim()
        .parse::<u16>()
        .map_err(|_| Error::InvalidParameter(format!("malformed point count: {input:?}")))
}

/// Borrow a string argument and parse it.
///
/// # Safety
///
/// `ptr` must be NULL or a valid NUL-terminated string.
unsafe fn parsed<T>(ptr: *const c_char, parse: impl FnOnce(&str) -> Result<T>) -> Result<T> {
    unsafe { c_str(ptr) }.and_then(parse)
}

/// Exports that take only the serial number and return a status.
macro_rules! serial_only {
    ($($(#[$doc:meta])* fn $name:ident => |$synth:ident| $call:expr;)+) => {
        $(
            $(#[$doc])*
            ///
            /// # Safety
            ///
            /// `serialnum` must be NULL or a valid NUL-terminated string.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(serialnum: *const c_char) -> c_int {
                unsafe { device_status(serialnum, |$synth| async move { $call.await }) }
            }
        )+
    };
}

serial_only! {
    /// Switch the RF output on.
    fn RFPowerOn => |s| s.set_rf_output(CH, true);
    /// Switch the RF output off.
    fn RFPowerOff => |s| s.set_rf_output(CH, false);
    /// Use the internal 100 MHz reference.
    fn ReferenceInternal => |s| s.set_reference(Reference::Internal100MHz);
    /// Lock to an external 10 MHz reference.
    fn ReferenceExternal => |s| s.set_reference(Reference::External10MHz);
    /// Disable modulation.
    fn ModEnableNo => |s| s.set_modulation(CH, ModulationMode::Off);
    fn ModEnableFM => |s| s.set_modulation(CH, ModulationMode::Fm);
    fn ModEnableAM => |s| s.set_modulation(CH, ModulationMode::Am);
    fn ModEnablePM => |s| s.set_modulation(CH, ModulationMode::Pm);
    fn ModEnablePulse => |s| s.set_modulation(CH, ModulationMode::Pulse);
    /// Enable the stepped frequency sweep.
    fn ModEnableSweep => |s| s.set_modulation(CH, ModulationMode::Sweep);
    /// Restore factory defaults.
    fn recallFactoryPreset => |s| s.recall_factory_preset();
    fn recallSavedState => |s| s.recall_saved_state();
    /// Store the current state in non-volatile memory.
    fn saveCurrentState => |s| s.save_current_state();
    /// Make the wideband list the active sweep source.
    fn EnableWideBand => |s| s.enable_list(ListBand::Wide);
    fn WideModeFreeRunning => |s| s.set_list_trigger(ListBand::Wide, ListTrigger::FreeRunning);
    fn WideModeTriggerPoint => |s| s.set_list_trigger(ListBand::Wide, ListTrigger::TriggerPoint);
    fn WideModeTriggerList => |s| s.set_list_trigger(ListBand::Wide, ListTrigger::TriggerList);
    /// Make the narrowband list the active sweep source.
    fn EnableNarrowBand => |s| s.enable_list(ListBand::Narrow);
    fn NarrowModeFreeRunning => |s| s.set_list_trigger(ListBand::Narrow, ListTrigger::FreeRunning);
    fn NarrowModeTriggerPoint => |s| s.set_list_trigger(ListBand::Narrow, ListTrigger::TriggerPoint);
    fn NarrowModeTriggerList => |s| s.set_list_trigger(ListBand::Narrow, ListTrigger::TriggerList);
}

/// `1` if the RF output is on, `0` if off, negative on error.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn isRFPowerOn(serialnum: *const c_char) -> c_short {
    let status = guarded(HOLZ_ERR_PANIC, || {
        match unsafe { device_call(serialnum, |s| async move { s.get_rf_output(CH).await }) } {
            Ok(true) => HOLZ_OK,
            Ok(false) => HOLZ_FALSE,
            Err(e) => status_code(&e),
        }
    });
    crate::status::to_short(status)
}

// Power

/// Set the output power in dBm.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setPower(serialnum: *const c_char, power: c_short) -> c_int {
    unsafe { device_status(serialnum, |s| async move { s.set_power(CH, f32::from(power)).await }) }
}

/// Set the output power from a string such as `"-10.5dBm"`.
///
/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setPowerS(serialnum: *const c_char, powerStr: *const c_char) -> c_int {
    let dbm = unsafe { parsed(powerStr, units::parse_power) };
    unsafe { device_status(serialnum, |s| async move { s.set_power(CH, dbm?).await }) }
}

/// Output power in dBm rounded to the nearest integer, or `SHRT_MIN` on
/// error.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn readPower(serialnum: *const c_char) -> c_short {
    guarded(READ_POWER_ERROR, || {
        match unsafe { device_call(serialnum, |s| async move { s.get_power(CH).await }) } {
            Ok(dbm) => dbm.round().clamp(f32::from(c_short::MIN + 1), f32::from(c_short::MAX)) as c_short,
            Err(e) => {
                tracing::debug!(error = %e, "readPower failed");
                READ_POWER_ERROR
            }
        }
    })
}

// Phase

/// Set the output phase in degrees.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setPhase(serialnum: *const c_char, phase: c_short) -> c_int {
    unsafe { device_status(serialnum, |s| async move { s.set_phase(CH, f32::from(phase)).await }) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setPhaseS(serialnum: *const c_char, phaseStr: *const c_char) -> c_int {
    let degrees = unsafe { parsed(phaseStr, units::parse_phase) };
    unsafe { device_status(serialnum, |s| async move { s.set_phase(CH, degrees?).await }) }
}

/// Output phase in whole degrees, or a negative status.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn readPhase(serialnum: *const c_char) -> c_short {
    let status = guarded(HOLZ_ERR_PANIC, || {
        match unsafe { device_call(serialnum, |s| async move { s.get_phase(CH).await }) } {
            Ok(degrees) => degrees.round() as c_int,
            Err(e) => status_code(&e),
        }
    });
    crate::status::to_short(status)
}

// Frequency

/// Set the CW frequency in hertz.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequency(serialnum: *const c_char, frequency: c_longlong) -> c_int {
    let hz = non_negative_hz(frequency, "frequency");
    unsafe { device_status(serialnum, |s| async move { s.set_frequency(CH, hz?).await }) }
}

/// Set the CW frequency from a string. Bare numbers are MHz.
///
/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyS(serialnum: *const c_char, freqStr: *const c_char) -> c_int {
    let hz = unsafe { parsed(freqStr, |s| units::parse_frequency(s, FrequencyUnit::MHz)) };
    unsafe { device_status(serialnum, |s| async move { s.set_frequency(CH, hz?).await }) }
}

/// CW frequency in hertz, or a negative status.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn readFrequency(serialnum: *const c_char) -> c_longlong {
    guarded(c_longlong::from(HOLZ_ERR_PANIC), || {
        match unsafe { device_call(serialnum, |s| async move { s.get_frequency(CH).await }) } {
            Ok(hz) => c_longlong::try_from(hz).unwrap_or(c_longlong::MAX),
            Err(e) => c_longlong::from(status_code(&e)),
        }
    })
}

// Sweep

/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyStart(serialnum: *const c_char, frequency: c_longlong) -> c_int {
    let hz = non_negative_hz(frequency, "start frequency");
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_start(CH, hz?).await }) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyStartS(serialnum: *const c_char, freqStr: *const c_char) -> c_int {
    let hz = unsafe { parsed(freqStr, |s| units::parse_frequency(s, FrequencyUnit::MHz)) };
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_start(CH, hz?).await }) }
}

/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyStop(serialnum: *const c_char, frequency: c_longlong) -> c_int {
    let hz = non_negative_hz(frequency, "stop frequency");
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_stop(CH, hz?).await }) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyStopS(serialnum: *const c_char, freqStr: *const c_char) -> c_int {
    let hz = unsafe { parsed(freqStr, |s| units::parse_frequency(s, FrequencyUnit::MHz)) };
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_stop(CH, hz?).await }) }
}

/// Set the sweep dwell time per point in milliseconds.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyDwell(serialnum: *const c_char, dwell: c_ushort) -> c_int {
    let dwell = Duration::from_millis(u64::from(dwell));
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_dwell(CH, dwell).await }) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyDwellS(serialnum: *const c_char, dwellStr: *const c_char) -> c_int {
    let dwell = unsafe { parsed(dwellStr, |s| units::parse_duration(s, TimeUnit::Millis)) };
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_dwell(CH, dwell?).await }) }
}

/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyPoints(serialnum: *const c_char, points: c_ushort) -> c_int {
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_points(CH, points).await }) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFrequencyPointsS(serialnum: *const c_char, pointsStr: *const c_char) -> c_int {
    let points = unsafe { parsed(pointsStr, parse_count) };
    unsafe { device_status(serialnum, |s| async move { s.set_sweep_points(CH, points?).await }) }
}

// Modulation parameters

/// Set the FM deviation in kHz.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFMDeviation(serialnum: *const c_char, deviation: c_short) -> c_int {
    let hz = non_negative_hz(i64::from(deviation), "FM deviation").map(|khz| khz * 1_000);
    unsafe { device_status(serialnum, |s| async move { s.set_fm_deviation(CH, hz?).await }) }
}

/// Set the FM deviation from a string. Bare numbers are kHz.
///
/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setFMDeviationS(serialnum: *const c_char, deviationStr: *const c_char) -> c_int {
    let hz = unsafe { parsed(deviationStr, |s| units::parse_frequency(s, FrequencyUnit::KHz)) };
    unsafe { device_status(serialnum, |s| async move { s.set_fm_deviation(CH, hz?).await }) }
}

/// Set the AM depth in percent.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setAMDepth(serialnum: *const c_char, depth: c_short) -> c_int {
    unsafe { device_status(serialnum, |s| async move { s.set_am_depth(CH, f32::from(depth)).await }) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setAMDepthS(serialnum: *const c_char, depthStr: *const c_char) -> c_int {
    let percent = unsafe { parsed(depthStr, units::parse_percent) };
    unsafe { device_status(serialnum, |s| async move { s.set_am_depth(CH, percent?).await }) }
}

/// Set the PM deviation in degrees.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setPMDeviation(serialnum: *const c_char, deviation: c_short) -> c_int {
    unsafe {
        device_status(serialnum, |s| async move { s.set_pm_deviation(CH, f32::from(deviation)).await })
    }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setPMDeviationS(serialnum: *const c_char, deviationStr: *const c_char) -> c_int {
    let degrees = unsafe { parsed(deviationStr, units::parse_phase) };
    unsafe { device_status(serialnum, |s| async move { s.set_pm_deviation(CH, degrees?).await }) }
}

// Lists

unsafe fn import(serialnum: *const c_char, filename: *const c_char, band: ListBand) -> c_int {
    let path = unsafe { c_str(filename) }.map(PathBuf::from);
    unsafe {
        device_status(serialnum, |s| async move {
            let points = import_list(s.as_ref(), band, path?).await?;
            tracing::info!(band = %band, points, "list imported");
            Ok(())
        })
    }
}

unsafe fn list_dwell_us(serialnum: *const c_char, dwell: c_long, band: ListBand) -> c_int {
    let dwell = u64::try_from(i64::from(dwell))
        .map(Duration::from_micros)
        .map_err(|_| Error::InvalidParameter(format!("list dwell must not be negative: {dwell}")));
    unsafe { device_status(serialnum, |s| async move { s.set_list_dwell(band, dwell?).await }) }
}

unsafe fn list_dwell_str(serialnum: *const c_char, dwell: *const c_char, band: ListBand) -> c_int {
    let dwell = unsafe { parsed(dwell, |s| units::parse_duration(s, TimeUnit::Micros)) };
    unsafe { device_status(serialnum, |s| async move { s.set_list_dwell(band, dwell?).await }) }
}

/// Load the wideband list from a text file of frequencies.
///
/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn importWideList(serialnum: *const c_char, filename: *const c_char) -> c_int {
    unsafe { import(serialnum, filename, ListBand::Wide) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setWideBandDwellS(serialnum: *const c_char, dwellStr: *const c_char) -> c_int {
    unsafe { list_dwell_str(serialnum, dwellStr, ListBand::Wide) }
}

/// Set the wideband list dwell in microseconds.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setWideBandDwell(serialnum: *const c_char, dwell: c_long) -> c_int {
    unsafe { list_dwell_us(serialnum, dwell, ListBand::Wide) }
}

/// Load the narrowband list from a text file of frequencies.
///
/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn importNarrowList(serialnum: *const c_char, filename: *const c_char) -> c_int {
    unsafe { import(serialnum, filename, ListBand::Narrow) }
}

/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setNarrowBandDwellS(serialnum: *const c_char, dwellStr: *const c_char) -> c_int {
    unsafe { list_dwell_str(serialnum, dwellStr, ListBand::Narrow) }
}

/// Set the narrowband list dwell in microseconds.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setNarrowBandDwell(serialnum: *const c_char, dwell: c_long) -> c_int {
    unsafe { list_dwell_us(serialnum, dwell, ListBand::Narrow) }
}
