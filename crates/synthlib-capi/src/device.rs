//! Device management and raw command exports.
//!
//! USB instruments are addressed by the serial number from their USB
//! descriptor. Ethernet instruments are addressed by the address string
//! passed to `openHolzSocket`.

use std::ffi::{c_char, c_int, c_short};
use std::sync::Arc;

use synthlib_core::{Error, Result, Synthesizer};
use synthlib_holzworth::{HolzworthBuilder, discover, find_device, models};
use synthlib_transport::DEFAULT_COMMAND_PORT;
use tracing::{debug, info, warn};

use crate::ffi::{c_str, device_call, guarded, return_string, string_or_error};
use crate::registry;
use crate::runtime::block_on;
use crate::status::{HOLZ_ERR_PANIC, HOLZ_FALSE, HOLZ_OK, status_code, to_short, to_status};

/// Size of the caller buffer `usbCommWriteVB` writes into, NUL included.
pub const VB_RETURN_BUF_LEN: usize = 256;

/// Open the USB instrument with serial number `serial`, unless it is
/// already open. `model_name` pins the model; otherwise it is detected.
pub(crate) fn open_usb(serial: &str, model_name: Option<&str>) -> Result<()> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(Error::InvalidParameter("empty serial number".into()));
    }
    if registry::contains(serial) {
        debug!(serial = %serial, "device already open");
        return Ok(());
    }

    let device = find_device(serial)?;
    let builder = match model_name.and_then(models::by_name) {
        Some(model) => HolzworthBuilder::new(model),
        None => HolzworthBuilder::detect(),
    };
    let synth = block_on(builder.build_serial(&device.port_name))??;
    info!(serial = %serial, port = %device.port_name, "opened USB device");
    register(serial, Arc::new(synth));
    Ok(())
}

/// Open an Ethernet instrument. `addr` is `host` or `host:port`.
pub(crate) fn open_socket(addr: &str) -> Result<()> {
    let key = addr.trim();
    if registry::contains(key) {
        debug!(addr = %key, "socket already open");
        return Ok(());
    }

    let (host, port) = split_socket_addr(key)?;
    let synth = block_on(HolzworthBuilder::detect().tcp_port(port).build_tcp(&host))??;
    info!(addr = %key, "opened Ethernet device");
    register(key, Arc::new(synth));
    Ok(())
}

/// Insert a device, closing whatever was registered under the same key.
pub(crate) fn register(key: &str, synth: Arc<dyn Synthesizer>) {
    if let Some(previous) = registry::insert(key, synth) {
        warn!(key = %key, "replacing open device");
        close_devices(vec![(key.to_string(), previous)]);
    }
}

pub(crate) fn close_devices(devices: Vec<(String, Arc<dyn Synthesizer>)>) {
    for (key, synth) in devices {
        match block_on(synth.close()) {
            Ok(Ok(())) => debug!(key = %key, "device closed"),
            Ok(Err(e)) => warn!(key = %key, error = %e, "error closing device"),
            Err(e) => warn!(key = %key, error = %e, "runtime unavailable while closing"),
        }
    }
}

fn split_socket_addr(addr: &str) -> Result<(String, u16)> {
    if addr.is_empty() {
        return Err(Error::InvalidParameter("empty IP address".into()));
    }
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| Error::InvalidParameter(format!("invalid port in {addr:?}")))
    };
    match addr.rsplit_once(':') {
        Some((host, port)) if host.starts_with('[') && host.ends_with(']') => {
            Ok((host[1..host.len() - 1].to_string(), parse_port(port)?))
        }
        Some((host, port)) if !host.contains(':') => Ok((host.to_string(), parse_port(port)?)),
        _ => Ok((addr.to_string(), DEFAULT_COMMAND_PORT)),
    }
}

fn attached_serials() -> Result<String> {
    let serials: Vec<String> = discover()?.into_iter().map(|d| d.serial).collect();
    Ok(serials.join(","))
}

fn is_attached(serial: &str) -> Result<bool> {
    if registry::contains(serial) {
        return Ok(true);
    }
    match find_device(serial) {
        Ok(_) => Ok(true),
        Err(Error::DeviceNotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Open a USB instrument by manufacturer, device name and serial number.
///
/// # Safety
///
/// Every argument must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn open_device(
    manuf: *const c_char,
    devname: *const c_char,
    serialnum: *const c_char,
) -> c_int {
    guarded(HOLZ_ERR_PANIC, || {
        let result = (|| {
            let manuf = unsafe { c_str(manuf) }?;
            let devname = unsafe { c_str(devname) }?;
            let serial = unsafe { c_str(serialnum) }?;
            debug!(manufacturer = %manuf, device = %devname, serial = %serial, "open_device");
            open_usb(serial, Some(devname))
        })();
        to_status(result)
    })
}

/// Comma-separated serial numbers of every attached instrument.
#[unsafe(no_mangle)]
pub extern "C" fn getAttachedDevices() -> *mut c_char {
    guarded(std::ptr::null_mut(), || {
        return_string(string_or_error(attached_serials()))
    })
}

/// Open the USB instrument with the given serial number.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn openDevice(serialnum: *const c_char) -> c_int {
    guarded(HOLZ_ERR_PANIC, || {
        to_status(unsafe { c_str(serialnum) }.and_then(|serial| open_usb(serial, None)))
    })
}

/// `1` if the instrument is attached or open, `0` if not.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn deviceAttached(serialnum: *const c_char) -> c_int {
    guarded(HOLZ_ERR_PANIC, || {
        match unsafe { c_str(serialnum) }.and_then(is_attached) {
            Ok(true) => HOLZ_OK,
            Ok(false) => HOLZ_FALSE,
            Err(e) => status_code(&e),
        }
    })
}

/// [`openDevice`] returning `short`.
///
/// # Safety
///
/// `serialnum` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn openDeviceVB(serialnum: *const c_char) -> c_short {
    to_short(unsafe { openDevice(serialnum) })
}

/// Close every open instrument.
#[unsafe(no_mangle)]
pub extern "C" fn close_all() {
    guarded((), || {
        let devices = registry::drain();
        info!(count = devices.len(), "closing all devices");
        close_devices(devices);
    })
}

/// Open an instrument on its Ethernet command port.
///
/// # Safety
///
/// `ipAddr` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn openHolzSocket(ipAddr: *const c_char) -> c_int {
    guarded(HOLZ_ERR_PANIC, || {
        to_status(unsafe { c_str(ipAddr) }.and_then(open_socket))
    })
}

unsafe fn raw_command(serialnum: *const c_char, pBuf: *const c_char) -> Result<String> {
    let command = unsafe { c_str(pBuf) }?.to_string();
    unsafe { device_call(serialnum, |synth| async move { synth.write_raw(&command).await }) }
}

/// Send a raw command and return the reply.
///
/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn usbCommWrite(serialnum: *const c_char, pBuf: *const c_char) -> *mut c_char {
    guarded(std::ptr::null_mut(), || {
        return_string(string_or_error(unsafe { raw_command(serialnum, pBuf) }))
    })
}

/// Send a raw command and copy the reply into `returnBufVB`. Returns the
/// number of bytes copied, excluding the NUL.
///
/// # Safety
///
/// `serialnum` and `pBuf` must be NULL or valid NUL-terminated strings.
/// `returnBufVB` must be NULL or point to at least
/// [`VB_RETURN_BUF_LEN`] writable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn usbCommWriteVB(
    serialnum: *const c_char,
    pBuf: *const c_char,
    returnBufVB: *mut c_char,
) -> c_short {
    let status = guarded(HOLZ_ERR_PANIC, || {
        if returnBufVB.is_null() {
            return status_code(&Error::InvalidParameter("NULL return buffer".into()));
        }
        match unsafe { raw_command(serialnum, pBuf) } {
            Ok(reply) => {
                let bytes: Vec<u8> = reply.into_bytes().into_iter().filter(|&b| b != 0).collect();
                let len = bytes.len().min(VB_RETURN_BUF_LEN - 1);
                // SAFETY: the caller guarantees VB_RETURN_BUF_LEN writable bytes.
                unsafe {
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), returnBufVB.cast::<u8>(), len);
                    *returnBufVB.add(len) = 0;
                }
                len as c_int
            }
            Err(e) => {
                debug!(error = %e, "usbCommWriteVB failed");
                status_code(&e)
            }
        }
    });
    to_short(status)
}

/// Send a raw command and return the reply. Same behaviour as
/// [`usbCommWrite`].
///
/// # Safety
///
/// Both arguments must be NULL or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn write_string3(serialnum: *const c_char, pBuf: *const c_char) -> *mut c_char {
    unsafe { usbCommWrite(serialnum, pBuf) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    use crate::status::*;
    use crate::test_support::register_mock;
    use synthlib_test_harness::MockTransport;

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn socket_addresses() {
        assert_eq!(
            split_socket_addr("192.168.1.50").unwrap(),
            ("192.168.1.50".to_string(), DEFAULT_COMMAND_PORT)
        );
        assert_eq!(
            split_socket_addr("192.168.1.50:9000").unwrap(),
            ("192.168.1.50".to_string(), 9000)
        );
        assert_eq!(split_socket_addr("[::1]:9000").unwrap(), ("::1".to_string(), 9000));
        assert_eq!(split_socket_addr("fe80::1").unwrap(), ("fe80::1".to_string(), DEFAULT_COMMAND_PORT));
        assert!(split_socket_addr("10.0.0.1:http").is_err());
        assert!(split_socket_addr("").is_err());
    }

    #[test]
    fn null_arguments_are_invalid() {
        unsafe {
            assert_eq!(openDevice(std::ptr::null()), HOLZ_ERR_INVALID_PARAMETER);
            assert_eq!(openDeviceVB(std::ptr::null()), HOLZ_ERR_INVALID_PARAMETER as c_short);
            assert_eq!(deviceAttached(std::ptr::null()), HOLZ_ERR_INVALID_PARAMETER);
            assert_eq!(openHolzSocket(std::ptr::null()), HOLZ_ERR_INVALID_PARAMETER);
            let serial = cstr("x");
            assert_eq!(
                open_device(std::ptr::null(), std::ptr::null(), serial.as_ptr()),
                HOLZ_ERR_INVALID_PARAMETER
            );
        }
    }

    #[test]
    fn open_device_that_is_already_registered() {
        register_mock("CAPI-OPEN-1", MockTransport::new());
        let serial = cstr("CAPI-OPEN-1");
        unsafe {
            assert_eq!(openDevice(serial.as_ptr()), HOLZ_OK);
            assert_eq!(deviceAttached(serial.as_ptr()), HOLZ_OK);
        }
    }

    #[test]
    fn raw_command_round_trip() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH1:PWR?", "-5.00 dBm");
        mock.expect_line(":CH1:BOGUS", "Invalid Command");
        register_mock("CAPI-RAW-1", mock);

        let serial = cstr("CAPI-RAW-1");
        let query = cstr(":CH1:PWR?");
        let bogus = cstr(":CH1:BOGUS");
        unsafe {
            let reply = CStr::from_ptr(usbCommWrite(serial.as_ptr(), query.as_ptr()));
            assert_eq!(reply.to_str().unwrap(), "-5.00 dBm");
            let reply = CStr::from_ptr(write_string3(serial.as_ptr(), bogus.as_ptr()));
            assert_eq!(reply.to_str().unwrap(), "Invalid Command");
        }
    }

    #[test]
    fn raw_command_must_be_one_line() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH1:PWR?", "-5.00 dBm");
        let log = mock.sent_log();
        register_mock("CAPI-RAW-2", mock);

        let serial = cstr("CAPI-RAW-2");
        let two_lines = cstr(":CH1:PWR:ON\n:CH1:PWR?");
        let query = cstr(":CH1:PWR?\r\n");
        unsafe {
            let reply = CStr::from_ptr(usbCommWrite(serial.as_ptr(), two_lines.as_ptr()));
            assert!(reply.to_str().unwrap().starts_with("ERROR: invalid parameter"));
            assert!(log.is_empty());

            // A trailing terminator is still fine.
            let reply = CStr::from_ptr(usbCommWrite(serial.as_ptr(), query.as_ptr()));
            assert_eq!(reply.to_str().unwrap(), "-5.00 dBm");
        }
    }

    #[test]
    fn raw_command_on_unknown_device_reports_error() {
        let serial = cstr("CAPI-NOBODY");
        let cmd = cstr("*IDN?");
        unsafe {
            let reply = CStr::from_ptr(usbCommWrite(serial.as_ptr(), cmd.as_ptr()));
            assert!(reply.to_str().unwrap().starts_with("ERROR: "));
        }
    }

    #[test]
    fn vb_write_truncates_reply() {
        let long_reply = "x".repeat(400);
        let mut mock = MockTransport::new();
        mock.expect_line("*IDN?", "Holzworth Instrumentation,HS1001A,1,1.0");
        mock.expect_line("DUMP?", &long_reply);
        register_mock("CAPI-VB-1", mock);

        let serial = cstr("CAPI-VB-1");
        let mut buf = [0x7f as c_char; VB_RETURN_BUF_LEN];
        unsafe {
            let idn = cstr("*IDN?");
            let n = usbCommWriteVB(serial.as_ptr(), idn.as_ptr(), buf.as_mut_ptr());
            let text = CStr::from_ptr(buf.as_ptr()).to_str().unwrap();
            assert_eq!(text, "Holzworth Instrumentation,HS1001A,1,1.0");
            assert_eq!(n as usize, text.len());

            let dump = cstr("DUMP?");
            let n = usbCommWriteVB(serial.as_ptr(), dump.as_ptr(), buf.as_mut_ptr());
            assert_eq!(n as usize, VB_RETURN_BUF_LEN - 1);
            assert_eq!(buf[VB_RETURN_BUF_LEN - 1], 0);
        }
    }

    #[test]
    fn vb_write_requires_buffer() {
        let serial = cstr("CAPI-VB-2");
        let cmd = cstr("*IDN?");
        let status = unsafe { usbCommWriteVB(serial.as_ptr(), cmd.as_ptr(), std::ptr::null_mut()) };
        assert_eq!(status, HOLZ_ERR_INVALID_PARAMETER as c_short);
    }

    #[test]
    fn vb_write_unknown_device() {
        let serial = cstr("CAPI-VB-NOBODY");
        let cmd = cstr("*IDN?");
        let mut buf = [0 as c_char; VB_RETURN_BUF_LEN];
        let status = unsafe { usbCommWriteVB(serial.as_ptr(), cmd.as_ptr(), buf.as_mut_ptr()) };
        assert_eq!(status, HOLZ_ERR_NOT_CONNECTED as c_short);
    }

    #[test]
    fn closing_removes_device() {
        register_mock("CAPI-CLOSE-1", MockTransport::new());
        let removed = registry::remove("CAPI-CLOSE-1").unwrap();
        close_devices(vec![("CAPI-CLOSE-1".into(), removed)]);

        let serial = cstr("CAPI-CLOSE-1");
        let cmd = cstr("*IDN?");
        let reply = unsafe { CStr::from_ptr(usbCommWrite(serial.as_ptr(), cmd.as_ptr())) };
        assert!(reply.to_str().unwrap().starts_with("ERROR: "));
    }
}
