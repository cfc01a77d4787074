//! Discovery of Holzworth instruments attached over USB.
//!
//! Holzworth synthesizers enumerate as USB CDC virtual COM ports. The USB
//! string descriptors carry the manufacturer name and the instrument's
//! serial number, which is how the C ABI addresses a device.

use synthlib_core::error::{Error, Result};
use tokio_serial::SerialPortType;
use tracing::debug;

/// Substring looked for in the USB manufacturer or product descriptor.
const VENDOR_MARKER: &str = "holzworth";

/// A Holzworth instrument found on a USB virtual COM port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Serial number from the USB descriptor, or the port name when the
    /// descriptor is missing.
    pub serial: String,
    /// OS port name to open (`/dev/ttyACM0`, `COM5`).
    pub port_name: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// A USB serial port as reported by the OS, before vendor filtering.
#[derive(Debug, Clone)]
struct UsbCandidate {
    port_name: String,
    serial_number: Option<String>,
    manufacturer: Option<String>,
    product: Option<String>,
}

impl UsbCandidate {
    fn is_holzworth(&self) -> bool {
        [&self.manufacturer, &self.product]
            .into_iter()
            .flatten()
            .any(|s| s.to_ascii_lowercase().contains(VENDOR_MARKER))
    }
}

/// Keep Holzworth ports, one per serial number, ordered by port name.
fn select_devices(mut candidates: Vec<UsbCandidate>) -> Vec<DiscoveredDevice> {
    candidates.sort_by(|a, b| a.port_name.cmp(&b.port_name));

    let mut devices: Vec<DiscoveredDevice> = Vec::new();
    for c in candidates.into_iter().filter(UsbCandidate::is_holzworth) {
        let serial = c
            .serial_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| c.port_name.clone());
        if devices.iter().any(|d| d.serial == serial) {
            debug!(port = %c.port_name, serial = %serial, "skipping duplicate interface");
            continue;
        }
        devices.push(DiscoveredDevice {
            serial,
            port_name: c.port_name,
            manufacturer: c.manufacturer,
            product: c.product,
        });
    }
    devices
}

/// Enumerate attached Holzworth instruments.
pub fn discover() -> Result<Vec<DiscoveredDevice>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| Error::Transport(format!("failed to enumerate serial ports: {e}")))?;

    let candidates = ports
        .into_iter()
        .filter_map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => Some(UsbCandidate {
                port_name: p.port_name,
                serial_number: usb.serial_number,
                manufacturer: usb.manufacturer,
                product: usb.product,
            }),
            _ => None,
        })
        .collect();

    let devices = select_devices(candidates);
    debug!(count = devices.len(), "Holzworth discovery complete");
    Ok(devices)
}

/// Find the attached instrument with the given serial number.
pub fn find_device(serial: &str) -> Result<DiscoveredDevice> {
    discover()?
        .into_iter()
        .find(|d| d.serial.eq_ignore_ascii_case(serial.trim()))
        .ok_or_else(|| Error::DeviceNotFound(serial.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(port: &str, serial: Option<&str>, manufacturer: &str) -> UsbCandidate {
        UsbCandidate {
            port_name: port.into(),
            serial_number: serial.map(Into::into),
            manufacturer: Some(manufacturer.into()),
            product: None,
        }
    }

    #[test]
    fn filters_by_vendor_string() {
        let devices = select_devices(vec![
            candidate("/dev/ttyACM0", Some("HS1001-1234"), "Holzworth Instrumentation"),
            candidate("/dev/ttyUSB0", Some("A5XK3RJT"), "FTDI"),
        ]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, "HS1001-1234");
        assert_eq!(devices[0].port_name, "/dev/ttyACM0");
    }

    #[test]
    fn product_string_also_matches() {
        let devices = select_devices(vec![UsbCandidate {
            port_name: "COM7".into(),
            serial_number: Some("55".into()),
            manufacturer: None,
            product: Some("HOLZWORTH HSM4001A".into()),
        }]);
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn deduplicates_by_serial() {
        let devices = select_devices(vec![
            candidate("/dev/ttyACM1", Some("900"), "Holzworth"),
            candidate("/dev/ttyACM0", Some("900"), "Holzworth"),
            candidate("/dev/ttyACM2", Some("901"), "Holzworth"),
        ]);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].port_name, "/dev/ttyACM0");
        assert_eq!(devices[1].serial, "901");
    }

    #[test]
    fn missing_serial_uses_port_name() {
        let devices = select_devices(vec![candidate("COM3", Some("  "), "Holzworth")]);
        assert_eq!(devices[0].serial, "COM3");
    }
}
