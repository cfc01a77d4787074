//! Status codes returned across the C ABI.
//!
//! `1` is success. Queries that answer yes/no return `1` or `0`. Every
//! failure is a negative code derived from the driver's [`Error`].

use std::ffi::{c_int, c_short};

use synthlib_core::Error;

pub const HOLZ_OK: c_int = 1;
pub const HOLZ_FALSE: c_int = 0;
pub const HOLZ_ERR_TRANSPORT: c_int = -1;
pub const HOLZ_ERR_PROTOCOL: c_int = -2;
pub const HOLZ_ERR_TIMEOUT: c_int = -3;
pub const HOLZ_ERR_UNSUPPORTED: c_int = -4;
pub const HOLZ_ERR_INVALID_PARAMETER: c_int = -5;
pub const HOLZ_ERR_NOT_CONNECTED: c_int = -6;
pub const HOLZ_ERR_CONNECTION_LOST: c_int = -7;
pub const HOLZ_ERR_IO: c_int = -8;
pub const HOLZ_ERR_REJECTED: c_int = -9;
pub const HOLZ_ERR_DEVICE_NOT_FOUND: c_int = -10;

/// Reported when a Rust panic is caught at the boundary.
pub const HOLZ_ERR_PANIC: c_int = HOLZ_ERR_PROTOCOL;

/// `readPower` sentinel: no valid power fits in a `short` this low.
pub const READ_POWER_ERROR: c_short = c_short::MIN;

/// Map a driver error to its status code.
pub fn status_code(err: &Error) -> c_int {
    match err {
        Error::Transport(_) => HOLZ_ERR_TRANSPORT,
        Error::Protocol(_) => HOLZ_ERR_PROTOCOL,
        Error::Timeout => HOLZ_ERR_TIMEOUT,
        Error::Unsupported(_) => HOLZ_ERR_UNSUPPORTED,
        Error::InvalidParameter(_) => HOLZ_ERR_INVALID_PARAMETER,
        Error::NotConnected => HOLZ_ERR_NOT_CONNECTED,
        Error::ConnectionLost => HOLZ_ERR_CONNECTION_LOST,
        Error::Io(_) => HOLZ_ERR_IO,
        Error::Rejected(_) => HOLZ_ERR_REJECTED,
        Error::DeviceNotFound(_) => HOLZ_ERR_DEVICE_NOT_FOUND,
    }
}

/// Collapse a unit result into a status code, logging the failure.
pub(crate) fn to_status(result: synthlib_core::Result<()>) -> c_int {
    match result {
        Ok(()) => HOLZ_OK,
        Err(e) => {
            tracing::debug!(error = %e, "C ABI call failed");
            status_code(&e)
        }
    }
}

/// Narrow a status to the `short` returned by the VB-style entry points.
pub(crate) fn to_short(status: c_int) -> c_short {
    c_short::try_from(status).unwrap_or(-2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_is_negative_and_distinct() {
        let errors = [
            Error::Transport("x".into()),
            Error::Protocol("x".into()),
            Error::Timeout,
            Error::Unsupported("x".into()),
            Error::InvalidParameter("x".into()),
            Error::NotConnected,
            Error::ConnectionLost,
            Error::Io(std::io::Error::other("x")),
            Error::Rejected("x".into()),
            Error::DeviceNotFound("x".into()),
        ];
        let mut codes: Vec<c_int> = errors.iter().map(status_code).collect();
        assert!(codes.iter().all(|&c| c < 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn unit_results() {
        assert_eq!(to_status(Ok(())), HOLZ_OK);
        assert_eq!(to_status(Err(Error::Rejected("Invalid".into()))), -9);
        assert_eq!(to_short(HOLZ_ERR_DEVICE_NOT_FOUND), -10);
    }
}
