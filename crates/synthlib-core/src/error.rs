//! Library-wide error type.
//!
//! The C layer maps each variant onto one of the integer status codes
//! returned by the `HolzworthHS1001` exports, so variants stay coarse.

/// Everything that can go wrong between a caller and a synthesizer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (USB virtual COM port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed or unexpected reply line).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a reply from the instrument.
    ///
    /// This typically indicates the instrument is powered off, the wrong
    /// serial port was opened, or the Ethernet command port is unreachable.
    #[error("timeout waiting for response")]
    Timeout,

    /// The requested operation is not supported by this instrument model.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// An invalid parameter was passed to a synthesizer command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the instrument has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the instrument was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The instrument answered with an error line (e.g. `Invalid Command`).
    #[error("instrument rejected command: {0}")]
    Rejected(String),

    /// No attached instrument matched the requested identity.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Any other OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let cases = [
            (Error::Transport("COM7 busy".into()), "transport error: COM7 busy"),
            (Error::Protocol("no terminator".into()), "protocol error: no terminator"),
            (Error::Timeout, "timeout waiting for response"),
            (Error::Unsupported("phase on HS1001A".into()), "unsupported operation: phase on HS1001A"),
            (Error::InvalidParameter("-200 dBm".into()), "invalid parameter: -200 dBm"),
            (Error::NotConnected, "not connected"),
            (Error::ConnectionLost, "connection lost"),
            (Error::Rejected("Invalid Command".into()), "instrument rejected command: Invalid Command"),
            (Error::DeviceNotFound("HS-12345".into()), "device not found: HS-12345"),
        ];
        for (err, text) in cases {
            assert_eq!(err.to_string(), text);
        }
    }

    #[test]
    fn io_errors_convert() {
        let e: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "ttyACM0").into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("ttyACM0"));
    }

    #[test]
    fn crosses_threads() {
        fn check<T: Send + Sync + 'static>() {}
        check::<Error>();
    }
}
