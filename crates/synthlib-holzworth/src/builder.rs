//! HolzworthBuilder -- fluent builder for constructing [`HolzworthSynth`]
//! instances.
//!
//! Separates configuration from construction so that callers can set up
//! link parameters, retry policy and timeouts before the transport is
//! opened.
//!
//! # Example
//!
//! ```no_run
//! use synthlib_holzworth::builder::HolzworthBuilder;
//! use synthlib_holzworth::models::hsm4001a;
//! use std::time::Duration;
//!
//! # async fn example() -> synthlib_core::Result<()> {
//! let synth = HolzworthBuilder::new(hsm4001a())
//!     .command_timeout(Duration::from_millis(500))
//!     .build_tcp("192.168.1.50")
//!     .await?;
//!
//! let detected = HolzworthBuilder::detect()
//!     .build_serial("/dev/ttyACM0")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use synthlib_core::error::{Error, Result};
use synthlib_core::events::SynthEvent;
use synthlib_core::transport::Transport;
use synthlib_core::types::{ConnectionType, SynthInfo};
use synthlib_text_io::io::{IoConfig, spawn_io_task};
use synthlib_transport::{DEFAULT_BAUD_RATE, DEFAULT_COMMAND_PORT, SerialTransport, TcpTransport};
use synthlib_transport::tcp::join_host_port;

use crate::commands;
use crate::models::{self, HolzworthModel};
use crate::synth::HolzworthSynth;

/// Fluent builder for [`HolzworthSynth`].
///
/// Either name the model up front with [`new`](Self::new) or let the
/// builder identify it with `*IDN?` via [`detect`](Self::detect).
pub struct HolzworthBuilder {
    model: Option<HolzworthModel>,
    serial_port: Option<String>,
    host: Option<String>,
    baud_rate: Option<u32>,
    tcp_port: u16,
    auto_retry: bool,
    max_retries: u32,
    command_timeout: Duration,
    connect_timeout: Duration,
    query_identity: bool,
    connection: ConnectionType,
}

impl HolzworthBuilder {
    /// Create a new builder for the given model.
    pub fn new(model: HolzworthModel) -> Self {
        Self::with_model(Some(model))
    }

    /// Create a builder that resolves the model from the instrument's
    /// `*IDN?` reply at build time.
    pub fn detect() -> Self {
        Self::with_model(None)
    }

    fn with_model(model: Option<HolzworthModel>) -> Self {
        HolzworthBuilder {
            model,
            serial_port: None,
            host: None,
            baud_rate: None,
            tcp_port: DEFAULT_COMMAND_PORT,
            auto_retry: true,
            max_retries: 2,
            command_timeout: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(5),
            query_identity: true,
            connection: ConnectionType::Usb,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyACM0` or `COM3`) used by
    /// [`build`](Self::build).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Set the instrument host name or IP address used by
    /// [`build`](Self::build).
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Override the model's default baud rate.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Set the TCP command port (default: 9760).
    pub fn tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = port;
        self
    }

    /// Enable or disable automatic retry on timeout.
    pub fn auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry = enabled;
        self
    }

    /// Set the maximum number of retry attempts (default: 2).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the timeout for a single command/reply exchange (default: 1 s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the TCP connect timeout (default: 5 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether to send `*IDN?` at build time to learn the serial number and
    /// firmware version (default: true). Always on for [`detect`](Self::detect).
    pub fn query_identity(mut self, enabled: bool) -> Self {
        self.query_identity = enabled;
        self
    }

    /// Build a [`HolzworthSynth`] with a caller-provided transport.
    ///
    /// This is the entry point for tests (pass a `MockTransport` from
    /// `synthlib-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<HolzworthSynth> {
        if !transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let io = spawn_io_task(
            transport,
            IoConfig {
                command_timeout: self.command_timeout,
                auto_retry: self.auto_retry,
                max_retries: self.max_retries,
            },
        );

        let identity = if self.query_identity || self.model.is_none() {
            match io.command(commands::cmd_identify(), self.command_timeout).await {
                Ok(reply) => match commands::parse_identity(&reply) {
                    Ok(identity) => Some(identity),
                    Err(e) if self.model.is_none() => return Err(e),
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed identification reply");
                        None
                    }
                },
                Err(e) if self.model.is_none() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "instrument did not identify, using configured model");
                    None
                }
            }
        } else {
            None
        };

        let model = match (self.model, &identity) {
            (Some(model), _) => model,
            (None, Some(identity)) => models::from_identity(&identity.model),
            (None, None) => {
                return Err(Error::Protocol(
                    "model detection requires an identification reply".into(),
                ));
            }
        };

        let info = match identity {
            Some(identity) => SynthInfo {
                manufacturer: identity.manufacturer,
                model_name: model.name.to_string(),
                model_id: model.model_id.to_string(),
                serial: identity.serial,
                firmware: identity.firmware,
            },
            None => SynthInfo {
                manufacturer: commands::MANUFACTURER.to_string(),
                model_name: model.name.to_string(),
                model_id: model.model_id.to_string(),
                serial: String::new(),
                firmware: String::new(),
            },
        };

        info!(
            model = %info.model_name,
            serial = %info.serial,
            firmware = %info.firmware,
            dialect = %model.capabilities.command_set,
            "Holzworth synthesizer connected"
        );

        let (event_tx, _) = broadcast::channel(256);
        let _ = event_tx.send(SynthEvent::Connected);

        Ok(HolzworthSynth::new(
            io,
            model,
            info,
            event_tx,
            self.command_timeout,
            self.connection,
        ))
    }

    /// Build a [`HolzworthSynth`] on the instrument's USB virtual COM port.
    pub async fn build_serial(mut self, port: &str) -> Result<HolzworthSynth> {
        let baud = self
            .baud_rate
            .or_else(|| self.model.as_ref().map(|m| m.default_baud_rate))
            .unwrap_or(DEFAULT_BAUD_RATE);
        let transport = SerialTransport::open(port, baud).await?;
        self.connection = ConnectionType::Usb;
        self.build_with_transport(Box::new(transport)).await
    }

    /// Build a [`HolzworthSynth`] on the instrument's Ethernet command port.
    pub async fn build_tcp(mut self, host: &str) -> Result<HolzworthSynth> {
        let addr = join_host_port(host, self.tcp_port);
        let transport = TcpTransport::connect_with_timeout(&addr, self.connect_timeout).await?;
        self.connection = ConnectionType::Ethernet;
        self.build_with_transport(Box::new(transport)).await
    }

    /// Build using whichever of [`serial_port`](Self::serial_port) or
    /// [`host`](Self::host) was configured. The serial port wins if both
    /// are set.
    pub async fn build(self) -> Result<HolzworthSynth> {
        if let Some(port) = self.serial_port.clone() {
            self.build_serial(&port).await
        } else if let Some(host) = self.host.clone() {
            self.build_tcp(&host).await
        } else {
            Err(Error::InvalidParameter(
                "serial_port or host is required for build()".into(),
            ))
        }
    }
}
