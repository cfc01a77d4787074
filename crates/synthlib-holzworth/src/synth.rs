//! HolzworthSynth -- the [`Synthesizer`] implementation for Holzworth
//! instruments.
//!
//! This module ties the command builders ([`commands`]) to the line IO task
//! to produce a working driver for both the legacy HS and the HSM command
//! dialects. Every setter validates its arguments against the model's
//! capabilities before anything is sent, and publishes a [`SynthEvent`]
//! once the instrument has acknowledged the change.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use synthlib_core::error::{Error, Result};
use synthlib_core::events::SynthEvent;
use synthlib_core::synth::Synthesizer;
use synthlib_core::types::*;
use synthlib_core::units::format_freq_mhz;
use synthlib_text_io::io::SynthIo;
use synthlib_text_io::protocol::encode_command;

use crate::commands;
use crate::models::HolzworthModel;

/// Accepted phase offset range in degrees.
const PHASE_RANGE: (f32, f32) = (0.0, 360.0);
/// Accepted PM deviation range in degrees.
const PM_DEVIATION_RANGE: (f32, f32) = (0.0, 360.0);

/// A connected Holzworth synthesizer.
///
/// Constructed via [`HolzworthBuilder`](crate::builder::HolzworthBuilder).
/// All instrument communication goes through the IO task spawned at build
/// time, so methods take `&self` and may be called from several tasks.
pub struct HolzworthSynth {
    io: SynthIo,
    model: HolzworthModel,
    event_tx: broadcast::Sender<SynthEvent>,
    command_timeout: Duration,
    info: SynthInfo,
    connection: ConnectionType,
}

impl HolzworthSynth {
    /// Create a new `HolzworthSynth` from its constituent parts.
    ///
    /// Called by the builder; callers should use the builder API instead.
    pub(crate) fn new(
        io: SynthIo,
        model: HolzworthModel,
        info: SynthInfo,
        event_tx: broadcast::Sender<SynthEvent>,
        command_timeout: Duration,
        connection: ConnectionType,
    ) -> Self {
        HolzworthSynth {
            io,
            model,
            event_tx,
            command_timeout,
            info,
            connection,
        }
    }

    /// The model definition in use.
    pub fn model(&self) -> &HolzworthModel {
        &self.model
    }

    /// How the instrument is attached.
    pub fn connection(&self) -> &ConnectionType {
        &self.connection
    }

    /// Whether the IO task is still running.
    pub fn is_connected(&self) -> bool {
        self.io.is_running()
    }

    /// Query the reference lock status text (`:REF:STATUS?`).
    pub async fn reference_status(&self) -> Result<String> {
        self.execute(commands::cmd_read_reference_status()).await
    }

    fn command_set(&self) -> CommandSet {
        self.model.capabilities.command_set
    }

    async fn execute(&self, cmd: Vec<u8>) -> Result<String> {
        self.io.command(cmd, self.command_timeout).await
    }

    /// Send a setter and discard the acknowledgement text.
    async fn execute_set(&self, cmd: Vec<u8>) -> Result<()> {
        let ack = self.execute(cmd).await?;
        debug!(ack = %ack, "command acknowledged");
        Ok(())
    }

    fn emit(&self, event: SynthEvent) {
        let _ = self.event_tx.send(event);
    }

    fn check_channel(&self, channel: ChannelId) -> Result<()> {
        if self.model.capabilities.has_channel(channel) {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "{} has no channel {}",
                self.model.name,
                channel.number()
            )))
        }
    }

    fn check_frequency(&self, freq_hz: u64) -> Result<()> {
        let range = self.model.capabilities.frequency_range;
        if range.contains(freq_hz) {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "frequency {} out of range ({} - {})",
                format_freq_mhz(freq_hz),
                format_freq_mhz(range.min_hz),
                format_freq_mhz(range.max_hz)
            )))
        }
    }

    fn check_modulation(&self) -> Result<()> {
        if self.model.capabilities.has_modulation {
            Ok(())
        } else {
            Err(Error::Unsupported(format!(
                "{} has no modulation",
                self.model.name
            )))
        }
    }

    fn check_lists(&self) -> Result<()> {
        if self.model.capabilities.has_lists {
            Ok(())
        } else {
            Err(Error::Unsupported(format!(
                "{} has no list sweeps",
                self.model.name
            )))
        }
    }
}

fn check_span(value: f32, (min, max): (f32, f32), what: &str) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{what} {value} out of range ({min} - {max})"
        )))
    }
}

#[async_trait]
impl Synthesizer for HolzworthSynth {
    fn info(&self) -> &SynthInfo {
        &self.info
    }

    fn capabilities(&self) -> &SynthCapabilities {
        &self.model.capabilities
    }

    async fn identify(&self) -> Result<String> {
        self.execute(commands::cmd_identify()).await
    }

    async fn write_raw(&self, command: &str) -> Result<String> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::InvalidParameter("empty command".into()));
        }
        // One line out, one reply in; a second line would leave its reply
        // queued for the next caller.
        if command.contains(['\r', '\n']) {
            return Err(Error::InvalidParameter(
                "raw command must be a single line".into(),
            ));
        }
        debug!(command, "raw command");
        // A rejection is still the instrument's answer to a raw command.
        match self.execute(encode_command(command)).await {
            Err(Error::Rejected(reply)) => Ok(reply),
            other => other,
        }
    }

    async fn set_rf_output(&self, channel: ChannelId, on: bool) -> Result<()> {
        self.check_channel(channel)?;
        debug!(%channel, on, "setting RF output");
        self.execute_set(commands::cmd_set_rf_output(self.command_set(), channel, on))
            .await?;
        self.emit(SynthEvent::RfOutputChanged { channel, on });
        Ok(())
    }

    async fn get_rf_output(&self, channel: ChannelId) -> Result<bool> {
        self.check_channel(channel)?;
        let reply = self
            .execute(commands::cmd_read_rf_output(self.command_set(), channel))
            .await?;
        commands::parse_rf_state_response(&reply)
    }

    async fn set_reference(&self, reference: Reference) -> Result<()> {
        debug!(%reference, "setting reference");
        self.execute_set(commands::cmd_set_reference(reference))
            .await?;
        self.emit(SynthEvent::ReferenceChanged { reference });
        Ok(())
    }

    async fn set_frequency(&self, channel: ChannelId, freq_hz: u64) -> Result<()> {
        self.check_channel(channel)?;
        self.check_frequency(freq_hz)?;
        debug!(%channel, freq_hz, "setting frequency");
        self.execute_set(commands::cmd_set_frequency(self.command_set(), channel, freq_hz))
            .await?;
        self.emit(SynthEvent::FrequencyChanged { channel, freq_hz });
        Ok(())
    }

    async fn get_frequency(&self, channel: ChannelId) -> Result<u64> {
        self.check_channel(channel)?;
        debug!(%channel, "reading frequency");
        let reply = self
            .execute(commands::cmd_read_frequency(self.command_set(), channel))
            .await?;
        commands::parse_frequency_response(&reply)
    }

    async fn set_power(&self, channel: ChannelId, dbm: f32) -> Result<()> {
        self.check_channel(channel)?;
        let range = self.model.capabilities.power_range;
        check_span(dbm, (range.min_dbm, range.max_dbm), "power (dBm)")?;
        debug!(%channel, dbm, "setting power");
        self.execute_set(commands::cmd_set_power(self.command_set(), channel, dbm))
            .await?;
        self.emit(SynthEvent::PowerChanged { channel, dbm });
        Ok(())
    }

    async fn get_power(&self, channel: ChannelId) -> Result<f32> {
        self.check_channel(channel)?;
        let reply = self
            .execute(commands::cmd_read_power(self.command_set(), channel))
            .await?;
        commands::parse_power_response(&reply)
    }

    async fn set_phase(&self, channel: ChannelId, degrees: f32) -> Result<()> {
        self.check_channel(channel)?;
        check_span(degrees, PHASE_RANGE, "phase (deg)")?;
        debug!(%channel, degrees, "setting phase");
        self.execute_set(commands::cmd_set_phase(self.command_set(), channel, degrees))
            .await?;
        self.emit(SynthEvent::PhaseChanged { channel, degrees });
        Ok(())
    }

    async fn get_phase(&self, channel: ChannelId) -> Result<f32> {
        self.check_channel(channel)?;
        let reply = self
            .execute(commands::cmd_read_phase(self.command_set(), channel))
            .await?;
        commands::parse_phase_response(&reply)
    }

    async fn set_modulation(&self, channel: ChannelId, mode: ModulationMode) -> Result<()> {
        self.check_channel(channel)?;
        self.check_modulation()?;
        debug!(%channel, %mode, "setting modulation");
        self.execute_set(commands::cmd_set_modulation(self.command_set(), channel, mode))
            .await?;
        self.emit(SynthEvent::ModulationChanged { channel, mode });
        Ok(())
    }

    async fn set_fm_deviation(&self, channel: ChannelId, deviation_hz: u64) -> Result<()> {
        self.check_channel(channel)?;
        self.check_modulation()?;
        if deviation_hz > self.model.capabilities.frequency_range.max_hz {
            return Err(Error::InvalidParameter(format!(
                "FM deviation {deviation_hz} Hz exceeds the output range"
            )));
        }
        self.execute_set(commands::cmd_set_fm_deviation(
            self.command_set(),
            channel,
            deviation_hz,
        ))
        .await
    }

    async fn set_am_depth(&self, channel: ChannelId, percent: f32) -> Result<()> {
        self.check_channel(channel)?;
        self.check_modulation()?;
        check_span(percent, (0.0, 100.0), "AM depth (%)")?;
        self.execute_set(commands::cmd_set_am_depth(self.command_set(), channel, percent))
            .await
    }

    async fn set_pm_deviation(&self, channel: ChannelId, degrees: f32) -> Result<()> {
        self.check_channel(channel)?;
        self.check_modulation()?;
        check_span(degrees, PM_DEVIATION_RANGE, "PM deviation (deg)")?;
        self.execute_set(commands::cmd_set_pm_deviation(
            self.command_set(),
            channel,
            degrees,
        ))
        .await
    }

    async fn set_sweep_start(&self, channel: ChannelId, freq_hz: u64) -> Result<()> {
        self.check_channel(channel)?;
        self.check_frequency(freq_hz)?;
        self.execute_set(commands::cmd_set_sweep_start(
            self.command_set(),
            channel,
            freq_hz,
        ))
        .await
    }

    async fn set_sweep_stop(&self, channel: ChannelId, freq_hz: u64) -> Result<()> {
        self.check_channel(channel)?;
        self.check_frequency(freq_hz)?;
        self.execute_set(commands::cmd_set_sweep_stop(
            self.command_set(),
            channel,
            freq_hz,
        ))
        .await
    }

    async fn set_sweep_dwell(&self, channel: ChannelId, dwell: Duration) -> Result<()> {
        self.check_channel(channel)?;
        if dwell < Duration::from_millis(1) {
            return Err(Error::InvalidParameter(
                "sweep dwell must be at least 1 ms".into(),
            ));
        }
        self.execute_set(commands::cmd_set_sweep_dwell(
            self.command_set(),
            channel,
            dwell,
        ))
        .await
    }

    async fn set_sweep_points(&self, channel: ChannelId, points: u16) -> Result<()> {
        self.check_channel(channel)?;
        if points < 2 {
            return Err(Error::InvalidParameter(format!(
                "a sweep needs at least 2 points, got {points}"
            )));
        }
        self.execute_set(commands::cmd_set_sweep_points(
            self.command_set(),
            channel,
            points,
        ))
        .await
    }

    async fn recall_factory_preset(&self) -> Result<()> {
        self.execute_set(commands::cmd_recall_factory_preset())
            .await?;
        self.emit(SynthEvent::StateRecalled);
        Ok(())
    }

    async fn recall_saved_state(&self) -> Result<()> {
        self.execute_set(commands::cmd_recall_saved_state())
            .await?;
        self.emit(SynthEvent::StateRecalled);
        Ok(())
    }

    async fn save_current_state(&self) -> Result<()> {
        self.execute_set(commands::cmd_save_current_state()).await
    }

    async fn enable_list(&self, band: ListBand) -> Result<()> {
        self.check_lists()?;
        debug!(%band, "enabling list");
        self.execute_set(commands::cmd_list_enable(band)).await
    }

    async fn load_list(&self, band: ListBand, points: &[u64]) -> Result<()> {
        self.check_lists()?;
        let max = self.model.capabilities.max_list_points;
        if points.is_empty() {
            return Err(Error::InvalidParameter("frequency list is empty".into()));
        }
        if points.len() > max {
            return Err(Error::InvalidParameter(format!(
                "frequency list has {} points, {} allows at most {max}",
                points.len(),
                self.model.name
            )));
        }
        for (i, &freq_hz) in points.iter().enumerate() {
            self.check_frequency(freq_hz).map_err(|e| match e {
                Error::InvalidParameter(msg) => {
                    Error::InvalidParameter(format!("point {}: {msg}", i + 1))
                }
                other => other,
            })?;
        }

        debug!(%band, points = points.len(), "uploading list");
        self.execute_set(commands::cmd_list_clear(band)).await?;
        for &freq_hz in points {
            self.execute_set(commands::cmd_list_add(band, freq_hz))
                .await?;
        }
        self.emit(SynthEvent::ListLoaded {
            band,
            points: points.len(),
        });
        Ok(())
    }

    async fn set_list_trigger(&self, band: ListBand, trigger: ListTrigger) -> Result<()> {
        self.check_lists()?;
        self.execute_set(commands::cmd_list_trigger(band, trigger))
            .await
    }

    async fn set_list_dwell(&self, band: ListBand, dwell: Duration) -> Result<()> {
        self.check_lists()?;
        if dwell < Duration::from_micros(1) {
            return Err(Error::InvalidParameter(
                "list dwell must be at least 1 us".into(),
            ));
        }
        self.execute_set(commands::cmd_list_dwell(band, dwell))
            .await
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<SynthEvent>> {
        Ok(self.event_tx.subscribe())
    }

    async fn close(&self) -> Result<()> {
        if !self.io.is_running() {
            return Ok(());
        }
        debug!(model = self.model.name, serial = %self.info.serial, "closing synthesizer");
        self.io.close().await?;
        self.emit(SynthEvent::Disconnected);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{hs1001a, hsm2001a};
    use synthlib_test_harness::MockTransport;
    use synthlib_text_io::io::{IoConfig, spawn_io_task};

    fn make_synth(mock: MockTransport, model: HolzworthModel) -> HolzworthSynth {
        let io = spawn_io_task(
            Box::new(mock),
            IoConfig {
                command_timeout: Duration::from_millis(200),
                auto_retry: false,
                max_retries: 0,
            },
        );
        let (event_tx, _) = broadcast::channel(256);
        let info = SynthInfo {
            manufacturer: commands::MANUFACTURER.into(),
            model_name: model.name.into(),
            model_id: model.model_id.into(),
            serial: "1234".into(),
            firmware: "1.0".into(),
        };
        HolzworthSynth::new(
            io,
            model,
            info,
            event_tx,
            Duration::from_millis(200),
            ConnectionType::Usb,
        )
    }

    fn ch(n: u8) -> ChannelId {
        ChannelId::new(n).unwrap()
    }

    // -----------------------------------------------------------------
    // frequency
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn set_frequency_hsm_channel_two() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH2:FREQ:1000000000Hz", "Frequency Set");
        let synth = make_synth(mock, hsm2001a());
        let mut events = synth.subscribe().unwrap();

        synth.set_frequency(ch(2), 1_000_000_000).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            SynthEvent::FrequencyChanged {
                channel: ch(2),
                freq_hz: 1_000_000_000
            }
        );
    }

    #[tokio::test]
    async fn get_frequency_legacy() {
        let mut mock = MockTransport::new();
        mock.expect_line(":FREQ?", "2400.000000 MHz");
        let synth = make_synth(mock, hs1001a());
        let mut events = synth.subscribe().unwrap();

        assert_eq!(synth.get_frequency(ChannelId::CH1).await.unwrap(), 2_400_000_000);
        // Reads report state, they do not change it.
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn out_of_range_frequency_sends_nothing() {
        let mock = MockTransport::new();
        let log = mock.sent_log();
        let synth = make_synth(mock, hs1001a());

        let result = synth.set_frequency(ChannelId::CH1, 7_000_000_000).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        let result = synth.set_frequency(ChannelId::CH1, 100_000).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn missing_channel_is_invalid() {
        let mock = MockTransport::new();
        let log = mock.sent_log();
        let synth = make_synth(mock, hsm2001a());

        let result = synth.set_power(ch(3), 0.0).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        let result = synth.get_frequency(ch(4)).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(log.is_empty());
    }

    // -----------------------------------------------------------------
    // power / phase / RF
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn set_and_read_power() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH1:PWR:-20.50dBm", "Power Set");
        mock.expect_line(":CH1:PWR?", "-20.50");
        let synth = make_synth(mock, hsm2001a());

        synth.set_power(ChannelId::CH1, -20.5).await.unwrap();
        assert_eq!(synth.get_power(ChannelId::CH1).await.unwrap(), -20.5);
    }

    #[tokio::test]
    async fn power_out_of_range() {
        let mock = MockTransport::new();
        let log = mock.sent_log();
        let synth = make_synth(mock, hs1001a());
        assert!(matches!(
            synth.set_power(ChannelId::CH1, 20.0).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            synth.set_power(ChannelId::CH1, f32::NAN).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn phase_commands_and_range() {
        let mut mock = MockTransport::new();
        mock.expect_line(":PHASE:90.0deg", "Phase Set");
        mock.expect_line(":PHASE?", "90.0");
        let synth = make_synth(mock, hs1001a());

        synth.set_phase(ChannelId::CH1, 90.0).await.unwrap();
        assert_eq!(synth.get_phase(ChannelId::CH1).await.unwrap(), 90.0);
        assert!(matches!(
            synth.set_phase(ChannelId::CH1, 400.0).await,
            Err(Error::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn rf_output_round_trip() {
        let mut mock = MockTransport::new();
        mock.expect_line(":PWR:RF:ON", "RF ON");
        mock.expect_line(":PWR:RF?", "ON");
        let synth = make_synth(mock, hs1001a());
        let mut events = synth.subscribe().unwrap();

        synth.set_rf_output(ChannelId::CH1, true).await.unwrap();
        assert!(synth.get_rf_output(ChannelId::CH1).await.unwrap());
        assert_eq!(
            events.recv().await.unwrap(),
            SynthEvent::RfOutputChanged {
                channel: ChannelId::CH1,
                on: true
            }
        );
    }

    #[tokio::test]
    async fn rejection_surfaces_as_error() {
        let mut mock = MockTransport::new();
        mock.expect_line(":REF:EXT:10MHz", "Invalid: no reference detected");
        let synth = make_synth(mock, hs1001a());
        let result = synth.set_reference(Reference::External10MHz).await;
        assert!(matches!(result, Err(Error::Rejected(_))));
    }

    // -----------------------------------------------------------------
    // modulation / sweep
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn modulation_parameters() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH2:MOD:MODE:FM", "FM");
        mock.expect_line(":CH2:MOD:FM:DEV:50000Hz", "ok");
        mock.expect_line(":CH2:MOD:AM:DEPTH:30.0%", "ok");
        mock.expect_line(":CH2:MOD:PM:DEV:45.0deg", "ok");
        let synth = make_synth(mock, hsm2001a());

        synth.set_modulation(ch(2), ModulationMode::Fm).await.unwrap();
        synth.set_fm_deviation(ch(2), 50_000).await.unwrap();
        synth.set_am_depth(ch(2), 30.0).await.unwrap();
        synth.set_pm_deviation(ch(2), 45.0).await.unwrap();
    }

    #[tokio::test]
    async fn am_depth_out_of_range() {
        let mock = MockTransport::new();
        let log = mock.sent_log();
        let synth = make_synth(mock, hs1001a());
        assert!(matches!(
            synth.set_am_depth(ChannelId::CH1, 120.0).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn sweep_setup() {
        let mut mock = MockTransport::new();
        mock.expect_line(":FREQ:START:100000000Hz", "ok");
        mock.expect_line(":FREQ:STOP:200000000Hz", "ok");
        mock.expect_line(":FREQ:DWELL:10ms", "ok");
        mock.expect_line(":FREQ:POINTS:11", "ok");
        let synth = make_synth(mock, hs1001a());

        synth.set_sweep_start(ChannelId::CH1, 100_000_000).await.unwrap();
        synth.set_sweep_stop(ChannelId::CH1, 200_000_000).await.unwrap();
        synth
            .set_sweep_dwell(ChannelId::CH1, Duration::from_millis(10))
            .await
            .unwrap();
        synth.set_sweep_points(ChannelId::CH1, 11).await.unwrap();
        assert!(matches!(
            synth.set_sweep_points(ChannelId::CH1, 1).await,
            Err(Error::InvalidParameter(_))
        ));
    }

    // -----------------------------------------------------------------
    // state / lists / raw
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn preset_emits_state_recalled() {
        let mut mock = MockTransport::new();
        mock.expect_line(":SYST:PRESET", "Preset");
        mock.expect_line(":SYST:SAV", "Saved");
        let synth = make_synth(mock, hs1001a());
        let mut events = synth.subscribe().unwrap();

        synth.recall_factory_preset().await.unwrap();
        synth.save_current_state().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), SynthEvent::StateRecalled);
    }

    #[tokio::test]
    async fn load_list_clears_then_adds() {
        let mut mock = MockTransport::new();
        mock.expect_line(":LIST:NARROW:CLEAR", "ok");
        mock.expect_line(":LIST:NARROW:ADD:1000000000Hz", "ok");
        mock.expect_line(":LIST:NARROW:ADD:1001000000Hz", "ok");
        mock.expect_line(":LIST:NARROW:MODE:LIST", "ok");
        mock.expect_line(":LIST:NARROW:DWELL:500us", "ok");
        mock.expect_line(":LIST:NARROW:ENABLE", "ok");
        let synth = make_synth(mock, hsm2001a());
        let mut events = synth.subscribe().unwrap();

        synth
            .load_list(ListBand::Narrow, &[1_000_000_000, 1_001_000_000])
            .await
            .unwrap();
        synth
            .set_list_trigger(ListBand::Narrow, ListTrigger::TriggerList)
            .await
            .unwrap();
        synth
            .set_list_dwell(ListBand::Narrow, Duration::from_micros(500))
            .await
            .unwrap();
        synth.enable_list(ListBand::Narrow).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            SynthEvent::ListLoaded {
                band: ListBand::Narrow,
                points: 2
            }
        );
    }

    #[tokio::test]
    async fn load_list_validates_every_point() {
        let mock = MockTransport::new();
        let log = mock.sent_log();
        let synth = make_synth(mock, hs1001a());

        let err = synth
            .load_list(ListBand::Wide, &[1_000_000_000, 9_000_000_000])
            .await
            .unwrap_err();
        match err {
            Error::InvalidParameter(msg) => assert!(msg.starts_with("point 2"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            synth.load_list(ListBand::Wide, &[]).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn list_longer_than_model_limit_sends_nothing() {
        for (model, limit) in [(hs1001a(), 1000), (hsm2001a(), 2000)] {
            let mock = MockTransport::new();
            let log = mock.sent_log();
            let synth = make_synth(mock, model);
            assert_eq!(synth.capabilities().max_list_points, limit);

            let too_many = vec![1_000_000_000u64; limit + 1];
            let result = synth.load_list(ListBand::Wide, &too_many).await;
            assert!(matches!(result, Err(Error::InvalidParameter(_))), "{result:?}");
            assert!(log.is_empty());
        }
    }

    #[tokio::test]
    async fn list_at_model_limit_is_uploaded() {
        let points = vec![1_000_000_000u64; 1000];
        let mut mock = MockTransport::new();
        mock.expect_line(":LIST:WIDE:CLEAR", "ok");
        for _ in &points {
            mock.expect_line(":LIST:WIDE:ADD:1000000000Hz", "ok");
        }
        let log = mock.sent_log();
        let synth = make_synth(mock, hs1001a());

        synth.load_list(ListBand::Wide, &points).await.unwrap();
        assert_eq!(log.len(), 1001);
    }

    #[tokio::test]
    async fn raw_command_with_several_lines_is_refused() {
        let mock = MockTransport::new();
        let log = mock.sent_log();
        let synth = make_synth(mock, hsm2001a());

        for command in [":CH1:PWR?\n:CH2:PWR?", ":PWR:RF:ON\r:PWR?", "*IDN?\r\n*IDN?\n"] {
            assert!(matches!(
                synth.write_raw(command).await,
                Err(Error::InvalidParameter(_))
            ));
        }
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn raw_command_returns_rejection_text() {
        let mut mock = MockTransport::new();
        mock.expect_line(":CH1:TEMP?", "31.5C");
        mock.expect_line(":BOGUS", "Invalid Command");
        let synth = make_synth(mock, hsm2001a());

        assert_eq!(synth.write_raw(":CH1:TEMP?\n").await.unwrap(), "31.5C");
        assert_eq!(synth.write_raw(":BOGUS").await.unwrap(), "Invalid Command");
        assert!(matches!(
            synth.write_raw("  ").await,
            Err(Error::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn close_stops_io() {
        let synth = make_synth(MockTransport::new(), hs1001a());
        let mut events = synth.subscribe().unwrap();
        assert!(synth.is_connected());

        synth.close().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), SynthEvent::Disconnected);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!synth.is_connected());
        assert!(matches!(
            synth.identify().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_has_closed_transport_on_return() {
        let mock = MockTransport::new();
        let closed = mock.closed_flag();
        let synth = make_synth(mock, hsm2001a());

        synth.close().await.unwrap();
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!synth.is_connected());
        synth.close().await.unwrap();
    }
}
