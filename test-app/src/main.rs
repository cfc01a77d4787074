// synthlib test application -- CLI tool for exercising Holzworth
// synthesizers against real hardware or a mock transport.
//
// Usage:
//   synthlib-test-app list
//   synthlib-test-app discover
//   synthlib-test-app --port /dev/ttyACM0 info
//   synthlib-test-app --serial 10042 freq set 1.5GHz
//   synthlib-test-app --host 192.168.1.50 --channel 2 power set -- -10dBm
//   synthlib-test-app --host 192.168.1.50 sweep --start 1GHz --stop 2GHz --points 101 --dwell 5ms
//   synthlib-test-app --port COM5 list-import wide table.txt
//   synthlib-test-app --model HS1001A --mock info

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use synthlib::holzworth::list_file::import_list;
use synthlib::holzworth::models::{self, HolzworthModel};
use synthlib::holzworth::{HolzworthBuilder, HolzworthSynth, discover, find_device};
use synthlib::units::{self, FrequencyUnit, TimeUnit};
use synthlib::{
    ChannelId, ListBand, ListTrigger, ModulationMode, Reference, Synthesizer, format_freq_mhz,
};
use synthlib_test_harness::MockTransport;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// synthlib test application -- drives Holzworth synthesizers from the
/// command line.
#[derive(Parser)]
#[command(name = "synthlib-test-app", version, about)]
struct Cli {
    /// Model name (e.g. HS1001A, HSM4001A). Detected with *IDN? when
    /// omitted.
    #[arg(long)]
    model: Option<String>,

    /// Serial port of the instrument's USB virtual COM port
    /// (e.g. /dev/ttyACM0, COM5).
    #[arg(long)]
    port: Option<String>,

    /// Instrument serial number; the USB port is found by discovery.
    #[arg(long, conflicts_with = "port")]
    serial: Option<String>,

    /// Host name or IP address of an Ethernet-attached instrument.
    #[arg(long, conflicts_with_all = ["port", "serial"])]
    host: Option<String>,

    /// TCP command port.
    #[arg(long, default_value_t = synthlib::transport::DEFAULT_COMMAND_PORT)]
    tcp_port: u16,

    /// Override the model's default baud rate.
    #[arg(long)]
    baud: Option<u32>,

    /// Output channel for channel-scoped commands (1-based).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=8))]
    channel: u8,

    /// Per-command timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Use a mock transport instead of a real instrument.
    /// Useful for verifying CLI parsing and builder wiring without hardware.
    #[arg(long)]
    mock: bool,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List supported models.
    List,

    /// Find Holzworth instruments attached over USB.
    Discover,

    /// Print instrument identity and capabilities.
    Info,

    /// CW frequency operations. Bare numbers are MHz.
    Freq {
        #[command(subcommand)]
        action: FreqAction,
    },

    /// Output power operations.
    Power {
        #[command(subcommand)]
        action: PowerAction,
    },

    /// Output phase operations.
    Phase {
        #[command(subcommand)]
        action: PhaseAction,
    },

    /// RF output switch.
    Rf {
        #[command(subcommand)]
        action: RfAction,
    },

    /// Frequency reference.
    Ref {
        #[command(subcommand)]
        action: RefAction,
    },

    /// Select the modulation mode (off, fm, am, pm, pulse, sweep).
    Mod {
        mode: ModulationMode,

        /// FM deviation, e.g. 50kHz (bare numbers are kHz).
        #[arg(long, value_parser = parse_fm_deviation)]
        fm_deviation: Option<u64>,

        /// AM depth in percent.
        #[arg(long, value_parser = parse_percent)]
        am_depth: Option<f32>,

        /// PM deviation in degrees.
        #[arg(long, value_parser = parse_phase)]
        pm_deviation: Option<f32>,
    },

    /// Configure the stepped frequency sweep.
    Sweep {
        #[arg(long, value_parser = parse_freq)]
        start: Option<u64>,

        #[arg(long, value_parser = parse_freq)]
        stop: Option<u64>,

        /// Dwell per point, e.g. 5ms (bare numbers are ms).
        #[arg(long, value_parser = parse_sweep_dwell)]
        dwell: Option<Duration>,

        #[arg(long)]
        points: Option<u16>,

        /// Also switch the channel into sweep mode.
        #[arg(long)]
        enable: bool,
    },

    /// Restore factory defaults.
    Preset,

    /// Restore the saved state.
    Recall,

    /// Save the current state.
    Save,

    /// Upload a frequency list file into the wideband or narrowband list.
    ListImport {
        band: ListBand,
        file: PathBuf,

        /// Make the list the active sweep source after the upload.
        #[arg(long)]
        enable: bool,
    },

    /// Select how a list advances (free, point, list).
    ListTrigger {
        band: ListBand,
        mode: ListTrigger,

        /// Dwell per point, e.g. 250us (bare numbers are us).
        #[arg(long, value_parser = parse_list_dwell)]
        dwell: Option<Duration>,
    },

    /// Send a raw command line and print the reply.
    Raw {
        #[arg(allow_hyphen_values = true)]
        command: String,
    },
}

#[derive(Subcommand)]
enum FreqAction {
    Get,
    Set {
        #[arg(value_parser = parse_freq)]
        freq: u64,
    },
}

#[derive(Subcommand)]
enum PowerAction {
    Get,
    Set {
        #[arg(allow_hyphen_values = true, value_parser = parse_power)]
        dbm: f32,
    },
}

#[derive(Subcommand)]
enum PhaseAction {
    Get,
    Set {
        #[arg(value_parser = parse_phase)]
        degrees: f32,
    },
}

#[derive(Subcommand)]
enum RfAction {
    On,
    Off,
    Get,
}

#[derive(Subcommand)]
enum RefAction {
    /// Internal 100 MHz reference.
    Internal,
    /// External reference input.
    External {
        #[arg(long, value_enum, default_value_t = ExternalRef::Mhz10)]
        freq: ExternalRef,
    },
    /// Print the reference lock status.
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExternalRef {
    #[value(name = "10MHz")]
    Mhz10,
    #[value(name = "100MHz")]
    Mhz100,
}

// ---------------------------------------------------------------------------
// Argument parsers
// ---------------------------------------------------------------------------

fn parse_freq(s: &str) -> std::result::Result<u64, String> {
    units::parse_frequency(s, FrequencyUnit::MHz).map_err(|e| e.to_string())
}

fn parse_fm_deviation(s: &str) -> std::result::Result<u64, String> {
    units::parse_frequency(s, FrequencyUnit::KHz).map_err(|e| e.to_string())
}

fn parse_power(s: &str) -> std::result::Result<f32, String> {
    units::parse_power(s).map_err(|e| e.to_string())
}

fn parse_phase(s: &str) -> std::result::Result<f32, String> {
    units::parse_phase(s).map_err(|e| e.to_string())
}

fn parse_percent(s: &str) -> std::result::Result<f32, String> {
    units::parse_percent(s).map_err(|e| e.to_string())
}

fn parse_sweep_dwell(s: &str) -> std::result::Result<Duration, String> {
    units::parse_duration(s, TimeUnit::Millis).map_err(|e| e.to_string())
}

fn parse_list_dwell(s: &str) -> std::result::Result<Duration, String> {
    units::parse_duration(s, TimeUnit::Micros).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging(verbose: bool) {
    let default = if verbose { "synthlib=debug" } else { "synthlib=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

fn lookup_model(name: &str) -> Result<HolzworthModel> {
    models::by_name(name).with_context(|| {
        let known: Vec<&str> = models::all_models().iter().map(|m| m.name).collect();
        format!("unknown model '{name}'. Supported: {}", known.join(", "))
    })
}

fn channel(cli: &Cli) -> Result<ChannelId> {
    ChannelId::new(cli.channel).context("channel numbers start at 1")
}

async fn create_synth(cli: &Cli) -> Result<HolzworthSynth> {
    let model = cli.model.as_deref().map(lookup_model).transpose()?;

    if cli.mock {
        let model = model.unwrap_or_else(models::hs1001a);
        let name = model.name;
        let synth = HolzworthBuilder::new(model)
            .query_identity(false)
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .context("failed to build HolzworthSynth with mock transport")?;
        println!("Connected (mock transport) -- {name}");
        return Ok(synth);
    }

    let mut builder = match model {
        Some(model) => HolzworthBuilder::new(model),
        None => HolzworthBuilder::detect(),
    };
    builder = builder
        .tcp_port(cli.tcp_port)
        .command_timeout(Duration::from_millis(cli.timeout_ms));
    if let Some(baud) = cli.baud {
        builder = builder.baud_rate(baud);
    }

    let port = match (&cli.port, &cli.serial) {
        (Some(port), _) => Some(port.clone()),
        (None, Some(serial)) => Some(
            find_device(serial)
                .with_context(|| format!("no attached instrument with serial {serial}"))?
                .port_name,
        ),
        (None, None) => None,
    };

    let synth = if let Some(port) = port {
        builder
            .build_serial(&port)
            .await
            .with_context(|| format!("failed to connect on {port}"))?
    } else if let Some(host) = &cli.host {
        builder
            .build_tcp(host)
            .await
            .with_context(|| format!("failed to connect to {host}:{}", cli.tcp_port))?
    } else {
        bail!("--port, --serial or --host is required unless --mock is used");
    };

    let info = synth.info();
    println!(
        "Connected -- {} {} (serial {}, firmware {})",
        info.manufacturer, info.model_name, info.serial, info.firmware
    );
    Ok(synth)
}

// ---------------------------------------------------------------------------
// Commands that need no instrument
// ---------------------------------------------------------------------------

fn cmd_list() -> Result<()> {
    let all = models::all_models();

    println!(
        "{:<10}  {:<7}  {:>8}  {:<24}  Power",
        "Model", "Dialect", "Channels", "Frequency"
    );
    println!(
        "{:<10}  {:<7}  {:>8}  {:<24}  {}",
        "-".repeat(10),
        "-".repeat(7),
        "-".repeat(8),
        "-".repeat(24),
        "-".repeat(16),
    );
    for model in &all {
        let caps = &model.capabilities;
        let range = format!(
            "{} - {}",
            format_freq_mhz(caps.frequency_range.min_hz),
            format_freq_mhz(caps.frequency_range.max_hz)
        );
        println!(
            "{:<10}  {:<7}  {:>8}  {:<24}  {} to {} dBm",
            model.name,
            caps.command_set.to_string(),
            caps.channels,
            range,
            caps.power_range.min_dbm,
            caps.power_range.max_dbm,
        );
    }
    println!();
    println!("{} models total.", all.len());
    Ok(())
}

fn cmd_discover() -> Result<()> {
    let devices = discover().context("USB discovery failed")?;
    if devices.is_empty() {
        println!("No Holzworth instruments found.");
        return Ok(());
    }

    println!("{:<16}  {:<16}  Product", "Serial", "Port");
    println!("{:<16}  {:<16}  {}", "-".repeat(16), "-".repeat(16), "-".repeat(20));
    for device in &devices {
        println!(
            "{:<16}  {:<16}  {}",
            device.serial,
            device.port_name,
            device.product.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{} instrument(s) found.", devices.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Instrument commands
// ---------------------------------------------------------------------------

fn cmd_info(synth: &dyn Synthesizer) -> Result<()> {
    let info = synth.info();
    let caps = synth.capabilities();

    println!("Instrument");
    println!("  Manufacturer:   {}", info.manufacturer);
    println!("  Model:          {}", info.model_name);
    println!("  Serial:         {}", info.serial);
    println!("  Firmware:       {}", info.firmware);
    println!();
    println!("Capabilities");
    println!("  Dialect:        {}", caps.command_set);
    println!("  Channels:       {}", caps.channels);
    println!(
        "  Frequency:      {} - {}",
        format_freq_mhz(caps.frequency_range.min_hz),
        format_freq_mhz(caps.frequency_range.max_hz)
    );
    println!(
        "  Power:          {} to {} dBm",
        caps.power_range.min_dbm, caps.power_range.max_dbm
    );
    println!("  Modulation:     {}", caps.has_modulation);
    println!("  List sweeps:    {} (max {} points)", caps.has_lists, caps.max_list_points);
    Ok(())
}

async fn cmd_sweep(
    synth: &dyn Synthesizer,
    ch: ChannelId,
    start: Option<u64>,
    stop: Option<u64>,
    dwell: Option<Duration>,
    points: Option<u16>,
    enable: bool,
) -> Result<()> {
    if let Some(start) = start {
        synth.set_sweep_start(ch, start).await.context("setting sweep start")?;
        println!("{ch}: sweep start {}", format_freq_mhz(start));
    }
    if let Some(stop) = stop {
        synth.set_sweep_stop(ch, stop).await.context("setting sweep stop")?;
        println!("{ch}: sweep stop {}", format_freq_mhz(stop));
    }
    if let Some(dwell) = dwell {
        synth.set_sweep_dwell(ch, dwell).await.context("setting sweep dwell")?;
        println!("{ch}: sweep dwell {} ms", dwell.as_millis());
    }
    if let Some(points) = points {
        synth.set_sweep_points(ch, points).await.context("setting sweep points")?;
        println!("{ch}: sweep points {points}");
    }
    if enable {
        synth.set_modulation(ch, ModulationMode::Sweep).await?;
        println!("{ch}: sweep enabled");
    }
    Ok(())
}

async fn cmd_modulation(
    synth: &dyn Synthesizer,
    ch: ChannelId,
    mode: ModulationMode,
    fm_deviation: Option<u64>,
    am_depth: Option<f32>,
    pm_deviation: Option<f32>,
) -> Result<()> {
    if let Some(hz) = fm_deviation {
        synth.set_fm_deviation(ch, hz).await.context("setting FM deviation")?;
    }
    if let Some(percent) = am_depth {
        synth.set_am_depth(ch, percent).await.context("setting AM depth")?;
    }
    if let Some(degrees) = pm_deviation {
        synth.set_pm_deviation(ch, degrees).await.context("setting PM deviation")?;
    }
    synth.set_modulation(ch, mode).await?;
    println!("{ch}: modulation {mode}");
    Ok(())
}

async fn run(cli: &Cli, synth: &HolzworthSynth) -> Result<()> {
    let ch = channel(cli)?;

    match &cli.command {
        Command::List | Command::Discover => unreachable!("handled before connecting"),
        Command::Info => cmd_info(synth),
        Command::Freq { action } => match action {
            FreqAction::Get => {
                let hz = synth.get_frequency(ch).await?;
                println!("{ch}: {}", format_freq_mhz(hz));
                Ok(())
            }
            FreqAction::Set { freq } => {
                synth.set_frequency(ch, *freq).await?;
                println!("{ch}: set to {}", format_freq_mhz(*freq));
                Ok(())
            }
        },
        Command::Power { action } => match action {
            PowerAction::Get => {
                println!("{ch}: {:.2} dBm", synth.get_power(ch).await?);
                Ok(())
            }
            PowerAction::Set { dbm } => {
                synth.set_power(ch, *dbm).await?;
                println!("{ch}: power set to {dbm:.2} dBm");
                Ok(())
            }
        },
        Command::Phase { action } => match action {
            PhaseAction::Get => {
                println!("{ch}: {:.1} deg", synth.get_phase(ch).await?);
                Ok(())
            }
            PhaseAction::Set { degrees } => {
                synth.set_phase(ch, *degrees).await?;
                println!("{ch}: phase set to {degrees:.1} deg");
                Ok(())
            }
        },
        Command::Rf { action } => match action {
            RfAction::On | RfAction::Off => {
                let on = matches!(action, RfAction::On);
                synth.set_rf_output(ch, on).await?;
                println!("{ch}: RF {}", if on { "ON" } else { "OFF" });
                Ok(())
            }
            RfAction::Get => {
                let on = synth.get_rf_output(ch).await?;
                println!("{ch}: RF {}", if on { "ON" } else { "OFF" });
                Ok(())
            }
        },
        Command::Ref { action } => {
            let reference = match action {
                RefAction::Internal => Reference::Internal100MHz,
                RefAction::External { freq: ExternalRef::Mhz10 } => Reference::External10MHz,
                RefAction::External { freq: ExternalRef::Mhz100 } => Reference::External100MHz,
                RefAction::Status => {
                    println!("Reference: {}", synth.reference_status().await?);
                    return Ok(());
                }
            };
            synth.set_reference(reference).await?;
            println!("Reference: {reference}");
            Ok(())
        }
        Command::Mod {
            mode,
            fm_deviation,
            am_depth,
            pm_deviation,
        } => cmd_modulation(synth, ch, *mode, *fm_deviation, *am_depth, *pm_deviation).await,
        Command::Sweep {
            start,
            stop,
            dwell,
            points,
            enable,
        } => cmd_sweep(synth, ch, *start, *stop, *dwell, *points, *enable).await,
        Command::Preset => {
            synth.recall_factory_preset().await?;
            println!("Factory preset recalled");
            Ok(())
        }
        Command::Recall => {
            synth.recall_saved_state().await?;
            println!("Saved state recalled");
            Ok(())
        }
        Command::Save => {
            synth.save_current_state().await?;
            println!("Current state saved");
            Ok(())
        }
        Command::ListImport { band, file, enable } => {
            let points = import_list(synth, *band, file)
                .await
                .with_context(|| format!("importing {}", file.display()))?;
            println!("{band} list: {points} points loaded");
            if *enable {
                synth.enable_list(*band).await?;
                println!("{band} list enabled");
            }
            Ok(())
        }
        Command::ListTrigger { band, mode, dwell } => {
            if let Some(dwell) = dwell {
                synth.set_list_dwell(*band, *dwell).await?;
            }
            synth.set_list_trigger(*band, *mode).await?;
            println!("{band} list trigger: {}", mode.keyword());
            Ok(())
        }
        Command::Raw { command } => {
            println!("{}", synth.write_raw(command).await?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::List => return cmd_list(),
        Command::Discover => return cmd_discover(),
        _ => {}
    }

    let synth = create_synth(&cli).await?;
    let result = run(&cli, &synth).await;
    synth.close().await.ok();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_connection_flags() {
        let cli = Cli::try_parse_from([
            "synthlib-test-app",
            "--host",
            "192.168.1.50",
            "--channel",
            "2",
            "freq",
            "set",
            "1.5GHz",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("192.168.1.50"));
        assert_eq!(cli.channel, 2);
        assert!(matches!(
            cli.command,
            Command::Freq {
                action: FreqAction::Set { freq: 1_500_000_000 }
            }
        ));
    }

    #[test]
    fn negative_power_is_accepted() {
        let cli =
            Cli::try_parse_from(["synthlib-test-app", "--mock", "power", "set", "-10dBm"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Power {
                action: PowerAction::Set { dbm }
            } if dbm == -10.0
        ));
    }

    #[test]
    fn port_and_host_conflict() {
        let result = Cli::try_parse_from([
            "synthlib-test-app",
            "--port",
            "/dev/ttyACM0",
            "--host",
            "10.0.0.2",
            "info",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn list_commands_parse_band_and_trigger() {
        let cli = Cli::try_parse_from([
            "synthlib-test-app",
            "--mock",
            "list-trigger",
            "narrow",
            "point",
            "--dwell",
            "250",
        ])
        .unwrap();
        match cli.command {
            Command::ListTrigger { band, mode, dwell } => {
                assert_eq!(band, ListBand::Narrow);
                assert_eq!(mode, ListTrigger::TriggerPoint);
                assert_eq!(dwell, Some(Duration::from_micros(250)));
            }
            _ => panic!("expected list-trigger"),
        }
    }

    #[test]
    fn unknown_model_names_the_supported_ones() {
        let err = lookup_model("HS9999").unwrap_err().to_string();
        assert!(err.contains("HSM4001A"));
    }

    #[tokio::test]
    async fn mock_connection_reports_model() {
        let cli = Cli::try_parse_from(["synthlib-test-app", "--model", "HSM2001A", "--mock", "info"])
            .unwrap();
        let synth = create_synth(&cli).await.unwrap();
        assert_eq!(synth.capabilities().channels, 2);
        synth.close().await.unwrap();
    }
}
