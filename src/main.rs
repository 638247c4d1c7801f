//! CardioHub Session CLI
//!
//! Joins a rehabilitation session from the terminal.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardiohub_session::{
    call::{ConsoleVideoCall, TerminalBell},
    channel::{EventChannel, RelayChannel},
    config::Config,
    core::{HeartRateEstimator, WaveformBuffer},
    decode_payload,
    sensor::{BiosensorProvider, SampleBatch, SimulatedBiosensor},
    session::{appointment_label, route_appointment},
    stats::create_shared_stats_with_persistence,
    Capabilities, CoordinatorSettings, Session, SessionCoordinator, SessionType, SessionUpdate,
    UserAction, HEART_RATE_DISCLAIMER, VERSION,
};

#[derive(Parser)]
#[command(name = "cardiohub-session")]
#[command(author = "CardioHub")]
#[command(version = VERSION)]
#[command(about = "Remote cardiac-rehabilitation session client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a session and stay in it until you leave
    Join {
        /// Session type (solo, group, workshop or consultation)
        #[arg(long = "type", value_parser = parse_session_type, conflicts_with = "appointment")]
        session_type: Option<SessionType>,

        /// Agenda appointment type (teleconsultation, reentrainement_individuel, ...)
        #[arg(long)]
        appointment: Option<String>,

        /// Patient identifier
        #[arg(long)]
        patient: String,

        /// Group identifier (group and workshop sessions)
        #[arg(long)]
        group: Option<String>,

        /// Use a simulated biosensor instead of Bluetooth
        #[arg(long)]
        simulate_sensor: bool,

        /// Run without launching the video call
        #[arg(long)]
        no_video: bool,
    },

    /// Decode a hex-encoded sensor payload
    Decode {
        /// Payload bytes, e.g. 9cff3200b0ff
        payload: String,
    },

    /// Show cumulative statistics
    Status,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Join {
            session_type,
            appointment,
            patient,
            group,
            simulate_sensor,
            no_video,
        } => cmd_join(
            session_type,
            appointment,
            &patient,
            group,
            simulate_sensor,
            no_video,
        ),
        Commands::Decode { payload } => cmd_decode(&payload),
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn parse_session_type(s: &str) -> Result<SessionType, String> {
    s.parse()
}

fn cmd_join(
    session_type: Option<SessionType>,
    appointment: Option<String>,
    patient: &str,
    group: Option<String>,
    simulate_sensor: bool,
    no_video: bool,
) -> anyhow::Result<()> {
    let session = match (session_type, appointment) {
        (_, Some(appointment)) => {
            println!("Appointment: {}", appointment_label(&appointment));
            route_appointment(&appointment, patient, group.as_deref())?
        }
        (Some(session_type), None) => Session::new(session_type, patient, group)?,
        (None, None) => bail!("either --type or --appointment is required"),
    };

    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("CardioHub Session v{VERSION}");
    println!();
    println!("  Session: {} ({})", session.session_type, session.id);
    println!("  Patient: {}", session.patient_id);
    if let Some(group) = &session.group_id {
        println!("  Group: {group}");
    }
    println!("  Relay: {}", config.channel.address);
    if session.session_type.uses_sensor() {
        println!("{HEART_RATE_DISCLAIMER}");
    }
    println!();
    println!("Type 'accept', 'reject' or 'leave' (Ctrl+C leaves too)");
    println!();

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(run_session(config, session, simulate_sensor, no_video))
}

async fn run_session(
    config: Config,
    session: Session,
    simulate_sensor: bool,
    no_video: bool,
) -> anyhow::Result<()> {
    let stats = create_shared_stats_with_persistence(config.stats_path());

    let channel: Arc<dyn EventChannel> = Arc::new(
        RelayChannel::connect(&config.channel.address)
            .await
            .context("the session cannot start without the relay server")?,
    );

    let mut capabilities = Capabilities::none().with_tone(Arc::new(TerminalBell::new()));
    if !no_video {
        capabilities = capabilities.with_video(Arc::new(ConsoleVideoCall::new(
            config.video.base_url.clone(),
        )));
    }
    if session.session_type.uses_sensor() {
        if let Some(sensor) = sensor_capability(&config, simulate_sensor).await {
            capabilities = capabilities.with_sensor(sensor);
        }
    }

    let mut coordinator = SessionCoordinator::new(
        session,
        channel,
        capabilities,
        CoordinatorSettings::from_config(&config),
        stats.clone(),
    );

    let mut updates = coordinator.watch();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            print_update(&update);
        }
    });

    let (actions, rx) = mpsc::channel(8);
    let ctrlc_actions = actions.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_actions.blocking_send(UserAction::Leave);
    })
    .context("setting Ctrl+C handler")?;

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<UserAction>() {
                Ok(action) => {
                    if actions.blocking_send(action).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{e}"),
            }
        }
    });

    coordinator.run(rx).await;
    drop(coordinator);
    let _ = printer.await;

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save statistics: {e}");
    }
    println!();
    println!("{}", stats.summary());
    Ok(())
}

#[cfg(feature = "ble")]
async fn sensor_capability(
    config: &Config,
    simulate: bool,
) -> Option<Arc<dyn BiosensorProvider>> {
    if simulate {
        return Some(simulated_sensor(config));
    }
    match cardiohub_session::sensor::BtleProvider::first_adapter(
        config.sensor.service_uuid,
        config.sensor.characteristic_uuid,
    )
    .await
    {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    }
}

#[cfg(not(feature = "ble"))]
async fn sensor_capability(
    config: &Config,
    simulate: bool,
) -> Option<Arc<dyn BiosensorProvider>> {
    if simulate {
        return Some(simulated_sensor(config));
    }
    eprintln!("Warning: built without Bluetooth support (feature 'ble'); use --simulate-sensor");
    None
}

fn simulated_sensor(config: &Config) -> Arc<dyn BiosensorProvider> {
    Arc::new(SimulatedBiosensor::new(format!(
        "{} (simulated)",
        config.sensor.name_filter
    )))
}

fn print_update(update: &SessionUpdate) {
    match update {
        SessionUpdate::State(state) => println!("[session] {}", state.label()),
        SessionUpdate::Notice(notice) => println!("[notice] {}", notice.message()),
        SessionUpdate::Sensor(status) => println!("[sensor] {}", status.message()),
        SessionUpdate::Vitals {
            heart_rate,
            elapsed,
        } => match heart_rate {
            Some(bpm) => println!("[{elapsed}] {bpm} bpm"),
            None => println!("[{elapsed}] -- bpm"),
        },
    }
}

fn cmd_decode(payload: &str) -> anyhow::Result<()> {
    let bytes = hex::decode(payload.trim()).context("payload is not valid hex")?;
    let decoded = decode_payload(&bytes);

    println!("Samples ({}): {:?}", decoded.samples.len(), decoded.samples);
    if decoded.dropped_bytes > 0 {
        println!("Dropped trailing bytes: {}", decoded.dropped_bytes);
    }

    let batch = SampleBatch::new(decoded.samples);
    let mut estimator = HeartRateEstimator::new();
    let mut waveform = WaveformBuffer::new();
    if !batch.is_empty() {
        estimator.update(&batch);
        waveform.push(&batch);
    }

    match estimator.estimate() {
        Some(bpm) => println!("Heart-rate estimate: {bpm}"),
        None => println!("Heart-rate estimate: none"),
    }
    println!("Path: {}", waveform.to_svg_path());
    Ok(())
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("CardioHub Session Status");
    println!("========================");
    println!();
    println!("Configuration:");
    println!("  Relay: {}", config.channel.address);
    println!("  Sensor filter: {}", config.sensor.name_filter);
    println!(
        "  Telemetry interval: {}ms",
        config.telemetry_interval.as_millis()
    );
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                if let Some(batches) = stats.get("batches_received") {
                    println!("  ECG batches received: {batches}");
                }
                if let Some(samples) = stats.get("samples_decoded") {
                    println!("  Samples decoded: {samples}");
                }
                if let Some(dropped) = stats.get("bytes_dropped") {
                    println!("  Trailing bytes dropped: {dropped}");
                }
                if let Some(frames) = stats.get("frames_sent") {
                    println!("  Telemetry frames sent: {frames}");
                }
                if let Some(calls) = stats.get("calls_started") {
                    println!("  Video calls started: {calls}");
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
