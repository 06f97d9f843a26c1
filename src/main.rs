// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/hygrolink

//! hygrolink - simulated humidity sensor device
//!
//! Polls a simulated hygrometer, reports every reading to the device
//! management service and raises an alert when the humidity climbs above
//! the sensor's maximum threshold. Press enter or Ctrl+C to exit.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hygrolink::config::Config;
use hygrolink::polling::{run_session, PollingLoop};
use hygrolink::reporting::{Credentials, LogSink, MqttSink, ReportingSink, ThresholdHandler, TrustedAssets};
use hygrolink::sensors::{HumiditySensor, Sensor};
use hygrolink::VERSION;

/// hygrolink - simulated humidity sensor device
#[derive(Parser)]
#[command(name = "hygrolink")]
#[command(author = "hygrolink Project")]
#[command(version = VERSION)]
#[command(about = "Simulated humidity sensor reporting to a device-management service")]
struct Args {
    /// Trusted assets file provisioned for this device
    trusted_assets: PathBuf,

    /// Password protecting the trusted assets
    password: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sensor polling interval in milliseconds
    #[arg(long, env = "HYGROLINK_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Stop after this many readings
    #[arg(long)]
    iterations: Option<u64>,

    /// Log readings locally instead of connecting to the broker
    #[arg(long)]
    offline: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display_failure(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    // Initialize logging; the configured level is applied once the config is read
    let builder = FmtSubscriber::builder()
        .with_env_filter(log_filter(&args, "info"))
        .with_filter_reloading()
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true);
    let filter_handle = builder.reload_handle();
    tracing::subscriber::set_global_default(builder.finish())?;

    info!("{} v{}", hygrolink::NAME, VERSION);

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    filter_handle.reload(log_filter(&args, &config.log_level))?;

    // Override with command line args
    if let Some(interval) = args.poll_interval_ms {
        config.polling.interval_ms = interval;
    }
    if let Some(iterations) = args.iterations {
        config.polling.max_iterations = Some(iterations);
    }
    config.validate()?;

    let assets = TrustedAssets::load(&args.trusted_assets)?;
    let credentials = Credentials::new(assets, SecretString::new(args.password));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_device(config, credentials, args.offline))
}

/// Connect, announce the device and poll until cancelled
async fn run_device(config: Config, credentials: Credentials, offline: bool) -> Result<()> {
    let endpoint_id = credentials.assets.endpoint_id.clone();
    let hardware_id = format!("{}{}", endpoint_id, config.device.hardware_suffix);
    let sensor = Arc::new(HumiditySensor::with_threshold(&hardware_id, config.sensor.initial_threshold));

    let sink: Box<dyn ReportingSink> = if offline {
        info!("Offline mode: readings are logged only");
        Box::new(LogSink::new(&endpoint_id))
    } else {
        let target = sensor.clone();
        let on_threshold: ThresholdHandler = Arc::new(move |value| target.set_max_threshold(value));
        let sink = MqttSink::connect(&credentials, &config.device, &config.mqtt, Some(on_threshold))
            .await
            .with_context(|| format!("failed to connect device {}", endpoint_id))?;
        Box::new(sink)
    };

    if let Err(e) = sink.announce(&config.device.model_urn, &sensor.metadata()).await {
        sink.close().await;
        return Err(e.into());
    }

    display_header(&config, &endpoint_id);

    let cancel = CancellationToken::new();
    watch_for_exit(cancel.clone());

    let mut polling = PollingLoop::new(&config.polling, &config.device);
    let outcome = run_session(&mut polling, sensor.as_ref(), sink.as_ref(), &cancel).await?;
    debug!("Exiting after {} readings", outcome.iterations());

    Ok(())
}

/// `--trace` or `--debug` first, then `RUST_LOG`, then the configured level
fn log_filter(args: &Args, configured: &str) -> EnvFilter {
    if let Some(level) = flag_level(args) {
        return level_filter(level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(configured_level(configured)))
}

fn flag_level(args: &Args) -> Option<Level> {
    if args.trace {
        Some(Level::TRACE)
    } else if args.debug {
        Some(Level::DEBUG)
    } else {
        None
    }
}

fn configured_level(configured: &str) -> Level {
    configured.parse().unwrap_or(Level::INFO)
}

fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::new(level.to_string().to_lowercase())
}

fn display_header(config: &Config, endpoint_id: &str) {
    info!(">>> Beginning of simulation...");
    info!("Device Model: {}", config.device.model_urn);
    info!("Created virtual device sensor, device ID = {}", endpoint_id);
    info!("Press enter to exit");
    info!(">>> Readings (every {} msec.)", config.polling.interval_ms);
}

/// Cancel on Ctrl+C or when a line is entered on stdin
fn watch_for_exit(cancel: CancellationToken) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            on_signal.cancel();
        }
    });

    // Plain thread: a blocked stdin read must not hold up runtime shutdown
    std::thread::spawn(move || {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(n) if n > 0 => cancel.cancel(),
            // EOF or unreadable stdin, rely on signals
            _ => {}
        }
    });
}

fn display_failure(e: &anyhow::Error) {
    let mut message = e.to_string();
    for cause in e.chain().skip(1) {
        message.push_str(&format!(".\n\tCaused by: {}", cause));
    }
    eprintln!("\n{}\n", message);
    eprintln!("{}", Args::command().render_usage());
}
