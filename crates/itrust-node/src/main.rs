//! ITS Trust Node
//!
//! Replays a recorded stream of network events (registrations, departures,
//! connections, ratings) through the trust engine and reports the resulting
//! reputation of every device.

mod replay;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use itrust_core::{EngineConfig, TrustEngine};

/// ITS Trust Node
///
/// Trust and reputation engine for Intelligent Transport System networks.
#[derive(Parser, Debug)]
#[command(name = "itrust-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a JSON engine configuration file
    #[arg(short, long, env = "ITRUST_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-lines event log to replay (reads stdin if omitted)
    #[arg(short, long, env = "ITRUST_EVENTS")]
    events: Option<PathBuf>,

    /// Override the trust threshold
    #[arg(long, env = "ITRUST_TRUST_THRESHOLD")]
    trust_threshold: Option<f64>,

    /// Override the member flooding allowance
    #[arg(long, env = "ITRUST_FLOOD_MEMBER_THRESHOLD")]
    flood_member_threshold: Option<usize>,

    /// Override the coordinator flooding allowance
    #[arg(long, env = "ITRUST_FLOOD_COORDINATOR_THRESHOLD")]
    flood_coordinator_threshold: Option<usize>,

    /// Abort on the first refused event
    #[arg(long, env = "ITRUST_STRICT", default_value = "false")]
    strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ITRUST_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "ITRUST_LOG_FORMAT", default_value = "plain")]
    log_format: String,
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr; stdout carries the summary.
    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

/// Build engine configuration from the config file and CLI overrides
fn build_config(args: &Args) -> Result<EngineConfig> {
    let base = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    let member = base.flooding.member_threshold;
    let coordinator = base.flooding.coordinator_threshold;
    let mut builder = base.into_builder();

    if let Some(threshold) = args.trust_threshold {
        builder = builder.with_trust_threshold(threshold);
    }
    if args.flood_member_threshold.is_some() || args.flood_coordinator_threshold.is_some() {
        builder = builder.with_flood_thresholds(
            args.flood_member_threshold.unwrap_or(member),
            args.flood_coordinator_threshold.unwrap_or(coordinator),
        );
    }

    let config = builder.build();
    config.validate().context("Invalid engine configuration")?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    EngineConfig::from_json(&json)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, &args.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        events = ?args.events,
        strict = args.strict,
        "Starting ITS trust node"
    );

    let config = build_config(&args)?;
    info!(
        threshold = config.trust_threshold(),
        member_flood_threshold = config.flooding.member_threshold,
        coordinator_flood_threshold = config.flooding.coordinator_threshold,
        "Engine configured"
    );
    let engine = TrustEngine::new(config).context("Failed to initialize trust engine")?;

    let summary = match &args.events {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open event log {}", path.display()))?;
            replay::replay(&engine, BufReader::new(file), args.strict)?
        }
        None => replay::replay(&engine, io::stdin().lock(), args.strict)?,
    };

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &summary).context("Failed to write summary")?;
    writeln!(stdout)?;

    info!(
        devices = summary.stats.total_devices,
        blacklisted = summary.stats.blacklisted_devices,
        coordinator = ?summary.stats.coordinator,
        "ITS trust node stopped"
    );
    Ok(())
}
