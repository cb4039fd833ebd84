// QuotaGate - Main Entry Point
//
// Command-line front end for the usage quota gate:
// - Evaluate a generation request for a user
// - Inspect a user's quota status without consuming anything
// - Print the effective configuration

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use quotagate::quota::{
    Clock, FileRecordStore, FixedClock, MemoryRecordStore, QuotaManager, RecordStore, SystemClock,
};
use quotagate::{metrics, Config, Decision, QuotaStatus};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn, Level};
use tracing_subscriber::EnvFilter;

/// QuotaGate: rolling-window usage quotas
#[derive(Parser, Debug)]
#[command(name = "quotagate")]
#[command(author = "QuotaGate Contributors")]
#[command(version)]
#[command(about = "Rolling-window usage quota gate with cooldown penalties", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a request and record the granted units
    Request {
        /// User identifier
        #[arg(long)]
        user: String,

        /// Units requested
        #[arg(long)]
        units: u32,

        /// Evaluation time as unix seconds (defaults to now)
        #[arg(long)]
        now: Option<i64>,
    },
    /// Show a user's quota status without recording anything
    Status {
        /// User identifier
        #[arg(long)]
        user: String,

        /// Evaluation time as unix seconds (defaults to now)
        #[arg(long)]
        now: Option<i64>,
    },
    /// Print the effective configuration
    Config,
}

/// Accepted `--now` range: 1970-01-01 through 9999-12-31
const NOW_RANGE: std::ops::RangeInclusive<i64> = 0..=253_402_300_799;

/// JSON shape printed by `request`
#[derive(Serialize)]
struct RequestOutput<'a> {
    user: &'a str,
    requested: u32,
    allowed: u32,
    #[serde(flatten)]
    status: &'a QuotaStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    init_tracing(&config, args.verbose)?;
    debug!("QuotaGate v{} starting", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::Request { user, units, now } => {
            let manager = build_manager(&config, now)?;
            let decision = manager.request(&user, units).await?;
            print_request(&user, units, &decision)?;
        }
        Commands::Status { user, now } => {
            let manager = build_manager(&config, now)?;
            let status = manager.status(&user).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { config.log_level()? };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

fn build_manager(config: &Config, now: Option<i64>) -> Result<QuotaManager> {
    metrics::init().context("Failed to register metrics")?;

    let store: Arc<dyn RecordStore> = match config.store.backend.to_lowercase().as_str() {
        "memory" => {
            warn!("In-memory record store selected; usage is discarded when this command exits");
            Arc::new(MemoryRecordStore::new())
        }
        _ => {
            debug!("Using file record store at {:?}", config.store.path);
            Arc::new(FileRecordStore::new(&config.store.path))
        }
    };

    let clock: Arc<dyn Clock> = match now {
        Some(secs) => {
            if !NOW_RANGE.contains(&secs) {
                bail!(
                    "--now {} is outside the supported range {}..={}",
                    secs,
                    NOW_RANGE.start(),
                    NOW_RANGE.end()
                );
            }
            let pinned: DateTime<Utc> = DateTime::from_timestamp(secs, 0)
                .with_context(|| format!("Timestamp out of range: {}", secs))?;
            Arc::new(FixedClock::new(pinned))
        }
        None => Arc::new(SystemClock),
    };

    Ok(QuotaManager::new(config.quota, store).with_clock(clock))
}

fn print_request(user: &str, requested: u32, decision: &Decision) -> Result<()> {
    let output = RequestOutput {
        user,
        requested,
        allowed: decision.allowed,
        status: &decision.status,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
