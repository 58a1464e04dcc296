//! Rebound CLI: configuration tooling and single-tick inspection.
//!
//! Commands:
//! - `config defaults`: print the default configuration as TOML
//! - `config validate <path>`: load, validate and fingerprint a config file
//! - `inspect`: evaluate one tick over CSV candle files and print the
//!   diagnostic record as JSON

mod candles;
mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use rebound_core::domain::InstrumentId;
use rebound_core::{Engine, StrategyConfig, TickInput};

#[derive(Parser)]
#[command(
    name = "rebound",
    about = "Rebound: capitulation-rebound decision engine tooling"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration tooling.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Evaluate one tick at the last candle on a fresh engine.
    Inspect {
        /// Main-timeframe candles (timestamp,open,high,low,close,volume).
        #[arg(long)]
        candles: PathBuf,

        /// Reference-timeframe candles, same format.
        #[arg(long)]
        reference: PathBuf,

        /// Strategy config (TOML). Defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instrument label stamped on the diagnostics.
        #[arg(long, default_value = "UNKNOWN/USDT")]
        instrument: String,

        /// Baseline stake proposed to the sizer.
        #[arg(long, default_value_t = 100.0)]
        stake: f64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML.
    Defaults,
    /// Load and validate a config file, then print its fingerprint.
    Validate {
        /// Path to a TOML config file.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json);

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Defaults => run_config_defaults(),
            ConfigAction::Validate { path } => run_config_validate(&path),
        },
        Commands::Inspect {
            candles,
            reference,
            config,
            instrument,
            stake,
        } => run_inspect(&candles, &reference, config.as_deref(), instrument, stake),
    }
}

fn run_config_defaults() -> Result<()> {
    print!("{}", StrategyConfig::default().to_toml()?);
    Ok(())
}

fn run_config_validate(path: &Path) -> Result<()> {
    let config = StrategyConfig::from_file(path)
        .with_context(|| format!("invalid config {}", path.display()))?;
    let fingerprint = config.fingerprint()?;
    println!("OK {} ({})", path.display(), fingerprint.short());
    println!("fingerprint: {fingerprint}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig> {
    match path {
        Some(path) => StrategyConfig::from_file(path)
            .with_context(|| format!("invalid config {}", path.display())),
        None => Ok(StrategyConfig::default()),
    }
}

fn run_inspect(
    candles_path: &Path,
    reference_path: &Path,
    config_path: Option<&Path>,
    instrument: String,
    stake: f64,
) -> Result<()> {
    if !stake.is_finite() || stake <= 0.0 {
        bail!("--stake must be a positive number, got {stake}");
    }

    let config = load_config(config_path)?;
    let main = candles::load_csv(candles_path)?;
    let reference = candles::load_csv(reference_path)?;

    let id = InstrumentId::new(instrument);
    let mut engine = Engine::new(config)?;
    engine.register(id.clone());

    let outcome = engine.on_tick(
        &id,
        &TickInput {
            main: &main,
            reference: &reference,
            proposed_stake: stake,
        },
    )?;

    info!(
        requests = outcome.requests.len(),
        gate = ?outcome.diagnostics.gate.state,
        trigger_count = outcome.diagnostics.entry.trigger_count,
        "tick evaluated"
    );

    let report = serde_json::json!({
        "diagnostics": outcome.diagnostics,
        "requests": outcome.requests,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
