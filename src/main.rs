//! bts-analytics - battery telemetry analysis for base-station sites
//!
//! Reads one telemetry CSV per device from an input directory and writes
//! discharge windows and/or SoC series to an output directory.
//!
//! # Usage
//!
//! ```bash
//! # Discharge windows only
//! bts-analytics discharges --input data/ --output out/
//!
//! # SoC series only, with custom thresholds
//! bts-analytics soc --input data/ --output out/ --config analysis_config.toml
//!
//! # Both, in order
//! bts-analytics pipeline --input data/ --output out/
//!
//! # Validate a config file
//! bts-analytics check-config analysis_config.toml
//! ```
//!
//! # Environment Variables
//!
//! - `BTS_CONFIG`: Path to analysis config TOML (same as `--config`)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use bts_analytics::config::{self, validation, AnalysisConfig, ConfigError};
use bts_analytics::{batch, export, ingest, Fleet};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "bts-analytics")]
#[command(about = "Discharge segmentation and SoC estimation for BTS battery telemetry")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract discharge windows and write all_discharges.json
    Discharges(RunArgs),
    /// Estimate SoC and write one <device>_soc.csv per device
    Soc(RunArgs),
    /// Import, extract discharges, then estimate SoC
    Pipeline(RunArgs),
    /// Load and validate a config file without running any analysis
    CheckConfig {
        /// Path to the TOML file
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory of per-device telemetry CSV files
    #[arg(long, short)]
    input: PathBuf,

    /// Directory for result files (created if missing)
    #[arg(long, short)]
    output: PathBuf,

    /// Analysis config TOML (default: ./analysis_config.toml, then built-in)
    #[arg(long, short, env = "BTS_CONFIG")]
    config: Option<PathBuf>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    match args.command {
        Command::Discharges(run) => {
            let fleet = prepare(&run)?;
            run_discharges(&fleet, &run.output)
        }
        Command::Soc(run) => {
            let fleet = prepare(&run)?;
            run_soc(&fleet, &run.output)
        }
        Command::Pipeline(run) => {
            let fleet = prepare(&run)?;
            run_discharges(&fleet, &run.output)?;
            run_soc(&fleet, &run.output)
        }
        Command::CheckConfig { path } => check_config(&path),
    }
}

/// Load config into the global slot and import the input directory.
fn prepare(run: &RunArgs) -> Result<Fleet> {
    let analysis_config = match &run.config {
        Some(path) => AnalysisConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::load(),
    };
    info!(
        step_min = analysis_config.sampling.time_step_minutes,
        voltage_threshold = analysis_config.discharge.voltage_threshold,
        lookback_h = analysis_config.soc.fill_lookback_hours,
        "Analysis config loaded"
    );
    config::init(analysis_config);

    let fleet = ingest::load_directory(&run.input)
        .with_context(|| format!("Failed to import telemetry from {}", run.input.display()))?;
    if fleet.is_empty() {
        warn!(dir = %run.input.display(), "No device telemetry found");
    }
    Ok(fleet)
}

fn run_discharges(fleet: &Fleet, output: &Path) -> Result<()> {
    let started = Instant::now();
    let report = batch::segment_fleet(fleet, config::get());
    let path = export::write_discharges_json(&report, output)
        .context("Failed to write discharge summary")?;

    info!(
        devices = fleet.len(),
        with_discharges = report.windows.len(),
        skipped = report.skipped.len(),
        windows = report.total_windows(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        path = %path.display(),
        "Discharge extraction finished"
    );
    Ok(())
}

fn run_soc(fleet: &Fleet, output: &Path) -> Result<()> {
    let started = Instant::now();
    let report = batch::estimate_fleet(fleet, config::get());
    let written = export::write_soc_csvs(&report, output).context("Failed to write SoC series")?;

    info!(
        devices = fleet.len(),
        estimated = report.series.len(),
        skipped = report.skipped.len(),
        files = written.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "SoC estimation finished"
    );
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    for warning in validation::validate_unknown_keys(&text) {
        println!("warning: {warning}");
    }

    match AnalysisConfig::from_toml_str(&text) {
        Ok(cfg) => {
            for warning in validation::validate_ranges(&cfg).1 {
                println!("warning: {warning}");
            }
            println!("{} is valid", path.display());
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            for error in &errors {
                println!("error: {error}");
            }
            bail!("{} has {} invalid value(s)", path.display(), errors.len())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to parse {}", path.display())),
    }
}
