//! BTS Telemetry Simulation
//!
//! Generates synthetic per-device battery telemetry for exercising
//! bts-analytics end to end. Each simulated site has:
//! - A diurnal DC load carried by the rectifier while mains is up
//! - Random mains outages where the battery carries the load, the voltage
//!   sags with depth of discharge, and the low-voltage disconnect finally
//!   drops the current to zero
//! - Recharge after the outage, then float
//! - Gaussian sensor noise, dropped rows and blank cells
//!
//! # Usage
//! ```bash
//! ./telemetry-sim --output data/ --devices 5 --days 7 --seed 42
//! bts-analytics pipeline --input data/ --output out/
//! ```

use std::f64::consts::TAU;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use tracing::info;

// ============================================================================
// Site Constants
// ============================================================================

/// Float voltage with mains up and battery full (V)
const FLOAT_VOLTAGE: f64 = 53.5;
/// Voltage while recharging (V)
const CHARGE_VOLTAGE: f64 = 54.5;
/// Resting voltage at the start of a discharge (V)
const DISCHARGE_START_VOLTAGE: f64 = 51.5;
/// Voltage drop per unit depth of discharge (V)
const DISCHARGE_SAG: f64 = 7.0;
/// Voltage after the low-voltage disconnect opens (V)
const DISCONNECT_VOLTAGE: f64 = 44.0;
/// Remaining capacity fraction at which the low-voltage disconnect opens
const DISCONNECT_FRACTION: f64 = 0.1;
/// Recharge current as a fraction of capacity (C/10)
const CHARGE_RATE: f64 = 0.1;
/// Amplitude of the daily load swing around the base load
const DIURNAL_SWING: f64 = 0.25;
/// Outage duration bounds (minutes)
const MIN_OUTAGE_MINUTES: i64 = 30;
const MAX_OUTAGE_MINUTES: i64 = 600;

const HEADER: &str =
    "timestamp,Battery Current(A),AC/DC System Output Current(A),Battery Voltage(V)";

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "telemetry-sim")]
#[command(about = "Synthetic BTS battery telemetry for bts-analytics testing")]
#[command(version)]
struct Args {
    /// Directory to write <device>.csv files into
    #[arg(short, long)]
    output: PathBuf,

    /// Number of simulated sites
    #[arg(short = 'n', long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=100))]
    devices: u32,

    /// Simulated days per site
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=90))]
    days: u32,

    /// Sampling interval in minutes
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(i64).range(1..=60))]
    step_minutes: i64,

    /// First simulated day (YYYY-MM-DD)
    #[arg(long, default_value = "2023-05-01")]
    start: NaiveDate,

    /// Expected mains outages per site per day
    #[arg(long, default_value = "0.6")]
    outages_per_day: f64,

    /// Probability that a row is dropped entirely
    #[arg(long, default_value = "0.02")]
    drop_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Site Model
// ============================================================================

/// One generated telemetry row; `None` cells are written blank.
struct Reading {
    timestamp: NaiveDateTime,
    battery_current: Option<f64>,
    ac_output_current: Option<f64>,
    battery_voltage: Option<f64>,
}

struct SiteState {
    rng: StdRng,
    /// Mean DC load (A)
    base_load: f64,
    /// Battery capacity (Ah)
    capacity_ah: f64,
    /// Charge drawn since last full (Ah)
    depleted_ah: f64,
    /// Steps left in the current outage
    outage_remaining: i64,
    outages: u32,

    current_noise: Normal<f64>,
    voltage_noise: Normal<f64>,
}

impl SiteState {
    fn new(seed: Option<u64>, index: u32) -> Result<Self> {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(u64::from(index))),
            None => StdRng::from_entropy(),
        };
        let base_load = rng.gen_range(18.0..40.0);
        let capacity_ah = rng.gen_range(100.0..300.0);

        Ok(Self {
            rng,
            base_load,
            capacity_ah,
            depleted_ah: 0.0,
            outage_remaining: 0,
            outages: 0,
            current_noise: Normal::new(0.0, 0.3).map_err(|e| anyhow!("current noise: {e}"))?,
            voltage_noise: Normal::new(0.0, 0.05).map_err(|e| anyhow!("voltage noise: {e}"))?,
        })
    }

    /// DC load at a time of day: peaks mid-afternoon, troughs pre-dawn.
    fn load_at(&self, ts: NaiveDateTime) -> f64 {
        let hour = f64::from(ts.hour()) + f64::from(ts.minute()) / 60.0;
        self.base_load * (1.0 + DIURNAL_SWING * ((hour - 9.0) / 24.0 * TAU).sin())
    }

    fn step(&mut self, ts: NaiveDateTime, step_minutes: i64, outage_start_p: f64) -> Reading {
        let dt_hours = step_minutes as f64 / 60.0;
        let load = self.load_at(ts);

        if self.outage_remaining == 0 && self.rng.gen_bool(outage_start_p) {
            let minutes = self.rng.gen_range(MIN_OUTAGE_MINUTES..=MAX_OUTAGE_MINUTES);
            self.outage_remaining = (minutes / step_minutes).max(1);
            self.outages += 1;
        }

        let noise = self.current_noise.sample(&mut self.rng);
        let v_noise = self.voltage_noise.sample(&mut self.rng);

        let (battery_current, ac_output_current, battery_voltage) = if self.outage_remaining > 0 {
            self.outage_remaining -= 1;
            let remaining = 1.0 - self.depleted_ah / self.capacity_ah;

            if remaining <= DISCONNECT_FRACTION {
                // Load shed by the low-voltage disconnect
                (noise * 0.1, 0.0, DISCONNECT_VOLTAGE + v_noise)
            } else {
                self.depleted_ah += load * dt_hours;
                let depth = self.depleted_ah / self.capacity_ah;
                let voltage = DISCHARGE_START_VOLTAGE - DISCHARGE_SAG * depth;
                (-load + noise, 0.0, voltage + v_noise)
            }
        } else if self.depleted_ah > 0.0 {
            let charge = CHARGE_RATE * self.capacity_ah;
            self.depleted_ah = (self.depleted_ah - charge * dt_hours).max(0.0);
            (charge + noise, load + charge + noise, CHARGE_VOLTAGE + v_noise)
        } else {
            (noise, load + noise, FLOAT_VOLTAGE + v_noise)
        };

        Reading {
            timestamp: ts,
            battery_current: Some(battery_current),
            ac_output_current: Some(ac_output_current),
            battery_voltage: Some(battery_voltage),
        }
    }

    /// Blank one random cell with the given probability.
    fn degrade(&mut self, reading: &mut Reading, blank_p: f64) {
        if !self.rng.gen_bool(blank_p) {
            return;
        }
        match self.rng.gen_range(0..3) {
            0 => reading.battery_current = None,
            1 => reading.ac_output_current = None,
            _ => reading.battery_voltage = None,
        }
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

fn write_site(path: &Path, args: &Args, site: &mut SiteState) -> Result<usize> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{HEADER}")?;

    let steps_per_day = 24 * 60 / args.step_minutes;
    let total_steps = steps_per_day * i64::from(args.days);
    let outage_start_p = (args.outages_per_day / steps_per_day as f64).clamp(0.0, 1.0);
    let drop_rate = args.drop_rate.clamp(0.0, 1.0);
    let start = args.start.and_hms_opt(0, 0, 0).unwrap_or_default();

    let mut rows = 0;
    for i in 0..total_steps {
        let ts = start + Duration::minutes(i * args.step_minutes);
        let mut reading = site.step(ts, args.step_minutes, outage_start_p);

        if site.rng.gen_bool(drop_rate) {
            continue;
        }
        site.degrade(&mut reading, drop_rate / 4.0);

        writeln!(
            writer,
            "{},{},{},{}",
            reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
            cell(reading.battery_current),
            cell(reading.ac_output_current),
            cell(reading.battery_voltage)
        )?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
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

    let args = Args::parse();
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    info!(
        devices = args.devices,
        days = args.days,
        step_min = args.step_minutes,
        seed = ?args.seed,
        "Generating synthetic telemetry"
    );

    for index in 0..args.devices {
        let device_id = format!("bts{:03}", index + 1);
        let path = args.output.join(format!("{device_id}.csv"));
        let mut site = SiteState::new(args.seed, index)?;

        let rows = write_site(&path, &args, &mut site)?;
        info!(
            device = %device_id,
            rows,
            outages = site.outages,
            base_load_a = site.base_load,
            capacity_ah = site.capacity_ah,
            "Site written"
        );
    }

    info!(dir = %args.output.display(), "Simulation complete");
    Ok(())
}
