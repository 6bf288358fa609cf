//! State-of-Charge Estimator
//!
//! Turns a device's raw telemetry into a regular, gap-free series carrying a
//! running charge balance.
//!
//! ## Steps (order matters)
//! 1. `regularize`: resample onto the fixed time grid
//! 2. `gap_fill::fill_from_previous_day`: same time yesterday
//! 3. `gap_fill::forward_fill`: last known value
//! 4. `accumulator::accumulate_charge`: coulomb counting with resets

pub mod accumulator;
pub mod gap_fill;
pub mod regularize;

pub use accumulator::{accumulate_charge, mains_carrying_load, next_state, ChargeState};
pub use gap_fill::{fill_from_previous_day, forward_fill};
pub use regularize::{align_down, regularize};

use chrono::Duration;
use tracing::debug;

use crate::config::{AnalysisConfig, SocConfig};
use crate::error::AnalysisError;
use crate::types::{DeviceSeries, RequiredField, Sample, SocSample};

/// Fields a series must carry for SoC estimation.
pub const ESTIMATOR_FIELDS: [RequiredField; 2] =
    [RequiredField::BatteryCurrent, RequiredField::AcOutputCurrent];

/// SoC estimator bound to one set of thresholds.
#[derive(Debug, Clone)]
pub struct SocEstimator {
    config: SocConfig,
    time_step: Duration,
    sampling_time_hours: f64,
    lookback_steps: usize,
}

impl SocEstimator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.soc.clone(),
            time_step: config.time_step(),
            sampling_time_hours: config.sampling_time_hours(),
            lookback_steps: config.fill_lookback_steps(),
        }
    }

    /// Regularize, fill, and annotate one device's series with `soc`.
    pub fn estimate(&self, series: &DeviceSeries) -> Result<Vec<SocSample>, AnalysisError> {
        let grid = self.prepare(series)?;
        let charge = accumulate_charge(&grid, &self.config, self.sampling_time_hours);

        Ok(grid
            .iter()
            .zip(charge)
            .map(|(sample, soc)| SocSample::from_sample(sample, soc))
            .collect())
    }

    /// Regularized and gap-filled grid, before charge accounting.
    pub fn prepare(&self, series: &DeviceSeries) -> Result<Vec<Sample>, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        if let Some(field) = series.first_missing_field(&ESTIMATOR_FIELDS) {
            return Err(AnalysisError::MissingField { field });
        }

        let carried = series.carried_fields();
        let mut grid = regularize(&series.samples, self.time_step);
        let empty_points = grid.iter().filter(|s| s.has_gap_in(&carried)).count();
        let from_yesterday = fill_from_previous_day(&mut grid, self.lookback_steps, &carried);
        let forward_filled = forward_fill(&mut grid);

        debug!(
            device = %series.device_id,
            raw = series.len(),
            grid = grid.len(),
            gaps = empty_points,
            filled_from_yesterday = from_yesterday,
            forward_filled_fields = forward_filled,
            "Series regularized"
        );
        Ok(grid)
    }
}
