//! Coulomb-counting charge balance
//!
//! `Q[m]` is the charge (Ah) drawn from the battery since the last inferred
//! full charge. It is a two-state machine evaluated once per grid step:
//!
//! - **Reset** (`Q[m] = 0`): mains is carrying the load while the battery
//!   sits idle, so the battery is taken to be full; or the previous step
//!   went negative, which is physically meaningless integration drift.
//! - **Accumulating**: `Q[m] = Q[m-1] - dt * I_batt[m]`. Discharge current is
//!   negative, so discharging grows `Q`.
//!
//! `Q[0]` is always 0.

use crate::config::SocConfig;
use crate::types::Sample;

/// Per-step state of the charge counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Reset,
    Accumulating,
}

/// Battery idle inside the near-zero band while the rectifier carries load.
///
/// Both bounds of the band are exclusive. Missing readings never count as
/// mains-present.
pub fn mains_carrying_load(sample: &Sample, config: &SocConfig) -> bool {
    let band = config.near_zero_current_band;
    match (sample.battery_current, sample.ac_output_current) {
        (Some(current), Some(ac)) => {
            current > -band && current < band && ac > config.ac_present_threshold
        }
        _ => false,
    }
}

/// Decide the counter state for a step from its sample and the previous value.
pub fn next_state(sample: &Sample, previous_q: f64, config: &SocConfig) -> ChargeState {
    if mains_carrying_load(sample, config) || previous_q < 0.0 {
        ChargeState::Reset
    } else {
        ChargeState::Accumulating
    }
}

/// Run the counter over a regularized, gap-filled grid.
///
/// `sampling_time_hours` is the grid step in hours. A step whose battery
/// current is still missing after gap filling holds the previous value.
pub fn accumulate_charge(grid: &[Sample], config: &SocConfig, sampling_time_hours: f64) -> Vec<f64> {
    let mut q = Vec::with_capacity(grid.len());
    if grid.is_empty() {
        return q;
    }
    q.push(0.0);

    for sample in &grid[1..] {
        let previous = q.last().copied().unwrap_or(0.0);
        let value = match next_state(sample, previous, config) {
            ChargeState::Reset => 0.0,
            ChargeState::Accumulating => match sample.battery_current {
                Some(current) => previous + sampling_time_hours * current * -1.0,
                None => previous,
            },
        };
        q.push(value);
    }
    q
}
