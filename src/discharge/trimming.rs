//! Candidate boundary trimming and validation
//!
//! The first and last samples of a sign-detected run sit on the transition
//! itself and are unstable, so both bounds move inward by one grid step.
//! The shortened window must show a real voltage sag, and its end is pulled
//! in to the first step where the discharge current collapses.

use chrono::{Duration, NaiveDateTime};

use crate::config::DischargeConfig;
use crate::error::AnalysisError;
use crate::types::{DeviceSeries, DischargeCandidate, DischargeWindow};

/// Shift, validate and trim one raw candidate.
///
/// # Errors
/// - `EmptyWindow` if the shifted window holds no voltage readings
/// - `VoltageNotStressed` if the minimum voltage is not below the threshold
/// - `DegenerateWindow` if trimming leaves `end <= start`
pub fn trim_candidate(
    series: &DeviceSeries,
    candidate: &DischargeCandidate,
    config: &DischargeConfig,
    time_step: Duration,
) -> Result<DischargeWindow, AnalysisError> {
    let start = candidate.start + time_step;
    let end = candidate.end - time_step;

    let min_voltage = series
        .range(start, end)
        .iter()
        .filter_map(|s| s.battery_voltage)
        .reduce(f64::min)
        .ok_or(AnalysisError::EmptyWindow { start, end })?;

    if min_voltage.is_nan() || min_voltage >= config.voltage_threshold {
        return Err(AnalysisError::VoltageNotStressed {
            min_voltage,
            threshold: config.voltage_threshold,
        });
    }

    let end = current_decay_end(series, start, end, config.current_drop_ratio, time_step)
        .unwrap_or(end);

    if end <= start {
        return Err(AnalysisError::DegenerateWindow { start, end });
    }

    Ok(DischargeWindow { start, end })
}

/// First grid step in `[start, end]` where |I(t)| < ratio * |I(t - step)|.
///
/// Steps whose current (or the previous step's) is missing are skipped.
fn current_decay_end(
    series: &DeviceSeries,
    start: NaiveDateTime,
    end: NaiveDateTime,
    drop_ratio: f64,
    time_step: Duration,
) -> Option<NaiveDateTime> {
    let current_at = |t: NaiveDateTime| series.at(t).and_then(|s| s.battery_current);

    let mut t = start;
    while t <= end {
        if let (Some(now), Some(prev)) = (current_at(t), current_at(t - time_step)) {
            if now.abs() < drop_ratio * prev.abs() {
                return Some(t);
            }
        }
        t += time_step;
    }
    None
}
