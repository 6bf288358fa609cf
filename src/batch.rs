//! Fleet-wide analysis
//!
//! Runs the segmenter and the estimator over every device of a fleet. Devices
//! are independent, so they are processed in parallel with rayon; results are
//! collected into ordered maps so output never depends on scheduling.
//!
//! A device that fails (empty series, missing column, nothing to report) is
//! recorded in the report's `skipped` map and never affects other devices.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::discharge::DischargeSegmenter;
use crate::error::AnalysisError;
use crate::soc::SocEstimator;
use crate::types::{DeviceId, DeviceSeries, DischargeWindow, SocSample};

/// Per-device telemetry for a whole fleet, keyed by device id.
pub type Fleet = BTreeMap<DeviceId, DeviceSeries>;

/// Build a fleet map from a list of series.
///
/// If two series share a device id the later one wins.
pub fn fleet_from(series: impl IntoIterator<Item = DeviceSeries>) -> Fleet {
    series
        .into_iter()
        .map(|s| (s.device_id.clone(), s))
        .collect()
}

// ============================================================================
// Discharge Report
// ============================================================================

/// Discharge windows for every device that produced at least one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DischargeReport {
    /// Windows per device, longest raw candidate first
    pub windows: BTreeMap<DeviceId, Vec<DischargeWindow>>,
    /// Devices that could not be segmented, with the reason
    #[serde(skip)]
    pub skipped: BTreeMap<DeviceId, AnalysisError>,
    /// Devices analysed without error (including those with no windows)
    pub devices_analysed: usize,
}

impl DischargeReport {
    /// Windows for a device; empty for devices with none.
    pub fn windows_for(&self, device_id: &str) -> &[DischargeWindow] {
        self.windows.get(device_id).map_or(&[], Vec::as_slice)
    }

    pub fn total_windows(&self) -> usize {
        self.windows.values().map(Vec::len).sum()
    }
}

/// Segment every device in the fleet.
pub fn segment_fleet(fleet: &Fleet, config: &AnalysisConfig) -> DischargeReport {
    let segmenter = DischargeSegmenter::new(config);

    let results: Vec<(DeviceId, Result<Vec<DischargeWindow>, AnalysisError>)> = fleet
        .par_iter()
        .map(|(id, series)| (id.clone(), segmenter.segment(series)))
        .collect();

    let mut report = DischargeReport::default();
    for (device_id, result) in results {
        match result {
            Ok(windows) => {
                report.devices_analysed += 1;
                if !windows.is_empty() {
                    report.windows.insert(device_id, windows);
                }
            }
            Err(e) => {
                log_skip(&device_id, &e, "discharge segmentation");
                report.skipped.insert(device_id, e);
            }
        }
    }

    info!(
        devices = fleet.len(),
        analysed = report.devices_analysed,
        with_discharges = report.windows.len(),
        skipped = report.skipped.len(),
        windows = report.total_windows(),
        "Discharge extraction complete"
    );
    report
}

// ============================================================================
// SoC Report
// ============================================================================

/// SoC-annotated series for every device that could be estimated.
#[derive(Debug, Clone, Default)]
pub struct SocReport {
    pub series: BTreeMap<DeviceId, Vec<SocSample>>,
    pub skipped: BTreeMap<DeviceId, AnalysisError>,
}

impl SocReport {
    /// SoC series for a device; empty for skipped devices.
    pub fn series_for(&self, device_id: &str) -> &[SocSample] {
        self.series.get(device_id).map_or(&[], Vec::as_slice)
    }

    pub fn total_samples(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }
}

/// Estimate SoC for every device in the fleet.
pub fn estimate_fleet(fleet: &Fleet, config: &AnalysisConfig) -> SocReport {
    let estimator = SocEstimator::new(config);

    let results: Vec<(DeviceId, Result<Vec<SocSample>, AnalysisError>)> = fleet
        .par_iter()
        .map(|(id, series)| (id.clone(), estimator.estimate(series)))
        .collect();

    let mut report = SocReport::default();
    for (device_id, result) in results {
        match result {
            Ok(series) => {
                info!(device = %device_id, samples = series.len(), "SoC calculated");
                report.series.insert(device_id, series);
            }
            Err(e) => {
                log_skip(&device_id, &e, "SoC estimation");
                report.skipped.insert(device_id, e);
            }
        }
    }

    info!(
        devices = fleet.len(),
        estimated = report.series.len(),
        skipped = report.skipped.len(),
        samples = report.total_samples(),
        "SoC estimation complete"
    );
    report
}

fn log_skip(device_id: &str, error: &AnalysisError, stage: &str) {
    if error.is_expected() {
        debug!(device = %device_id, stage, reason = %error, "Device produced no result");
    } else {
        warn!(device = %device_id, stage, error = %error, "Device skipped");
    }
}
