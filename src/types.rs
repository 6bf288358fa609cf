//! Core data types for battery telemetry analysis
//!
//! A device's telemetry is a time-ordered list of [`Sample`]s. Measured fields
//! are optional because real site data has holes: a column may be absent from
//! a device's export entirely, or individual readings may be blank.
//!
//! ## Sign convention
//!
//! `battery_current` is negative while the battery supplies the load
//! (discharging) and positive or zero while it is charging or idle.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device (base-station site) identifier, e.g. `btsA`.
pub type DeviceId = String;

// ============================================================================
// Samples
// ============================================================================

/// One time-stamped telemetry observation for a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Observation time (site-local, no offset)
    pub timestamp: NaiveDateTime,
    /// Battery current (A), negative while discharging
    pub battery_current: Option<f64>,
    /// Rectifier (mains-backed) output current (A)
    pub ac_output_current: Option<f64>,
    /// Battery terminal voltage (V)
    pub battery_voltage: Option<f64>,
}

impl Sample {
    /// Sample with every measured field present.
    pub fn new(
        timestamp: NaiveDateTime,
        battery_current: f64,
        ac_output_current: f64,
        battery_voltage: f64,
    ) -> Self {
        Self {
            timestamp,
            battery_current: Some(battery_current),
            ac_output_current: Some(ac_output_current),
            battery_voltage: Some(battery_voltage),
        }
    }

    /// Sample with no measured fields (a grid point with no observation).
    pub fn empty(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            battery_current: None,
            ac_output_current: None,
            battery_voltage: None,
        }
    }

    /// True if at least one measured field is missing.
    pub fn has_gap(&self) -> bool {
        self.battery_current.is_none()
            || self.ac_output_current.is_none()
            || self.battery_voltage.is_none()
    }

    /// True if any of `fields` is missing.
    pub fn has_gap_in(&self, fields: &[RequiredField]) -> bool {
        fields.iter().any(|&f| self.field(f).is_none())
    }

    /// Value of a single field.
    pub fn field(&self, field: RequiredField) -> Option<f64> {
        match field {
            RequiredField::BatteryCurrent => self.battery_current,
            RequiredField::AcOutputCurrent => self.ac_output_current,
            RequiredField::BatteryVoltage => self.battery_voltage,
        }
    }
}

/// Measured fields an analysis step may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequiredField {
    BatteryCurrent,
    AcOutputCurrent,
    BatteryVoltage,
}

impl RequiredField {
    pub const ALL: [Self; 3] = [
        Self::BatteryCurrent,
        Self::AcOutputCurrent,
        Self::BatteryVoltage,
    ];

    /// Column name used in site CSV exports.
    pub fn column_name(self) -> &'static str {
        match self {
            Self::BatteryCurrent => "Battery Current(A)",
            Self::AcOutputCurrent => "AC/DC System Output Current(A)",
            Self::BatteryVoltage => "Battery Voltage(V)",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

// ============================================================================
// Device Series
// ============================================================================

/// Time-ordered telemetry for one device.
///
/// Samples are kept sorted by timestamp. Timestamps are unique once the
/// series has been through ingestion de-duplication or regularization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSeries {
    pub device_id: DeviceId,
    pub samples: Vec<Sample>,
}

impl DeviceSeries {
    /// Build a series, sorting samples by timestamp (stable for equal stamps).
    pub fn new(device_id: impl Into<DeviceId>, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self {
            device_id: device_id.into(),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True if any sample carries a value for `field`.
    ///
    /// A field that no sample carries is treated as an absent column.
    pub fn has_field(&self, field: RequiredField) -> bool {
        self.samples.iter().any(|s| s.field(field).is_some())
    }

    /// Fields carried by at least one sample.
    pub fn carried_fields(&self) -> Vec<RequiredField> {
        RequiredField::ALL
            .into_iter()
            .filter(|&f| self.has_field(f))
            .collect()
    }

    /// First required field the series does not carry at all, if any.
    pub fn first_missing_field(&self, required: &[RequiredField]) -> Option<RequiredField> {
        required.iter().copied().find(|&f| !self.has_field(f))
    }

    /// Index of the sample stamped exactly at `ts`.
    pub fn index_of(&self, ts: NaiveDateTime) -> Option<usize> {
        self.samples
            .binary_search_by_key(&ts, |s| s.timestamp)
            .ok()
    }

    /// Sample stamped exactly at `ts`.
    pub fn at(&self, ts: NaiveDateTime) -> Option<&Sample> {
        self.index_of(ts).map(|i| &self.samples[i])
    }

    /// Samples with `start <= timestamp <= end` (both bounds inclusive).
    pub fn range(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Sample] {
        if start > end {
            return &[];
        }
        let lo = self.samples.partition_point(|s| s.timestamp < start);
        let hi = self.samples.partition_point(|s| s.timestamp <= end);
        &self.samples[lo..hi]
    }
}

// ============================================================================
// Discharge Windows
// ============================================================================

/// Raw discharge candidate found by sign-change detection.
///
/// `start_index` is the first discharging sample; `end_index` is the first
/// sample after the discharging run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DischargeCandidate {
    pub start_index: usize,
    pub end_index: usize,
    /// Number of samples between the bounding transitions
    pub length: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// A validated and trimmed discharge interval.
///
/// Serializes as a two-element `[start, end]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "(NaiveDateTime, NaiveDateTime)", from = "(NaiveDateTime, NaiveDateTime)")]
pub struct DischargeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DischargeWindow {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl From<DischargeWindow> for (NaiveDateTime, NaiveDateTime) {
    fn from(w: DischargeWindow) -> Self {
        (w.start, w.end)
    }
}

impl From<(NaiveDateTime, NaiveDateTime)> for DischargeWindow {
    fn from((start, end): (NaiveDateTime, NaiveDateTime)) -> Self {
        Self { start, end }
    }
}

// ============================================================================
// SoC Output
// ============================================================================

/// A regularized, gap-filled sample with its accumulated charge balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SocSample {
    pub timestamp: NaiveDateTime,
    pub battery_current: Option<f64>,
    pub ac_output_current: Option<f64>,
    pub battery_voltage: Option<f64>,
    /// Ampere-hours depleted since the last inferred full charge
    pub soc: f64,
}

impl SocSample {
    pub fn from_sample(sample: &Sample, soc: f64) -> Self {
        Self {
            timestamp: sample.timestamp,
            battery_current: sample.battery_current,
            ac_output_current: sample.ac_output_current,
            battery_voltage: sample.battery_voltage,
            soc,
        }
    }

    /// The measured fields without the computed balance.
    pub fn sample(&self) -> Sample {
        Sample {
            timestamp: self.timestamp,
            battery_current: self.battery_current,
            ac_output_current: self.ac_output_current,
            battery_voltage: self.battery_voltage,
        }
    }
}
