//! Per-device analysis errors
//!
//! Every error here is scoped to a single device (or a single candidate
//! within a device). The batch layer absorbs them as "no result for this
//! device" and never lets one device abort the rest of the fleet.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::types::RequiredField;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Series is empty")]
    EmptyInput,

    #[error("Required field missing from series: {field}")]
    MissingField { field: RequiredField },

    #[error("Insufficient data: found {transitions} sign transition(s), need at least 2")]
    InsufficientData { transitions: usize },

    #[error("No samples in lookup window {start} .. {end}")]
    EmptyWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Minimum voltage {min_voltage:.2} V never fell below {threshold:.2} V")]
    VoltageNotStressed { min_voltage: f64, threshold: f64 },

    #[error("Trimmed window collapsed: {start} .. {end}")]
    DegenerateWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl AnalysisError {
    /// True for outcomes that are a normal "nothing to report" rather than
    /// malformed input. Used to choose the log level when a device is skipped.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::EmptyWindow { .. }
                | Self::VoltageNotStressed { .. }
                | Self::DegenerateWindow { .. }
        )
    }
}
