//! BTS Analytics: battery telemetry analysis for base-station sites
//!
//! Two independent analyses over per-device telemetry:
//!
//! - **Discharge segmentation** (`discharge`): finds the time windows where a
//!   site ran on battery during a mains outage and the battery was genuinely
//!   stressed.
//! - **SoC estimation** (`soc`): regularizes and gap-fills each device's
//!   series and annotates it with a coulomb-counted charge balance.
//!
//! `ingest` and `export` move data between site CSV exports and the
//! analysis types; `batch` runs either analysis over a whole fleet.

pub mod batch;
pub mod config;
pub mod discharge;
pub mod error;
pub mod export;
pub mod ingest;
pub mod soc;
pub mod types;

pub use batch::{estimate_fleet, fleet_from, segment_fleet, DischargeReport, Fleet, SocReport};
pub use config::AnalysisConfig;
pub use discharge::DischargeSegmenter;
pub use error::AnalysisError;
pub use soc::SocEstimator;
pub use types::{
    DeviceId, DeviceSeries, DischargeCandidate, DischargeWindow, RequiredField, Sample, SocSample,
};
