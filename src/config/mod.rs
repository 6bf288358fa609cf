//! Analysis Configuration Module
//!
//! Provides operator-tunable thresholds for discharge segmentation and SoC
//! estimation, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `BTS_CONFIG` environment variable (path to TOML file)
//! 2. `analysis_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Library entry points take `&AnalysisConfig` explicitly. The global slot
//! below is only a convenience for the binaries.

mod analysis_config;
pub mod defaults;
pub mod validation;

pub use analysis_config::*;

use std::sync::OnceLock;

/// Global analysis configuration, initialized once at startup.
static ANALYSIS_CONFIG: OnceLock<AnalysisConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: AnalysisConfig) {
    if ANALYSIS_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// The global configuration, or built-in defaults if `init()` was never called.
pub fn get() -> &'static AnalysisConfig {
    ANALYSIS_CONFIG.get_or_init(AnalysisConfig::default)
}
