//! Analysis Configuration - all thresholds as operator-tunable TOML values
//!
//! Each section implements `Default` with the standard field values, so an
//! empty or missing config file behaves exactly like the built-in constants.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an analysis run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Telemetry grid
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Discharge segmentation thresholds
    #[serde(default)]
    pub discharge: DischargeConfig,

    /// SoC estimation thresholds
    #[serde(default)]
    pub soc: SocConfig,
}

impl AnalysisConfig {
    /// Load configuration using the standard search order:
    /// 1. `$BTS_CONFIG` environment variable
    /// 2. `./analysis_config.toml`
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded analysis config from BTS_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from BTS_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "BTS_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded analysis config from ./analysis_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./analysis_config.toml, using defaults");
                }
            }
        }

        info!("No analysis_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings; range violations are errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate every threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Grid step as a duration.
    ///
    /// Falls back to the default step if the configured value is out of
    /// `Duration` range; `validate` rejects such values on load.
    pub fn time_step(&self) -> Duration {
        Duration::try_minutes(self.sampling.time_step_minutes)
            .unwrap_or_else(|| Duration::minutes(defaults::TIME_STEP_MINUTES))
    }

    /// Grid step in hours, the integration interval for charge accounting.
    pub fn sampling_time_hours(&self) -> f64 {
        self.sampling.time_step_minutes as f64 / 60.0
    }

    /// Same-time-yesterday lookback in grid steps.
    ///
    /// Validation guarantees the lookback is a whole multiple of the step.
    pub fn fill_lookback_steps(&self) -> usize {
        let step = self.sampling.time_step_minutes.max(1);
        usize::try_from(self.soc.fill_lookback_hours.saturating_mul(60) / step).unwrap_or(0)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sampling
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Fixed grid step (minutes)
    #[serde(default = "default_time_step")]
    pub time_step_minutes: i64,
}

fn default_time_step() -> i64 { defaults::TIME_STEP_MINUTES }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            time_step_minutes: default_time_step(),
        }
    }
}

// ============================================================================
// Discharge Segmenter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DischargeConfig {
    /// Minimum voltage inside the window must fall below this (V)
    #[serde(default = "default_voltage_threshold")]
    pub voltage_threshold: f64,

    /// End is trimmed where |I(t)| < ratio * |I(t - step)|
    #[serde(default = "default_current_drop_ratio")]
    pub current_drop_ratio: f64,

    /// Candidate length must strictly exceed this many samples
    #[serde(default = "default_min_discharge_samples")]
    pub min_discharge_samples: usize,

    /// Rectifier output at discharge onset must be at most this (A)
    #[serde(default = "default_ac_discharge_max")]
    pub ac_discharge_max_current: f64,
}

fn default_voltage_threshold() -> f64 { defaults::VOLTAGE_THRESHOLD_V }
fn default_current_drop_ratio() -> f64 { defaults::CURRENT_DROP_RATIO }
fn default_min_discharge_samples() -> usize { defaults::MIN_DISCHARGE_SAMPLES }
fn default_ac_discharge_max() -> f64 { defaults::AC_DISCHARGE_MAX_CURRENT_A }

impl Default for DischargeConfig {
    fn default() -> Self {
        Self {
            voltage_threshold: default_voltage_threshold(),
            current_drop_ratio: default_current_drop_ratio(),
            min_discharge_samples: default_min_discharge_samples(),
            ac_discharge_max_current: default_ac_discharge_max(),
        }
    }
}

// ============================================================================
// SoC Estimator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocConfig {
    /// Rectifier output above this means mains is present (A)
    #[serde(default = "default_ac_present_threshold")]
    pub ac_present_threshold: f64,

    /// Half-width of the "battery idle" current band (A)
    #[serde(default = "default_near_zero_band")]
    pub near_zero_current_band: f64,

    /// Gap-fill lookback (hours)
    #[serde(default = "default_fill_lookback")]
    pub fill_lookback_hours: i64,
}

fn default_ac_present_threshold() -> f64 { defaults::AC_PRESENT_THRESHOLD_A }
fn default_near_zero_band() -> f64 { defaults::NEAR_ZERO_CURRENT_BAND_A }
fn default_fill_lookback() -> i64 { defaults::FILL_LOOKBACK_HOURS }

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            ac_present_threshold: default_ac_present_threshold(),
            near_zero_current_band: default_near_zero_band(),
            fill_lookback_hours: default_fill_lookback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = AnalysisConfig::default();
        assert_eq!(config.sampling.time_step_minutes, 5);
        assert!((config.discharge.voltage_threshold - 46.2).abs() < 1e-9);
        assert!((config.discharge.current_drop_ratio - 0.2).abs() < 1e-9);
        assert_eq!(config.discharge.min_discharge_samples, 6);
        assert!((config.soc.ac_present_threshold - 10.0).abs() < 1e-9);
        assert!((config.soc.near_zero_current_band - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = AnalysisConfig::from_toml_str(
            r#"
[discharge]
voltage_threshold = 47.0
"#,
        )
        .unwrap();
        assert!((config.discharge.voltage_threshold - 47.0).abs() < 1e-9);
        assert!((config.discharge.current_drop_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_derived_durations() {
        let config = AnalysisConfig::default();
        assert_eq!(config.time_step(), Duration::minutes(5));
        assert!((config.sampling_time_hours() - 5.0 / 60.0).abs() < 1e-12);
        assert_eq!(config.fill_lookback_steps(), 288);
    }

    #[test]
    fn test_out_of_range_values_do_not_panic() {
        let mut config = AnalysisConfig::default();
        config.sampling.time_step_minutes = i64::MAX;
        assert_eq!(config.time_step(), Duration::minutes(5));
        assert_eq!(config.fill_lookback_steps(), 0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AnalysisConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AnalysisConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_step_rejected() {
        let err = AnalysisConfig::from_toml_str(
            r#"
[sampling]
time_step_minutes = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
