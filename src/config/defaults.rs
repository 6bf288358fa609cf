//! System-wide default constants.
//!
//! These are the values used when no config file is present. Grouped by the
//! analysis step that consumes them.

// ============================================================================
// Sampling
// ============================================================================

/// Telemetry grid step (minutes).
pub const TIME_STEP_MINUTES: i64 = 5;

/// Largest accepted grid step (minutes): one sample per day.
pub const MAX_TIME_STEP_MINUTES: i64 = 1440;

// ============================================================================
// Discharge Segmenter
// ============================================================================

/// A discharge only counts if battery voltage sags below this (V).
pub const VOLTAGE_THRESHOLD_V: f64 = 46.2;

/// Current-decay ratio that marks the load disconnecting during a discharge.
pub const CURRENT_DROP_RATIO: f64 = 0.2;

/// Candidates must span strictly more than this many samples.
///
/// 6 samples at 5 minutes = 30 minutes.
pub const MIN_DISCHARGE_SAMPLES: usize = 6;

/// Rectifier output at discharge onset must not exceed this (A).
pub const AC_DISCHARGE_MAX_CURRENT_A: f64 = 5.0;

// ============================================================================
// SoC Estimator
// ============================================================================

/// Rectifier output above this means mains is carrying the load (A).
pub const AC_PRESENT_THRESHOLD_A: f64 = 10.0;

/// Battery current within ±this band counts as "not charging" (A).
pub const NEAR_ZERO_CURRENT_BAND_A: f64 = 5.0;

/// Same-time-yesterday gap fill looks back this far (hours).
pub const FILL_LOOKBACK_HOURS: i64 = 24;

/// Largest accepted gap-fill lookback (hours).
pub const MAX_FILL_LOOKBACK_HOURS: i64 = 24 * 31;

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "BTS_CONFIG";

/// Config file looked for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "analysis_config.toml";
