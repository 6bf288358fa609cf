//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::defaults;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for AnalysisConfig.
///
/// Any new field added to AnalysisConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [sampling]
        "sampling",
        "sampling.time_step_minutes",
        // [discharge]
        "discharge",
        "discharge.voltage_threshold",
        "discharge.current_drop_ratio",
        "discharge.min_discharge_samples",
        "discharge.ac_discharge_max_current",
        // [soc]
        "soc",
        "soc.ac_present_threshold",
        "soc.near_zero_current_band",
        "soc.fill_lookback_hours",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties go to the lexicographically smaller key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|&(dist, _)| dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails: parse errors are reported later by serde.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate ranges on a parsed AnalysisConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must stop
/// the run; warnings are suspicious but usable.
pub fn validate_ranges(config: &super::AnalysisConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let step = config.sampling.time_step_minutes;
    if !(1..=defaults::MAX_TIME_STEP_MINUTES).contains(&step) {
        errors.push(format!(
            "sampling.time_step_minutes = {step} must be in 1..={}",
            defaults::MAX_TIME_STEP_MINUTES
        ));
    }

    let d = &config.discharge;
    let s = &config.soc;
    let finite = [
        ("discharge.voltage_threshold", d.voltage_threshold),
        ("discharge.current_drop_ratio", d.current_drop_ratio),
        ("discharge.ac_discharge_max_current", d.ac_discharge_max_current),
        ("soc.ac_present_threshold", s.ac_present_threshold),
        ("soc.near_zero_current_band", s.near_zero_current_band),
    ];
    for (name, value) in finite {
        if !value.is_finite() {
            errors.push(format!("{name} = {value} must be a finite number"));
        }
    }

    // Ratio is compared against a previous magnitude; 0 disables trimming, >1 trims everything
    if d.current_drop_ratio.is_nan() || d.current_drop_ratio <= 0.0 || d.current_drop_ratio > 1.0 {
        errors.push(format!(
            "discharge.current_drop_ratio = {} must be in (0, 1]",
            d.current_drop_ratio
        ));
    }

    if d.voltage_threshold <= 0.0 {
        errors.push(format!(
            "discharge.voltage_threshold = {:.2} must be > 0",
            d.voltage_threshold
        ));
    } else if !(12.0..=60.0).contains(&d.voltage_threshold) {
        warnings.push(ValidationWarning {
            field: "discharge.voltage_threshold".to_string(),
            message: format!(
                "voltage_threshold = {:.1} V is outside the typical 12-60 V DC plant range",
                d.voltage_threshold
            ),
            suggestion: None,
        });
    }

    if s.near_zero_current_band < 0.0 {
        errors.push(format!(
            "soc.near_zero_current_band = {:.2} cannot be negative",
            s.near_zero_current_band
        ));
    }

    if !(1..=defaults::MAX_FILL_LOOKBACK_HOURS).contains(&s.fill_lookback_hours) {
        errors.push(format!(
            "soc.fill_lookback_hours = {} must be in 1..={}",
            s.fill_lookback_hours,
            defaults::MAX_FILL_LOOKBACK_HOURS
        ));
    } else if step > 0 && (s.fill_lookback_hours * 60) % step != 0 {
        errors.push(format!(
            "soc.fill_lookback_hours = {} is not a whole number of {step}-minute steps",
            s.fill_lookback_hours
        ));
    }

    if d.min_discharge_samples == 0 {
        warnings.push(ValidationWarning {
            field: "discharge.min_discharge_samples".to_string(),
            message: "min_discharge_samples = 0 accepts single-sample discharges".to_string(),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("ratio", "ratio"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("treshold", "threshold"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [discharge]
            voltage_threshold = 46.2
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"discharge".to_string()));
        assert!(keys.contains(&"discharge.voltage_threshold".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[discharge]
voltage_treshold = 46.0
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("discharge.voltage_threshold")
        );
    }

    #[test]
    fn test_unparseable_toml_produces_no_warnings() {
        assert!(validate_unknown_keys("[discharge").is_empty());
    }

    #[test]
    fn test_default_config_is_clean() {
        let (errors, warnings) = validate_ranges(&AnalysisConfig::default());
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_ratio_out_of_range() {
        let mut config = AnalysisConfig::default();
        config.discharge.current_drop_ratio = 1.5;
        let (errors, _) = validate_ranges(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("current_drop_ratio"));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let mut config = AnalysisConfig::default();
        config.soc.ac_present_threshold = f64::NAN;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("ac_present_threshold")));
    }

    #[test]
    fn test_huge_values_rejected_without_overflow() {
        let mut config = AnalysisConfig::default();
        config.sampling.time_step_minutes = i64::MAX;
        config.soc.fill_lookback_hours = i64::MAX;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("time_step_minutes")));
        assert!(errors.iter().any(|e| e.contains("fill_lookback_hours")));
    }

    #[test]
    fn test_lookback_must_align_with_step() {
        let mut config = AnalysisConfig::default();
        config.sampling.time_step_minutes = 7;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("fill_lookback_hours")));
    }
}
