//! Sign-change discharge detection
//!
//! Each sample's battery current is classified as discharging (-1) or not
//! (+1). A transition index `t` marks the last sample before the class
//! flips, so `t + 1` is the first sample of the new run. Consecutive
//! transitions `(t_i, t_{i+1})` bound a run of `t_{i+1} - t_i` samples.

use chrono::Duration;
use tracing::debug;

use super::trimming::trim_candidate;
use crate::config::{AnalysisConfig, DischargeConfig};
use crate::error::AnalysisError;
use crate::types::{DeviceSeries, DischargeCandidate, DischargeWindow, RequiredField};

/// Fields a series must carry to be segmented.
pub const SEGMENTER_FIELDS: [RequiredField; 2] =
    [RequiredField::BatteryCurrent, RequiredField::AcOutputCurrent];

/// Discharge detector bound to one set of thresholds.
#[derive(Debug, Clone)]
pub struct DischargeSegmenter {
    config: DischargeConfig,
    time_step: Duration,
}

impl DischargeSegmenter {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.discharge.clone(),
            time_step: config.time_step(),
        }
    }

    /// Detect, rank and trim discharges for one device.
    ///
    /// Returns windows ordered by raw candidate length, longest first.
    /// Candidates that fail validation are dropped silently (logged at debug);
    /// only device-level problems are returned as errors.
    pub fn segment(&self, series: &DeviceSeries) -> Result<Vec<DischargeWindow>, AnalysisError> {
        let candidates = self.candidates(series)?;

        let windows: Vec<DischargeWindow> = candidates
            .iter()
            .filter_map(|candidate| {
                match trim_candidate(series, candidate, &self.config, self.time_step) {
                    Ok(window) => Some(window),
                    Err(e) => {
                        debug!(
                            device = %series.device_id,
                            start = %candidate.start,
                            length = candidate.length,
                            reason = %e,
                            "Discharge candidate rejected"
                        );
                        None
                    }
                }
            })
            .collect();

        debug!(
            device = %series.device_id,
            candidates = candidates.len(),
            windows = windows.len(),
            "Discharge segmentation complete"
        );
        Ok(windows)
    }

    /// Raw, ranked candidates before trimming.
    pub fn candidates(
        &self,
        series: &DeviceSeries,
    ) -> Result<Vec<DischargeCandidate>, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        if let Some(field) = series.first_missing_field(&SEGMENTER_FIELDS) {
            return Err(AnalysisError::MissingField { field });
        }

        let indicators = classify_currents(series);
        let transitions = find_transitions(&indicators);
        if transitions.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                transitions: transitions.len(),
            });
        }

        let mut candidates = extract_candidates(series, &transitions, &self.config);
        rank_candidates(&mut candidates);
        Ok(candidates)
    }
}

/// Map each sample to +1 (charging / idle) or -1 (discharging).
///
/// Zero current is idle. A missing reading is treated as not discharging.
pub fn classify_currents(series: &DeviceSeries) -> Vec<i8> {
    series
        .samples
        .iter()
        .map(|s| match s.battery_current {
            Some(current) if current < 0.0 => -1,
            _ => 1,
        })
        .collect()
}

/// Indices `t` where `indicators[t] != indicators[t + 1]`.
pub fn find_transitions(indicators: &[i8]) -> Vec<usize> {
    indicators
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] != pair[1])
        .map(|(i, _)| i)
        .collect()
}

/// Pair consecutive transitions into qualifying discharge candidates.
///
/// A pair `(t_i, t_{i+1})` qualifies when the run it opens is discharging,
/// the rectifier is not carrying the load at onset, and the run is longer
/// than `min_discharge_samples`. The final transition has no partner, so a
/// discharge still running at the end of the series is never reported.
pub fn extract_candidates(
    series: &DeviceSeries,
    transitions: &[usize],
    config: &DischargeConfig,
) -> Vec<DischargeCandidate> {
    let samples = &series.samples;

    transitions
        .windows(2)
        .filter_map(|pair| {
            let (t_start, t_end) = (pair[0], pair[1]);
            let first = samples.get(t_start + 1)?;
            let after = samples.get(t_end + 1)?;
            let length = t_end - t_start;

            let discharging = first.battery_current.is_some_and(|c| c < 0.0);
            let mains_off = first
                .ac_output_current
                .is_some_and(|a| a <= config.ac_discharge_max_current);

            (discharging && mains_off && length > config.min_discharge_samples).then_some(
                DischargeCandidate {
                    start_index: t_start + 1,
                    end_index: t_end + 1,
                    length,
                    start: first.timestamp,
                    end: after.timestamp,
                },
            )
        })
        .collect()
}

/// Longest first; ties keep discovery order (stable sort).
pub fn rank_candidates(candidates: &mut [DischargeCandidate]) {
    candidates.sort_by(|a, b| b.length.cmp(&a.length));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(step: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(5 * step)
    }

    fn series_from(currents: &[f64], ac: f64, voltage: f64) -> DeviceSeries {
        let samples = currents
            .iter()
            .enumerate()
            .map(|(i, &c)| Sample::new(ts(i as i64), c, ac, voltage))
            .collect();
        DeviceSeries::new("btsA", samples)
    }

    #[test]
    fn test_zero_current_is_not_discharging() {
        let series = series_from(&[1.0, 0.0, -0.5, -3.0], 0.0, 50.0);
        assert_eq!(classify_currents(&series), vec![1, 1, -1, -1]);
    }

    #[test]
    fn test_transition_indices() {
        assert_eq!(find_transitions(&[1, 1, -1, -1, 1]), vec![1, 3]);
        assert!(find_transitions(&[1, 1, 1]).is_empty());
        assert!(find_transitions(&[]).is_empty());
    }

    #[test]
    fn test_candidate_bounds_and_length() {
        let mut currents = vec![2.0];
        currents.extend(std::iter::repeat(-2.0).take(8));
        currents.push(2.0);
        let series = series_from(&currents, 0.0, 45.0);

        let transitions = find_transitions(&classify_currents(&series));
        assert_eq!(transitions, vec![0, 8]);

        let candidates = extract_candidates(&series, &transitions, &DischargeConfig::default());
        assert_eq!(candidates.len(), 1);
        let c = candidates[0];
        assert_eq!((c.start_index, c.end_index, c.length), (1, 9, 8));
        assert_eq!(c.start, ts(1));
        assert_eq!(c.end, ts(9));
    }

    #[test]
    fn test_short_discharge_rejected() {
        // Exactly 6 samples is not enough; must be strictly more
        let currents = [2.0, -2.0, -2.0, -2.0, -2.0, -2.0, -2.0, 2.0];
        let series = series_from(&currents, 0.0, 45.0);
        let transitions = find_transitions(&classify_currents(&series));
        assert!(extract_candidates(&series, &transitions, &DischargeConfig::default()).is_empty());
    }

    #[test]
    fn test_mains_assisted_dip_rejected() {
        let mut currents = vec![2.0];
        currents.extend(std::iter::repeat(-2.0).take(10));
        currents.push(2.0);
        let series = series_from(&currents, 20.0, 45.0);
        let transitions = find_transitions(&classify_currents(&series));
        assert!(extract_candidates(&series, &transitions, &DischargeConfig::default()).is_empty());
    }

    #[test]
    fn test_charging_run_is_not_a_candidate() {
        // -, + x10, - : the run between transitions is charging
        let mut currents = vec![-1.0];
        currents.extend(std::iter::repeat(3.0).take(10));
        currents.push(-1.0);
        let series = series_from(&currents, 0.0, 45.0);
        let transitions = find_transitions(&classify_currents(&series));
        assert_eq!(transitions.len(), 2);
        assert!(extract_candidates(&series, &transitions, &DischargeConfig::default()).is_empty());
    }

    #[test]
    fn test_ranking_is_stable_and_descending() {
        let make = |start_index: usize, length: usize| DischargeCandidate {
            start_index,
            end_index: start_index + length,
            length,
            start: ts(start_index as i64),
            end: ts((start_index + length) as i64),
        };
        let mut candidates = vec![make(0, 8), make(20, 12), make(40, 8), make(60, 15)];
        rank_candidates(&mut candidates);
        let order: Vec<_> = candidates.iter().map(|c| c.start_index).collect();
        assert_eq!(order, vec![60, 20, 0, 40]);
    }

    #[test]
    fn test_unterminated_discharge_dropped() {
        let mut currents = vec![2.0];
        currents.extend(std::iter::repeat(-2.0).take(12));
        let series = series_from(&currents, 0.0, 45.0);
        let segmenter = DischargeSegmenter::new(&AnalysisConfig::default());
        assert_eq!(
            segmenter.segment(&series),
            Err(AnalysisError::InsufficientData { transitions: 1 })
        );
    }

    #[test]
    fn test_empty_series_is_empty_input() {
        let segmenter = DischargeSegmenter::new(&AnalysisConfig::default());
        assert_eq!(
            segmenter.segment(&DeviceSeries::new("btsA", Vec::new())),
            Err(AnalysisError::EmptyInput)
        );
    }

    #[test]
    fn test_missing_ac_column() {
        let mut series = series_from(&[2.0, -2.0, 2.0], 0.0, 45.0);
        for s in &mut series.samples {
            s.ac_output_current = None;
        }
        let segmenter = DischargeSegmenter::new(&AnalysisConfig::default());
        assert_eq!(
            segmenter.segment(&series),
            Err(AnalysisError::MissingField {
                field: RequiredField::AcOutputCurrent
            })
        );
    }
}
