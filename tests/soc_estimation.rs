//! SoC estimation integration tests
//!
//! Property checks over multi-day synthetic series with outages, charging
//! and gaps.

use bts_analytics::config::SocConfig;
use bts_analytics::soc::mains_carrying_load;
use bts_analytics::{AnalysisConfig, DeviceSeries, Sample, SocEstimator, SocSample};
use chrono::{Duration, NaiveDate, NaiveDateTime};

const STEPS_PER_DAY: i64 = 288;

fn ts(step: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(5 * step)
}

/// Two days: float, a 3h outage each afternoon, recharge, float again.
fn site_sample(step: i64) -> Sample {
    let in_day = step % STEPS_PER_DAY;
    match in_day {
        // outage 15:00-18:00
        180..=215 => Sample::new(ts(step), -22.0, 0.0, 51.0 - 0.15 * (in_day - 180) as f64),
        // recharge, returns more than the outage drew
        216..=251 => Sample::new(ts(step), 25.0, 47.0, 54.5),
        // float with a little ripple inside the idle band
        _ => Sample::new(ts(step), if step % 2 == 0 { 0.4 } else { -0.4 }, 22.0, 53.5),
    }
}

fn site_series(days: i64) -> DeviceSeries {
    DeviceSeries::new("btsA", (0..days * STEPS_PER_DAY).map(site_sample).collect())
}

fn estimate(series: &DeviceSeries) -> Vec<SocSample> {
    SocEstimator::new(&AnalysisConfig::default())
        .estimate(series)
        .unwrap()
}

#[test]
fn first_value_is_zero() {
    let out = estimate(&site_series(1));
    assert_eq!(out[0].soc, 0.0);
}

#[test]
fn mains_present_always_resets() {
    let config = SocConfig::default();
    let out = estimate(&site_series(2));

    for s in &out {
        if mains_carrying_load(&s.sample(), &config) {
            assert_eq!(s.soc, 0.0, "at {}", s.timestamp);
        }
    }
}

#[test]
fn negative_balance_lasts_at_most_one_step() {
    let out = estimate(&site_series(2));

    assert!(out.iter().any(|s| s.soc < 0.0), "recharge should overshoot");
    for pair in out.windows(2) {
        if pair[0].soc < 0.0 {
            assert_eq!(pair[1].soc, 0.0, "at {}", pair[1].timestamp);
        }
    }
}

#[test]
fn outage_depletes_charge() {
    let out = estimate(&site_series(1));
    // 36 steps at 22 A, first step integrates from zero
    let expected = 36.0 * 22.0 * 5.0 / 60.0;
    assert!((out[215].soc - expected).abs() < 1e-9, "{}", out[215].soc);
    assert!(out[179].soc.abs() < 1e-9);
}

#[test]
fn regular_series_round_trips() {
    let series = site_series(1);
    let out = estimate(&series);

    assert_eq!(out.len(), series.len());
    let stripped: Vec<Sample> = out.iter().map(SocSample::sample).collect();
    assert_eq!(stripped, series.samples);
}

#[test]
fn gaps_are_filled_from_the_day_before() {
    let mut samples: Vec<Sample> = (0..2 * STEPS_PER_DAY).map(site_sample).collect();
    // Day 2 loses the middle of its outage
    samples.retain(|s| !(ts(STEPS_PER_DAY + 190)..=ts(STEPS_PER_DAY + 200)).contains(&s.timestamp));
    let series = DeviceSeries::new("btsA", samples);

    let out = estimate(&series);
    assert_eq!(out.len() as i64, 2 * STEPS_PER_DAY);

    for step in 190..=200 {
        let filled = out[(STEPS_PER_DAY + step) as usize].sample();
        let yesterday = site_sample(step);
        assert_eq!(filled.timestamp, ts(STEPS_PER_DAY + step));
        assert_eq!(filled.battery_current, yesterday.battery_current);
        assert_eq!(filled.battery_voltage, yesterday.battery_voltage);
    }
}

#[test]
fn output_grid_is_regular_and_gap_free() {
    let mut samples: Vec<Sample> = (0..STEPS_PER_DAY).map(site_sample).collect();
    samples.retain(|s| s.timestamp != ts(10) && s.timestamp != ts(11));
    samples[3].battery_voltage = None;
    let out = estimate(&DeviceSeries::new("btsA", samples));

    assert_eq!(out.len() as i64, STEPS_PER_DAY);
    for pair in out.windows(2) {
        assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(5));
    }
    assert!(out.iter().all(|s| !s.sample().has_gap()));
    // forward filled from step 9
    assert_eq!(out[10].battery_current, out[9].battery_current);
}
