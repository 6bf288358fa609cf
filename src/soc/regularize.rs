//! Fixed-step time grid
//!
//! Grid points are aligned to whole multiples of the step since the Unix
//! epoch (00:00, 00:05, ... for a 5-minute step) and run from the first
//! sample's aligned time to the last sample. A grid point takes the values
//! of the sample stamped exactly on it; every other grid point is empty.

use chrono::{DateTime, Duration, NaiveDateTime};

use crate::types::Sample;

/// Round `ts` down to the nearest multiple of `step`.
pub fn align_down(ts: NaiveDateTime, step: Duration) -> NaiveDateTime {
    let step_secs = step.num_seconds();
    if step_secs <= 0 {
        return ts;
    }
    let secs = ts.and_utc().timestamp();
    let aligned = secs - secs.rem_euclid(step_secs);
    DateTime::from_timestamp(aligned, 0).map_or(ts, |dt| dt.naive_utc())
}

/// Resample time-ordered samples onto a fixed-step grid.
///
/// Off-grid samples are dropped. When several samples share a grid
/// timestamp the first one wins.
pub fn regularize(samples: &[Sample], step: Duration) -> Vec<Sample> {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Vec::new();
    };
    if step <= Duration::zero() {
        return samples.to_vec();
    }

    let mut grid = Vec::new();
    let mut cursor = 0;
    let mut t = align_down(first.timestamp, step);

    while t <= last.timestamp {
        while cursor < samples.len() && samples[cursor].timestamp < t {
            cursor += 1;
        }
        let point = match samples.get(cursor) {
            Some(s) if s.timestamp == t => Sample { timestamp: t, ..*s },
            _ => Sample::empty(t),
        };
        grid.push(point);
        t += step;
    }

    grid
}
