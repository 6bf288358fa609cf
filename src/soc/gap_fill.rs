//! Two-pass gap filling over a regularized grid
//!
//! Pass 1 copies the sample from the same time on the previous day. Battery
//! behaviour follows the daily load cycle, so that is the closest stand-in.
//! Pass 2 carries the last known value of each field forward over whatever
//! pass 1 could not fill. The passes must run in that order and stay
//! separate: pass 2 only sees the holes pass 1 left.

use crate::types::{RequiredField, Sample};

/// Pass 1: fill gapped grid points from `lookback_steps` points earlier.
///
/// `carried` lists the fields the device reports at all; a grid point is
/// gapped only when it misses one of those. A gapped point takes every
/// field of the earlier point, provided that point carries at least one
/// reading. Points are visited in time order, so a point filled here can in
/// turn feed a point one lookback later. Returns the number of grid points
/// filled.
pub fn fill_from_previous_day(
    grid: &mut [Sample],
    lookback_steps: usize,
    carried: &[RequiredField],
) -> usize {
    if lookback_steps == 0 || carried.is_empty() {
        return 0;
    }

    let mut filled = 0;
    for i in lookback_steps..grid.len() {
        if !grid[i].has_gap_in(carried) {
            continue;
        }
        let source = grid[i - lookback_steps];
        if carried.iter().all(|&f| source.field(f).is_none()) {
            continue;
        }
        grid[i] = Sample {
            timestamp: grid[i].timestamp,
            ..source
        };
        filled += 1;
    }
    filled
}

/// Pass 2: carry each field's last known value forward.
///
/// Fields are filled independently. Leading gaps before the first reading
/// of a field stay empty. Returns the number of field values filled.
pub fn forward_fill(grid: &mut [Sample]) -> usize {
    let mut last_current = None;
    let mut last_ac = None;
    let mut last_voltage = None;
    let mut filled = 0;

    for sample in grid.iter_mut() {
        filled += carry(&mut sample.battery_current, &mut last_current);
        filled += carry(&mut sample.ac_output_current, &mut last_ac);
        filled += carry(&mut sample.battery_voltage, &mut last_voltage);
    }
    filled
}

fn carry(slot: &mut Option<f64>, last: &mut Option<f64>) -> usize {
    match (*slot, *last) {
        (Some(v), _) => {
            *last = Some(v);
            0
        }
        (None, Some(v)) => {
            *slot = Some(v);
            1
        }
        (None, None) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn ts(step: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(5 * step)
    }

    #[test]
    fn test_previous_day_fill_copies_whole_row() {
        // lookback of 3 steps stands in for a day
        let mut grid = vec![
            Sample::new(ts(0), -4.0, 0.0, 47.0),
            Sample::new(ts(1), 1.0, 12.0, 53.0),
            Sample::new(ts(2), 1.0, 12.0, 53.0),
            Sample {
                battery_current: Some(9.0),
                ..Sample::empty(ts(3))
            },
        ];
        assert_eq!(fill_from_previous_day(&mut grid, 3, &RequiredField::ALL), 1);
        assert_eq!(grid[3], Sample::new(ts(3), -4.0, 0.0, 47.0));
    }

    #[test]
    fn test_previous_day_fill_chains_forward() {
        let mut grid = vec![
            Sample::new(ts(0), 2.0, 12.0, 53.0),
            Sample::empty(ts(1)),
            Sample::empty(ts(2)),
        ];
        assert_eq!(fill_from_previous_day(&mut grid, 1, &RequiredField::ALL), 2);
        assert_eq!(grid[2], Sample::new(ts(2), 2.0, 12.0, 53.0));
    }

    #[test]
    fn test_previous_day_fill_skips_empty_source() {
        let mut grid = vec![Sample::empty(ts(0)), Sample::empty(ts(1))];
        assert_eq!(fill_from_previous_day(&mut grid, 1, &RequiredField::ALL), 0);
        assert!(grid[1].has_gap());
    }

    #[test]
    fn test_no_fill_before_first_day() {
        let mut grid = vec![Sample::new(ts(0), 2.0, 12.0, 53.0), Sample::empty(ts(1))];
        assert_eq!(fill_from_previous_day(&mut grid, 5, &RequiredField::ALL), 0);
    }

    #[test]
    fn test_absent_column_does_not_mark_points_gapped() {
        let carried = [RequiredField::BatteryCurrent, RequiredField::AcOutputCurrent];
        let reading = |step, current| Sample {
            battery_voltage: None,
            ..Sample::new(ts(step), current, 0.0, 0.0)
        };
        let mut grid = vec![reading(0, 1.0), reading(1, 1.0), reading(2, -20.0), reading(3, -20.0)];

        assert_eq!(fill_from_previous_day(&mut grid, 2, &carried), 0);
        assert_eq!(grid[2].battery_current, Some(-20.0));
        assert_eq!(grid[3].battery_current, Some(-20.0));
    }

    #[test]
    fn test_fill_only_follows_carried_fields() {
        let carried = [RequiredField::BatteryCurrent, RequiredField::AcOutputCurrent];
        let mut grid = vec![
            Sample {
                battery_voltage: None,
                ..Sample::new(ts(0), -4.0, 0.0, 0.0)
            },
            Sample::empty(ts(1)),
        ];

        assert_eq!(fill_from_previous_day(&mut grid, 1, &carried), 1);
        assert_eq!(grid[1].battery_current, Some(-4.0));
        assert_eq!(grid[1].battery_voltage, None);
    }

    #[test]
    fn test_forward_fill_per_field() {
        let mut grid = vec![
            Sample {
                battery_current: Some(1.0),
                ..Sample::empty(ts(0))
            },
            Sample {
                ac_output_current: Some(12.0),
                ..Sample::empty(ts(1))
            },
            Sample::empty(ts(2)),
        ];
        assert_eq!(forward_fill(&mut grid), 3);

        assert_eq!(grid[0].ac_output_current, None);
        assert_eq!(grid[1].battery_current, Some(1.0));
        assert_eq!(grid[2].battery_current, Some(1.0));
        assert_eq!(grid[2].ac_output_current, Some(12.0));
        assert_eq!(grid[2].battery_voltage, None);
    }
}
