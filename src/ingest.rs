//! Site telemetry CSV ingestion
//!
//! Each site exports one CSV file per device, named after the device
//! (`btsA.csv` holds device `btsA`). The first column is the timestamp
//! index unless a column is explicitly named `timestamp`. Measurement
//! columns are matched by case-insensitive prefix, so unit suffixes such as
//! `Battery Current(A)` or `Battery Current (A)` both resolve.
//!
//! Rows are sorted by time and de-duplicated on timestamp, keeping the first
//! occurrence. Rows whose timestamp cannot be parsed are counted and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::batch::Fleet;
use crate::types::{DeviceSeries, Sample};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error reading {}: {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("{}: file has no header row", .0.display())]
    MissingHeader(PathBuf),

    #[error("{}: cannot derive a device id from the file name", .0.display())]
    NoDeviceId(PathBuf),
}

/// Row accounting for one ingested file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Data rows read (excluding header and blank lines)
    pub rows: usize,
    /// Rows kept after de-duplication
    pub inserted: usize,
    /// Rows dropped because their timestamp was already present
    pub duplicates: usize,
    /// Rows dropped because their timestamp could not be parsed
    pub parse_errors: usize,
}

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

// ============================================================================
// Column Mapping
// ============================================================================

/// Column indices resolved from the header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: usize,
    pub battery_current: Option<usize>,
    pub ac_output_current: Option<usize>,
    pub battery_voltage: Option<usize>,
}

impl ColumnMap {
    pub fn from_header(header: &str) -> Self {
        let mut map = Self::default();

        for (idx, col) in csv_split(header).iter().enumerate() {
            let col = col.trim().trim_start_matches('\u{feff}').to_lowercase();

            if matches!(col.as_str(), "timestamp" | "datetime" | "time") {
                map.timestamp = idx;
            } else if col.starts_with("battery current") && map.battery_current.is_none() {
                map.battery_current = Some(idx);
            } else if col.starts_with("ac/dc system output current")
                && map.ac_output_current.is_none()
            {
                map.ac_output_current = Some(idx);
            } else if col.starts_with("battery voltage") && map.battery_voltage.is_none() {
                map.battery_voltage = Some(idx);
            }
        }
        map
    }
}

// ============================================================================
// Value Parsing
// ============================================================================

/// Parse a timestamp cell.
///
/// Accepts ISO-8601 with or without offset (offsets are dropped, keeping the
/// wall-clock time), `YYYY-MM-DD HH:MM[:SS[.f]]`, and integer epoch seconds.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');
    if s.is_empty() {
        return None;
    }

    if let Ok(epoch) = s.parse::<i64>() {
        return DateTime::from_timestamp(epoch, 0).map(|dt| dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_local());
    }

    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%d/%m/%Y %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parse a numeric cell; blanks, `NaN`-likes and non-finite values are missing.
fn parse_value(fields: &[String], idx: Option<usize>) -> Option<f64> {
    let raw = fields.get(idx?)?.trim();
    if raw.is_empty()
        || raw.eq_ignore_ascii_case("nan")
        || raw.eq_ignore_ascii_case("null")
        || raw.eq_ignore_ascii_case("na")
    {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// Loading
// ============================================================================

/// Parse one device's CSV from any buffered reader.
pub fn parse_csv(
    device_id: &str,
    reader: impl BufRead,
    source: &Path,
) -> Result<(DeviceSeries, IngestStats), IngestError> {
    let mut lines = reader.lines();
    let header = loop {
        match lines.next() {
            Some(Ok(line)) if line.trim().is_empty() => continue,
            Some(Ok(line)) => break line,
            Some(Err(e)) => return Err(IngestError::Io(source.to_path_buf(), e)),
            None => return Err(IngestError::MissingHeader(source.to_path_buf())),
        }
    };
    let columns = ColumnMap::from_header(&header);
    debug!(device = %device_id, ?columns, "Resolved CSV columns");

    let mut stats = IngestStats::default();
    let mut samples = Vec::new();

    for line in lines {
        let line = line.map_err(|e| IngestError::Io(source.to_path_buf(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        stats.rows += 1;

        let fields = csv_split(&line);
        let Some(timestamp) = fields.get(columns.timestamp).and_then(|f| parse_timestamp(f))
        else {
            stats.parse_errors += 1;
            continue;
        };

        samples.push(Sample {
            timestamp,
            battery_current: parse_value(&fields, columns.battery_current),
            ac_output_current: parse_value(&fields, columns.ac_output_current),
            battery_voltage: parse_value(&fields, columns.battery_voltage),
        });
    }

    let parsed = samples.len();
    let mut series = DeviceSeries::new(device_id, samples);
    series.samples.dedup_by_key(|s| s.timestamp);
    stats.inserted = series.len();
    stats.duplicates = parsed - stats.inserted;

    Ok((series, stats))
}

/// Device id for a telemetry file: its file stem.
pub fn device_id_for(path: &Path) -> Option<String> {
    let id = path.file_stem()?.to_str()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Load a single device file.
pub fn load_file(path: &Path) -> Result<(DeviceSeries, IngestStats), IngestError> {
    let device_id =
        device_id_for(path).ok_or_else(|| IngestError::NoDeviceId(path.to_path_buf()))?;
    let file = File::open(path).map_err(|e| IngestError::Io(path.to_path_buf(), e))?;
    parse_csv(&device_id, BufReader::new(file), path)
}

/// Load every `*.csv` file in a directory into a fleet.
///
/// A file that fails to load is logged and skipped; only an unreadable
/// directory is an error.
pub fn load_directory(dir: &Path) -> Result<Fleet, IngestError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::Io(dir.to_path_buf(), e))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    let mut fleet = Fleet::new();
    for path in paths {
        match load_file(&path) {
            Ok((series, stats)) => {
                info!(
                    file = %path.display(),
                    device = %series.device_id,
                    inserted = stats.inserted,
                    skipped = stats.duplicates,
                    parse_errors = stats.parse_errors,
                    "Loaded device telemetry"
                );
                if fleet.contains_key(&series.device_id) {
                    warn!(device = %series.device_id, "Duplicate device file, keeping the first");
                    continue;
                }
                fleet.insert(series.device_id.clone(), series);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable telemetry file"),
        }
    }

    info!(dir = %dir.display(), devices = fleet.len(), "Telemetry import complete");
    Ok(fleet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    const HEADER: &str = ",Battery Current(A),AC/DC System Output Current(A),Battery Voltage(V)";

    fn parse(text: &str) -> (DeviceSeries, IngestStats) {
        parse_csv("btsA", Cursor::new(text.to_string()), Path::new("btsA.csv")).unwrap()
    }

    #[test]
    fn test_csv_split_quotes() {
        assert_eq!(csv_split(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
        assert_eq!(csv_split(r#""say ""hi""",2"#), vec![r#"say "hi""#, "2"]);
    }

    #[test]
    fn test_column_map_by_prefix() {
        let map = ColumnMap::from_header(HEADER);
        assert_eq!(map.timestamp, 0);
        assert_eq!(map.battery_current, Some(1));
        assert_eq!(map.ac_output_current, Some(2));
        assert_eq!(map.battery_voltage, Some(3));
    }

    #[test]
    fn test_named_timestamp_column() {
        let map = ColumnMap::from_header("bts_id,Battery Voltage (V),timestamp");
        assert_eq!(map.timestamp, 2);
        assert_eq!(map.battery_voltage, Some(1));
        assert_eq!(map.battery_current, None);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(10, 5, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2023-05-01 10:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-01T10:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-01T10:05:00+03:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-05-01 10:05"), Some(expected));
        assert_eq!(parse_timestamp("1682935500"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_parse_rows_with_gaps_and_duplicates() {
        let text = format!(
            "{HEADER}\n\
             2023-05-01 00:05:00,-3.5,0,47.1\n\
             2023-05-01 00:00:00,1.0,12.5,53.0\n\
             2023-05-01 00:05:00,9.9,9.9,9.9\n\
             2023-05-01 00:10:00,,NaN,52.0\n\
             not-a-time,1,1,1\n"
        );
        let (series, stats) = parse(&text);

        assert_eq!(stats.rows, 5);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.inserted, 3);

        assert_eq!(series.samples[0].battery_current, Some(1.0));
        assert_eq!(series.samples[1].battery_current, Some(-3.5));
        assert_eq!(series.samples[2].battery_current, None);
        assert_eq!(series.samples[2].ac_output_current, None);
        assert_eq!(series.samples[2].battery_voltage, Some(52.0));
    }

    #[test]
    fn test_empty_file_has_no_header() {
        let err = parse_csv("btsA", Cursor::new(String::new()), Path::new("btsA.csv")).unwrap_err();
        assert!(matches!(err, IngestError::MissingHeader(_)));
    }

    #[test]
    fn test_device_id_from_file_name() {
        assert_eq!(device_id_for(Path::new("/data/btsA.csv")).as_deref(), Some("btsA"));
        assert_eq!(device_id_for(Path::new("site7.export.csv")).as_deref(), Some("site7.export"));
    }
}
