//! Result writers
//!
//! - `all_discharges.json`: `{ "<device>": [[start, end], ...] }`, pretty-printed
//! - `<device>_soc.csv`: regularized series with the `soc` column appended

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::batch::{DischargeReport, SocReport};
use crate::types::SocSample;

/// File name of the fleet discharge summary.
pub const DISCHARGES_FILE: &str = "all_discharges.json";

/// CSV header of the per-device SoC export.
pub const SOC_CSV_HEADER: &str =
    "timestamp,battery_current,ac_output_current,battery_voltage,soc";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {}: {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

fn ensure_dir(dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|e| ExportError::Io(dir.to_path_buf(), e))
}

/// Write the discharge summary. Returns the path written.
pub fn write_discharges_json(report: &DischargeReport, dir: &Path) -> Result<PathBuf, ExportError> {
    ensure_dir(dir)?;
    let path = dir.join(DISCHARGES_FILE);

    let json = serde_json::to_string_pretty(&report.windows)?;
    fs::write(&path, json).map_err(|e| ExportError::Io(path.clone(), e))?;

    info!(
        path = %path.display(),
        devices = report.windows.len(),
        windows = report.total_windows(),
        "Discharge summary written"
    );
    Ok(path)
}

/// Path of a device's SoC export inside `dir`.
pub fn soc_csv_path(dir: &Path, device_id: &str) -> PathBuf {
    dir.join(format!("{device_id}_soc.csv"))
}

/// Write one SoC series as CSV.
pub fn write_soc_csv(series: &[SocSample], path: &Path) -> Result<(), ExportError> {
    let io_err = |e| ExportError::Io(path.to_path_buf(), e);

    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    writeln!(writer, "{SOC_CSV_HEADER}").map_err(io_err)?;

    for s in series {
        writeln!(
            writer,
            "{},{},{},{},{}",
            s.timestamp.format(TIMESTAMP_FORMAT),
            cell(s.battery_current),
            cell(s.ac_output_current),
            cell(s.battery_voltage),
            s.soc
        )
        .map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Write every device's SoC series. Returns the paths written.
pub fn write_soc_csvs(report: &SocReport, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    ensure_dir(dir)?;

    let mut written = Vec::with_capacity(report.series.len());
    for (device_id, series) in &report.series {
        let path = soc_csv_path(dir, device_id);
        write_soc_csv(series, &path)?;
        info!(device = %device_id, path = %path.display(), rows = series.len(), "SoC series written");
        written.push(path);
    }
    Ok(written)
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
