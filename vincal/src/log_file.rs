//! CSV logs for calibration and evaluation runs.
//!
//! Each row is written through a freshly opened append handle and flushed
//! before returning, so an interrupted session never loses a logged sample.

use crate::board::BoardId;
use crate::collect::EvaluationRecord;
use crate::error::Result;
use crate::fit::{Fit, Sample};
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Header row of the calibration log.
pub const CALIBRATION_HEADER: [&str; 2] = ["Measured VIN", "Actual VIN"];

/// Header row of the evaluation log.
pub const EVALUATION_HEADER: [&str; 6] = [
    "Raw ADC",
    "ESP ADC Cal Raw Voltage",
    "Calculated VIN",
    "Calibrated VIN",
    "Actual Input",
    "Difference",
];

/// Label of the trailing coefficient row.
pub const COEFFICIENTS_LABEL: &str = "Cubic Fit Coefficients:";

/// `<dir>/<prefix>_calib-<board>.csv`
pub fn calibration_path(dir: impl AsRef<Path>, prefix: &str, board: &BoardId) -> PathBuf {
    dir.as_ref()
        .join(format!("{prefix}_calib-{board}.csv"))
}

/// `<dir>/<prefix>_eval-<board>.csv`
pub fn evaluation_path(dir: impl AsRef<Path>, prefix: &str, board: &BoardId) -> PathBuf {
    dir.as_ref()
        .join(format!("{prefix}_eval-{board}.csv"))
}

/// Truncate `path` and write a header row.
fn create_with_header(path: &Path, header: &[&str]) -> Result<()> {
    if let Some(parent) = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    writer.flush()?;
    debug!("Created {}", path.display());
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?)
}

/// Write one record to the end of `path` and flush it.
fn append_record<I, T>(path: &Path, record: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(open_append(path)?);
    writer.write_record(record)?;
    writer.flush()?;
    Ok(())
}

/// Calibration log: one `(measured, actual)` row per sample.
#[derive(Debug, Clone)]
pub struct CalibrationLog {
    path: PathBuf,
}

impl CalibrationLog {
    /// Create (or truncate) the log and write its header.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        create_with_header(&path, &CALIBRATION_HEADER)?;
        Ok(Self { path })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one sample.
    pub fn append(&self, sample: &Sample) -> Result<()> {
        append_record(
            &self.path,
            [sample.measured.to_string(), sample.actual.to_string()],
        )
    }

    /// Append a blank line and the labelled coefficient row.
    pub fn append_coefficients(&self, fit: &Fit) -> Result<()> {
        let mut file = open_append(&self.path)?;
        file.write_all(b"\n")?;
        file.flush()?;
        drop(file);

        let mut record = vec![COEFFICIENTS_LABEL.to_string()];
        record.extend(
            fit.coefficients()
                .iter()
                .map(f64::to_string),
        );
        append_record(&self.path, record)
    }
}

/// Evaluation log: the full reading plus the operator's reference value.
#[derive(Debug, Clone)]
pub struct EvaluationLog {
    path: PathBuf,
}

impl EvaluationLog {
    /// Create (or truncate) the log and write its header.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        create_with_header(&path, &EVALUATION_HEADER)?;
        Ok(Self { path })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one evaluation record.
    pub fn append(&self, record: &EvaluationRecord) -> Result<()> {
        let reading = &record.reading;
        append_record(
            &self.path,
            [
                reading
                    .raw_adc
                    .to_string(),
                reading
                    .esp_voltage
                    .to_string(),
                reading
                    .calculated_vin
                    .to_string(),
                reading
                    .calibrated_vin
                    .to_string(),
                record
                    .actual
                    .to_string(),
                record
                    .difference
                    .to_string(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Reading;

    fn board() -> BoardId {
        BoardId::parse("0042").unwrap()
    }

    #[test]
    fn test_log_paths_encode_board() {
        let board = board();
        assert_eq!(
            calibration_path("tests", "sarq", &board),
            Path::new("tests").join("sarq_calib-0042.csv")
        );
        assert_eq!(
            evaluation_path("tests", "sarq", &board),
            Path::new("tests").join("sarq_eval-0042.csv")
        );
    }

    #[test]
    fn test_calibration_log_rows_and_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let log = CalibrationLog::create(dir.path().join("nested").join("calib.csv")).unwrap();

        log.append(&Sample {
            measured: 1.5,
            actual: 1.55,
        })
        .unwrap();
        log.append(&Sample {
            measured: 12.0,
            actual: 12.1,
        })
        .unwrap();
        log.append_coefficients(&Fit::from_coefficients([0.5, -0.25, 1.0, 0.0]))
            .unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content,
            "Measured VIN,Actual VIN\n1.5,1.55\n12,12.1\n\nCubic Fit Coefficients:,0.5,-0.25,1,0\n"
        );
    }

    #[test]
    fn test_rows_are_visible_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let log = CalibrationLog::create(dir.path().join("calib.csv")).unwrap();
        log.append(&Sample {
            measured: 3.3,
            actual: 3.31,
        })
        .unwrap();

        // No handle is held between writes; a second reader sees the row now.
        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.ends_with("3.3,3.31\n"));
    }

    #[test]
    fn test_create_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calib.csv");
        fs::write(&path, "stale\n").unwrap();

        CalibrationLog::create(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Measured VIN,Actual VIN\n");
    }

    #[test]
    fn test_evaluation_log_row() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvaluationLog::create(dir.path().join("eval.csv")).unwrap();

        log.append(&EvaluationRecord {
            reading: Reading {
                raw_adc: 2048,
                esp_voltage: 1.642,
                calculated_vin: 12.315,
                calibrated_vin: 12.2987,
            },
            actual: 12.3,
            difference: 0.0013,
        })
        .unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("Raw ADC,ESP ADC Cal Raw Voltage,Calculated VIN,Calibrated VIN,Actual Input,Difference")
        );
        assert_eq!(lines.next(), Some("2048,1.642,12.315,12.2987,12.3,0.0013"));
        assert_eq!(lines.next(), None);
    }
}
