//! Export merged coefficient rows to CSV and JSON.
//!
//! CSV is the flat row set (one line per term and model, `quantile` empty for
//! OLS) for spreadsheets. JSON wraps the same rows with run metadata.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CoefficientRow, ModelSpec, QuantileFailure, SeMethod};
use crate::error::AppError;

/// JSON export schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub spec: ModelSpec,
    pub n_obs: usize,
    pub confidence_level: f64,
    pub se_method: SeMethod,
    pub quantiles: Vec<f64>,
    /// OLS rows first, then quantile rows in sweep order.
    pub rows: Vec<CoefficientRow>,
    pub failures: Vec<QuantileFailure>,
}

/// Write rows to a CSV file with a header line.
pub fn write_rows_csv(path: &Path, rows: &[CoefficientRow]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::Export(format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::Export(format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::Export(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write a report JSON file.
pub fn write_rows_json(path: &Path, report: &ReportFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::Export(format!("Failed to create export JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::Export(format!("Failed to write export JSON: {e}")))?;
    Ok(())
}

/// Read a report JSON file.
pub fn read_rows_json(path: &Path) -> Result<ReportFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::Export(format!("Failed to open export JSON '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file).map_err(|e| AppError::Export(format!("Invalid export JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<CoefficientRow> {
        vec![
            CoefficientRow {
                term: "(Intercept)".to_string(),
                estimate: 6.5,
                std_error: 0.1,
                statistic: 65.0,
                p_value: 0.0,
                conf_low: 6.3,
                conf_high: 6.7,
                quantile: None,
            },
            CoefficientRow {
                term: "(Intercept)".to_string(),
                estimate: 5.0,
                std_error: 0.2,
                statistic: 25.0,
                p_value: 0.0,
                conf_low: 4.6,
                conf_high: 5.4,
                quantile: Some(0.1),
            },
        ]
    }

    #[test]
    fn csv_has_header_and_blank_ols_quantile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_rows_csv(&path, &rows()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "term,estimate,std_error,statistic,p_value,conf_low,conf_high,quantile"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",6.7,"));
        assert!(lines[2].ends_with(",0.1"));
    }

    #[test]
    fn json_report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ReportFile {
            tool: "qreg".to_string(),
            generated_at: Utc::now(),
            spec: ModelSpec::new("ltotexp", &["suppins"]),
            n_obs: 2955,
            confidence_level: 0.95,
            se_method: SeMethod::Nid,
            quantiles: vec![0.1],
            rows: rows(),
            failures: vec![QuantileFailure {
                tau: 0.9,
                reason: "timed out".to_string(),
            }],
        };
        write_rows_json(&path, &report).unwrap();
        assert_eq!(read_rows_json(&path).unwrap(), report);
    }

    #[test]
    fn unwritable_path_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("rows.csv");
        assert!(matches!(
            write_rows_csv(&path, &rows()),
            Err(AppError::Export(_))
        ));
    }
}
