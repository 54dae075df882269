//! Dataset ingest.
//!
//! Turns a `DataSource` (URL, local file, or synthetic spec) into a `Dataset`.
//! Format is sniffed from the content: Stata `.dta` by its header bytes,
//! anything else is parsed as CSV with a header row.
//!
//! CSV conventions:
//! - empty cells, `.`, `NA` and `NaN` are missing
//! - a column with any other non-numeric cell is a string column and is skipped

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::data::{Column, Dataset, DatasetFetcher, generate_expenditure_sample, looks_like_dta, parse_dta};
use crate::domain::DataSource;
use crate::error::AppError;

/// Load the dataset for a run. Must complete before any fit begins.
pub fn load_dataset(source: &DataSource, fetch_attempts: usize) -> Result<Dataset, AppError> {
    let dataset = match source {
        DataSource::Url(url) => {
            let fetcher = DatasetFetcher::new(fetch_attempts)?;
            let bytes = fetcher.fetch_bytes(url)?;
            parse_bytes(&bytes)?
        }
        DataSource::Path(path) => load_file(path)?,
        DataSource::Synthetic { rows, seed } => generate_expenditure_sample(*rows, *seed)?,
    };
    info!(
        "Loaded dataset: {} rows x {} numeric columns",
        dataset.n_rows(),
        dataset.n_columns()
    );
    Ok(dataset)
}

pub fn load_file(path: &Path) -> Result<Dataset, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::DataUnavailable(format!("Failed to read '{}': {e}", path.display()))
    })?;
    parse_bytes(&bytes)
}

/// Parse an in-memory file, sniffing `.dta` vs CSV.
pub fn parse_bytes(bytes: &[u8]) -> Result<Dataset, AppError> {
    if looks_like_dta(bytes) {
        parse_dta(bytes)
    } else {
        parse_csv(bytes)
    }
}

pub fn parse_csv(bytes: &[u8]) -> Result<Dataset, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::DataUnavailable(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::DataUnavailable("CSV has no header row.".to_string()));
    }

    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];
    let mut numeric = vec![true; headers.len()];

    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1, records are 1-based.
        let line = idx + 2;
        let record = result
            .map_err(|e| AppError::DataUnavailable(format!("CSV parse error at line {line}: {e}")))?;
        if record.len() != headers.len() {
            return Err(AppError::DataUnavailable(format!(
                "CSV line {line} has {} fields, expected {}.",
                record.len(),
                headers.len()
            )));
        }
        for (col, cell) in record.iter().enumerate() {
            if !numeric[col] {
                continue;
            }
            match parse_cell(cell) {
                Ok(v) => values[col].push(v),
                Err(()) => numeric[col] = false,
            }
        }
    }

    let mut columns = Vec::new();
    for ((name, vals), is_numeric) in headers.into_iter().zip(values).zip(numeric) {
        if is_numeric {
            columns.push(Column::new(name, vals));
        } else {
            warn!("Skipping non-numeric column '{name}'.");
        }
    }
    Dataset::new(columns)
}

fn parse_cell(cell: &str) -> Result<Option<f64>, ()> {
    match cell {
        "" | "." | "NA" | "NaN" => Ok(None),
        _ => cell
            .parse::<f64>()
            .map(|v| v.is_finite().then_some(v))
            .map_err(|_| ()),
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM;
    // left in place it would hide that column from the model spec.
    name.trim().trim_start_matches('\u{feff}').to_string()
}
