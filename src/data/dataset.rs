//! Columnar in-memory dataset.
//!
//! Values are nullable `f64`; `None` is a missing value and is never conflated
//! with `0.0`. The dataset is read-only once built and shared by every fit.

use std::collections::HashMap;

use crate::error::AppError;

/// A named numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// Descriptive statistics for one variable (non-missing values only).
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSummary {
    pub name: String,
    pub n: usize,
    pub missing: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset, checking that names are unique and lengths agree.
    pub fn new(columns: Vec<Column>) -> Result<Self, AppError> {
        let n_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            if col.values.len() != n_rows {
                return Err(AppError::DataUnavailable(format!(
                    "Column '{}' has {} rows, expected {n_rows}.",
                    col.name,
                    col.values.len()
                )));
            }
            if index.insert(col.name.clone(), i).is_some() {
                return Err(AppError::DataUnavailable(format!(
                    "Duplicate column name '{}'.",
                    col.name
                )));
            }
        }
        Ok(Self {
            columns,
            index,
            n_rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name).and_then(|c| c.values.get(row).copied().flatten())
    }

    pub fn summary(&self) -> Vec<VariableSummary> {
        self.columns.iter().map(summarize).collect()
    }
}

fn summarize(col: &Column) -> VariableSummary {
    let present: Vec<f64> = col.values.iter().filter_map(|v| *v).collect();
    let n = present.len();
    let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for &v in &present {
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    let mean = if n > 0 { sum / n as f64 } else { f64::NAN };
    if n == 0 {
        min = f64::NAN;
        max = f64::NAN;
    }
    VariableSummary {
        name: col.name.clone(),
        n,
        missing: col.values.len() - n,
        mean,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new("y", vec![Some(1.0), None, Some(3.0)]),
            Column::new("x", vec![Some(0.0), Some(1.0), Some(2.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn missing_is_distinct_from_zero() {
        let ds = sample();
        assert_eq!(ds.value(0, "x"), Some(0.0));
        assert_eq!(ds.value(1, "y"), None);
        assert_eq!(ds.column("y").unwrap().missing(), 1);
        assert_eq!(ds.column("x").unwrap().missing(), 0);
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::new(vec![
            Column::new("a", vec![Some(1.0)]),
            Column::new("b", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Dataset::new(vec![
            Column::new("a", vec![Some(1.0)]),
            Column::new("a", vec![Some(2.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[test]
    fn summary_skips_missing() {
        let ds = sample();
        let s = &ds.summary()[0];
        assert_eq!(s.n, 2);
        assert_eq!(s.missing, 1);
        assert!((s.mean - 2.0).abs() < 1e-12);
        assert_eq!((s.min, s.max), (1.0, 3.0));
    }
}
