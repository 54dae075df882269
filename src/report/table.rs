//! Side-by-side comparison table: one row per term, one column per model.

use std::collections::{HashMap, HashSet};

use crate::domain::{CoefficientRow, ModelKind};
use crate::error::AppError;

/// Significance markers: `***` p < 0.01, `**` p < 0.05, `*` p < 0.1.
pub fn significance_stars(p_value: f64) -> &'static str {
    if p_value < 0.01 {
        "***"
    } else if p_value < 0.05 {
        "**"
    } else if p_value < 0.1 {
        "*"
    } else {
        ""
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub estimate: f64,
    pub std_error: f64,
    pub p_value: f64,
}

impl TableCell {
    fn from_row(row: &CoefficientRow) -> Self {
        Self {
            estimate: row.estimate,
            std_error: row.std_error,
            p_value: row.p_value,
        }
    }

    pub fn estimate_text(&self) -> String {
        format!("{:.4}{}", self.estimate, significance_stars(self.p_value))
    }

    pub fn std_error_text(&self) -> String {
        format!("({:.4})", self.std_error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub term: String,
    /// `cells[0]` is OLS, then one cell per quantile column.
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub headers: Vec<String>,
    pub quantiles: Vec<f64>,
    pub rows: Vec<TableRow>,
}

impl ComparisonTable {
    /// Pivot OLS rows and merged quantile rows into a term × model grid.
    ///
    /// Terms follow the OLS row order and columns follow `quantiles`. Fails
    /// with `RenderFailure` unless every term has exactly one row per tau.
    pub fn build(
        ols_rows: &[CoefficientRow],
        quantile_rows: &[CoefficientRow],
        quantiles: &[f64],
    ) -> Result<Self, AppError> {
        if ols_rows.is_empty() {
            return Err(AppError::RenderFailure("No OLS rows to tabulate.".to_string()));
        }

        let mut seen_taus: Vec<f64> = Vec::with_capacity(quantiles.len());
        for &tau in quantiles {
            if seen_taus.contains(&tau) {
                return Err(AppError::RenderFailure(format!(
                    "Quantile {tau} appears twice in the sweep."
                )));
            }
            seen_taus.push(tau);
        }

        let mut terms: Vec<&str> = Vec::with_capacity(ols_rows.len());
        let mut term_index: HashMap<&str, usize> = HashMap::new();
        for row in ols_rows {
            if row.quantile.is_some() {
                return Err(AppError::RenderFailure(format!(
                    "OLS row for '{}' carries a quantile tag.",
                    row.term
                )));
            }
            if term_index.insert(row.term.as_str(), terms.len()).is_some() {
                return Err(AppError::RenderFailure(format!(
                    "Term '{}' appears twice in the OLS rows.",
                    row.term
                )));
            }
            terms.push(row.term.as_str());
        }

        let mut grid: Vec<Vec<Option<TableCell>>> = vec![vec![None; quantiles.len()]; terms.len()];
        let mut filled: HashSet<(usize, usize)> = HashSet::new();
        for row in quantile_rows {
            let tau = row.quantile.ok_or_else(|| {
                AppError::RenderFailure(format!(
                    "Quantile row for '{}' has no quantile tag.",
                    row.term
                ))
            })?;
            let col = quantiles.iter().position(|q| *q == tau).ok_or_else(|| {
                AppError::RenderFailure(format!("Quantile {tau} is not part of the sweep."))
            })?;
            let term = *term_index.get(row.term.as_str()).ok_or_else(|| {
                AppError::RenderFailure(format!(
                    "Term '{}' at quantile {tau} is not an OLS term.",
                    row.term
                ))
            })?;
            if !filled.insert((term, col)) {
                return Err(AppError::RenderFailure(format!(
                    "Term '{}' appears more than once at quantile {tau}.",
                    row.term
                )));
            }
            grid[term][col] = Some(TableCell::from_row(row));
        }

        let mut rows = Vec::with_capacity(terms.len());
        for (t, (ols, cells)) in ols_rows.iter().zip(grid).enumerate() {
            let mut out = Vec::with_capacity(quantiles.len() + 1);
            out.push(TableCell::from_row(ols));
            for (col, cell) in cells.into_iter().enumerate() {
                let cell = cell.ok_or_else(|| {
                    AppError::RenderFailure(format!(
                        "Term '{}' is missing at quantile {}.",
                        terms[t], quantiles[col]
                    ))
                })?;
                out.push(cell);
            }
            rows.push(TableRow {
                term: terms[t].to_string(),
                cells: out,
            });
        }

        let headers = std::iter::once(ModelKind::Ols.label())
            .chain(quantiles.iter().map(|&tau| ModelKind::Quantile { tau }.label()))
            .collect();

        Ok(Self {
            headers,
            quantiles: quantiles.to_vec(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(term: &str, estimate: f64, p_value: f64, quantile: Option<f64>) -> CoefficientRow {
        CoefficientRow {
            term: term.to_string(),
            estimate,
            std_error: 0.1,
            statistic: estimate / 0.1,
            p_value,
            conf_low: estimate - 0.2,
            conf_high: estimate + 0.2,
            quantile,
        }
    }

    fn ols() -> Vec<CoefficientRow> {
        vec![row("(Intercept)", 1.0, 0.001, None), row("age", 0.5, 0.2, None)]
    }

    #[test]
    fn stars_thresholds() {
        assert_eq!(significance_stars(0.005), "***");
        assert_eq!(significance_stars(0.01), "**");
        assert_eq!(significance_stars(0.049), "**");
        assert_eq!(significance_stars(0.05), "*");
        assert_eq!(significance_stars(0.1), "");
        assert_eq!(significance_stars(f64::NAN), "");
    }

    #[test]
    fn pivots_in_sweep_order() {
        let q = vec![
            // Deliberately grouped by term rather than by tau.
            row("age", 0.6, 0.04, Some(0.9)),
            row("(Intercept)", 1.1, 0.001, Some(0.1)),
            row("age", 0.4, 0.5, Some(0.1)),
            row("(Intercept)", 1.2, 0.001, Some(0.9)),
        ];
        let table = ComparisonTable::build(&ols(), &q, &[0.1, 0.9]).unwrap();
        assert_eq!(table.headers, vec!["OLS", "QR(0.1)", "QR(0.9)"]);
        assert_eq!(table.rows[0].term, "(Intercept)");
        assert_eq!(table.rows[1].term, "age");
        let age: Vec<f64> = table.rows[1].cells.iter().map(|c| c.estimate).collect();
        assert_eq!(age, vec![0.5, 0.4, 0.6]);
        assert_eq!(table.rows[1].cells[2].estimate_text(), "0.6000**");
        assert_eq!(table.rows[1].cells[2].std_error_text(), "(0.1000)");
    }

    #[test]
    fn empty_sweep_has_only_ols_column() {
        let table = ComparisonTable::build(&ols(), &[], &[]).unwrap();
        assert_eq!(table.headers, vec!["OLS"]);
        assert!(table.rows.iter().all(|r| r.cells.len() == 1));
    }

    #[test]
    fn rejects_missing_term() {
        let q = vec![row("(Intercept)", 1.1, 0.001, Some(0.5))];
        let err = ComparisonTable::build(&ols(), &q, &[0.5]).unwrap_err();
        assert!(matches!(err, AppError::RenderFailure(m) if m.contains("missing")));
    }

    #[test]
    fn rejects_duplicate_and_unknown_rows() {
        let dup = vec![
            row("(Intercept)", 1.1, 0.001, Some(0.5)),
            row("age", 0.4, 0.5, Some(0.5)),
            row("age", 0.4, 0.5, Some(0.5)),
        ];
        assert!(ComparisonTable::build(&ols(), &dup, &[0.5]).is_err());

        let stray = vec![row("(Intercept)", 1.1, 0.001, Some(0.3))];
        assert!(ComparisonTable::build(&ols(), &stray, &[0.5]).is_err());

        let foreign = vec![row("income", 1.1, 0.001, Some(0.5))];
        assert!(ComparisonTable::build(&ols(), &foreign, &[0.5]).is_err());

        assert!(ComparisonTable::build(&[], &[], &[]).is_err());
    }
}
