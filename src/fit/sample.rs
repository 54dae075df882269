//! Estimation sample: the one row-filtering pass shared by every fit.
//!
//! OLS and each quantile fit borrow the same `EstimationSample`, so they are
//! estimated on exactly the same rows. Any row with a missing or non-finite
//! value in a referenced variable is dropped (listwise deletion).

use std::collections::HashSet;

use log::info;
use nalgebra::{DMatrix, DVector};

use crate::data::Dataset;
use crate::domain::ModelSpec;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationSample {
    /// Term names, one per column of `x`.
    pub terms: Vec<String>,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    /// Dataset row indices retained, in dataset order.
    pub rows: Vec<usize>,
    pub dropped: usize,
}

impl EstimationSample {
    /// Validate `spec` against `dataset` and build the design matrix.
    pub fn build(dataset: &Dataset, spec: &ModelSpec) -> Result<Self, AppError> {
        validate_spec(dataset, spec)?;

        let vars = spec.variables();
        let columns: Vec<&[Option<f64>]> = vars
            .iter()
            .filter_map(|name| dataset.column(name).map(|c| c.values.as_slice()))
            .collect();

        let rows: Vec<usize> = (0..dataset.n_rows())
            .filter(|&i| {
                columns
                    .iter()
                    .all(|col| matches!(col[i], Some(v) if v.is_finite()))
            })
            .collect();

        let terms = spec.terms();
        let n = rows.len();
        let p = terms.len();
        let offset = usize::from(spec.intercept);

        let mut x = DMatrix::<f64>::zeros(n, p);
        let mut y = DVector::<f64>::zeros(n);
        for (r, &i) in rows.iter().enumerate() {
            // Filtered above: every referenced value is present.
            y[r] = columns[0][i].unwrap_or(f64::NAN);
            if spec.intercept {
                x[(r, 0)] = 1.0;
            }
            for (j, col) in columns[1..].iter().enumerate() {
                x[(r, j + offset)] = col[i].unwrap_or(f64::NAN);
            }
        }

        let dropped = dataset.n_rows() - n;
        info!(
            "Estimation sample: {n} of {} rows used ({dropped} dropped for missing values)",
            dataset.n_rows()
        );

        Ok(Self {
            terms,
            x,
            y,
            rows,
            dropped,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_terms(&self) -> usize {
        self.x.ncols()
    }
}

fn validate_spec(dataset: &Dataset, spec: &ModelSpec) -> Result<(), AppError> {
    if spec.dependent.trim().is_empty() {
        return Err(AppError::InvalidParameter(
            "Dependent variable name is empty.".to_string(),
        ));
    }
    if spec.terms().is_empty() {
        return Err(AppError::InvalidParameter(
            "Model has no terms (no regressors and no intercept).".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for r in &spec.regressors {
        if !seen.insert(r.as_str()) {
            return Err(AppError::InvalidParameter(format!(
                "Regressor '{r}' is listed more than once."
            )));
        }
        if *r == spec.dependent {
            return Err(AppError::InvalidParameter(format!(
                "'{r}' is both the dependent variable and a regressor."
            )));
        }
    }

    let unknown: Vec<&str> = spec
        .variables()
        .into_iter()
        .filter(|v| !dataset.contains(v))
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::InvalidParameter(format!(
            "Unknown variable(s): {}.",
            unknown.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use crate::domain::INTERCEPT;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Column::new("y", vec![Some(1.0), None, Some(3.0), Some(4.0)]),
            Column::new("a", vec![Some(0.0), Some(1.0), None, Some(2.0)]),
            Column::new("b", vec![Some(5.0), Some(6.0), Some(7.0), Some(8.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn drops_rows_missing_any_referenced_variable() {
        let spec = ModelSpec::new("y", &["a", "b"]);
        let s = EstimationSample::build(&dataset(), &spec).unwrap();
        assert_eq!(s.rows, vec![0, 3]);
        assert_eq!(s.dropped, 2);
        assert_eq!(s.terms, vec![INTERCEPT, "a", "b"]);
        assert_eq!(s.x.row(1).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 8.0]);
        assert_eq!(s.y.as_slice(), &[1.0, 4.0]);
    }

    #[test]
    fn unreferenced_missing_values_do_not_drop_rows() {
        let spec = ModelSpec::new("b", &[]);
        let s = EstimationSample::build(&dataset(), &spec).unwrap();
        assert_eq!(s.n_obs(), 4);
        assert_eq!(s.n_terms(), 1);
    }

    #[test]
    fn unknown_variable_is_invalid_parameter() {
        let spec = ModelSpec::new("y", &["a", "nope"]);
        let err = EstimationSample::build(&dataset(), &spec).unwrap_err();
        match err {
            AppError::InvalidParameter(msg) => assert!(msg.contains("nope")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_regressor_is_invalid_parameter() {
        let spec = ModelSpec::new("y", &["a", "a"]);
        assert!(matches!(
            EstimationSample::build(&dataset(), &spec),
            Err(AppError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_model_is_invalid_parameter() {
        let mut spec = ModelSpec::new("y", &[]);
        spec.intercept = false;
        assert!(matches!(
            EstimationSample::build(&dataset(), &spec),
            Err(AppError::InvalidParameter(_))
        ));
    }
}
