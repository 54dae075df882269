//! Estimators.
//!
//! - `ols`: ordinary least squares with classical covariance
//! - `quantreg`: quantile regression behind the `QuantileEstimator` seam
//! - `bandwidth`: sparsity bandwidth rules used by quantile standard errors
//!
//! Every estimator consumes an `EstimationSample` and returns an immutable
//! `FittedModel`.

pub mod bandwidth;
pub mod ols;
pub mod quantreg;

pub use bandwidth::*;
pub use ols::*;
pub use quantreg::*;

use nalgebra::{DMatrix, DVector};

use crate::domain::CoefficientEstimate;
use crate::error::AppError;
use crate::math::t_two_sided_p;

/// Per-term estimate, standard error, t statistic and p-value from a
/// coefficient vector and its covariance matrix.
pub(crate) fn coefficient_estimates(
    terms: &[String],
    beta: &DVector<f64>,
    cov: &DMatrix<f64>,
    df: f64,
) -> Result<Vec<CoefficientEstimate>, AppError> {
    terms
        .iter()
        .enumerate()
        .map(|(j, term)| {
            let estimate = beta[j];
            // Round-off can leave a tiny negative variance on a PSD matrix.
            let std_error = cov[(j, j)].max(0.0).sqrt();
            let statistic = estimate / std_error;
            let p_value = t_two_sided_p(statistic, df)?;
            Ok(CoefficientEstimate {
                term: term.clone(),
                estimate,
                std_error,
                statistic,
                p_value,
            })
        })
        .collect()
}
