//! Ordinary least squares.
//!
//! Coefficients come from an SVD solve; the covariance is the classical
//! `σ² (XᵀX)⁻¹` with `σ² = SSE / (n - p)`.

use crate::domain::{FittedModel, ModelKind};
use crate::error::AppError;
use crate::fit::EstimationSample;
use crate::math::{invert_spd, solve_least_squares};
use crate::models::coefficient_estimates;

pub fn fit_ols_sample(sample: &EstimationSample) -> Result<FittedModel, AppError> {
    let label = ModelKind::Ols.label();
    let n = sample.n_obs();
    let p = sample.n_terms();
    if n <= p {
        return Err(AppError::fit_failure(
            label,
            format!("{n} observations for {p} terms"),
        ));
    }

    let beta = solve_least_squares(&sample.x, &sample.y)
        .ok_or_else(|| AppError::fit_failure(&label, "design matrix is rank deficient"))?;

    let resid = &sample.y - &sample.x * &beta;
    let sse = resid.norm_squared();
    let df = (n - p) as f64;
    let sigma2 = sse / df;

    let xtx = sample.x.tr_mul(&sample.x);
    let xtx_inv =
        invert_spd(&xtx).ok_or_else(|| AppError::fit_failure(&label, "XᵀX is singular"))?;
    let cov = xtx_inv * sigma2;

    Ok(FittedModel {
        kind: ModelKind::Ols,
        coefficients: coefficient_estimates(&sample.terms, &beta, &cov, df)?,
        df_residual: df,
        n_obs: n,
        se_method: None,
        objective: sse,
        iterations: 1,
    })
}
