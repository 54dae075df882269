//! Sweep-level fitting routines.
//!
//! Given:
//! - a dataset
//! - a model specification `y ~ x_1 + ... + x_k`
//! - a list of quantiles `τ_1 .. τ_m`
//!
//! we build the estimation sample once, then run:
//! - one OLS fit
//! - one independent quantile fit per `τ_j` (parallel)
//!
//! Output slot `j` always corresponds to `quantiles[j]`.

use log::{info, warn};
use rayon::prelude::*;

use crate::data::Dataset;
use crate::domain::{FittedModel, ModelSpec};
use crate::error::AppError;
use crate::fit::EstimationSample;
use crate::models::{QuantileEstimator, fit_ols_sample};

/// Reject any tau outside the open interval (0, 1), and repeated taus.
pub fn validate_quantiles(quantiles: &[f64]) -> Result<(), AppError> {
    for (i, &tau) in quantiles.iter().enumerate() {
        if !(tau > 0.0 && tau < 1.0) {
            return Err(AppError::InvalidParameter(format!(
                "Quantile #{} is {tau}; every quantile must lie strictly between 0 and 1.",
                i + 1
            )));
        }
        if quantiles[..i].contains(&tau) {
            return Err(AppError::InvalidParameter(format!(
                "Quantile {tau} is listed more than once (#{}).",
                i + 1
            )));
        }
    }
    Ok(())
}

/// OLS on the listwise-complete rows of `dataset`.
pub fn fit_ols(dataset: &Dataset, spec: &ModelSpec) -> Result<FittedModel, AppError> {
    let sample = EstimationSample::build(dataset, spec)?;
    fit_ols_sample(&sample)
}

/// One quantile fit per tau.
///
/// Parameter problems (bad tau, unknown variable) fail the whole call before
/// anything is fitted. Estimator failures land in their own slot.
pub fn fit_quantile<E>(
    dataset: &Dataset,
    spec: &ModelSpec,
    quantiles: &[f64],
    estimator: &E,
) -> Result<Vec<Result<FittedModel, AppError>>, AppError>
where
    E: QuantileEstimator + ?Sized,
{
    validate_quantiles(quantiles)?;
    let sample = EstimationSample::build(dataset, spec)?;
    Ok(fit_quantile_sample(&sample, quantiles, estimator))
}

/// Sweep over a prebuilt sample. Taus are assumed valid.
pub fn fit_quantile_sample<E>(
    sample: &EstimationSample,
    quantiles: &[f64],
    estimator: &E,
) -> Vec<Result<FittedModel, AppError>>
where
    E: QuantileEstimator + ?Sized,
{
    info!(
        "Fitting {} quantile models on {} observations",
        quantiles.len(),
        sample.n_obs()
    );

    // `collect` on an indexed parallel iterator keeps input order.
    let results: Vec<Result<FittedModel, AppError>> = quantiles
        .par_iter()
        .map(|&tau| estimator.fit(sample, tau))
        .collect();

    for (tau, result) in quantiles.iter().zip(&results) {
        if let Err(e) = result {
            warn!("Quantile {tau} failed: {e}");
        }
    }
    results
}
