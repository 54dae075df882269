//! The fit pipeline shared by the CLI and the integration tests.
//!
//! Load -> validate -> estimation sample -> OLS -> quantile sweep -> normalize
//!
//! Presentation (table, plot, exports) happens in `app`; this module only
//! computes.

use std::sync::Arc;

use log::info;

use crate::data::Dataset;
use crate::domain::{CoefficientRow, FittedModel, QuantileFailure, RunConfig};
use crate::error::AppError;
use crate::fit::{
    EstimationSample, SweepOutcome, fit_quantile_sample, fit_quantile_with_timeout,
    validate_quantiles,
};
use crate::io::load_dataset;
use crate::math::validate_level;
use crate::models::{MmQuantileEstimator, QuantileEstimator, fit_ols_sample};
use crate::report::{merge, normalize, normalize_sweep};

/// All computed outputs of a single `qreg fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub n_obs: usize,
    pub dropped: usize,
    pub ols: FittedModel,
    pub sweep: SweepOutcome,
    pub ols_rows: Vec<CoefficientRow>,
    /// Merged quantile rows, sweep order.
    pub quantile_rows: Vec<CoefficientRow>,
    /// Taus that produced rows.
    pub fitted_quantiles: Vec<f64>,
    pub failures: Vec<QuantileFailure>,
}

impl RunOutput {
    /// OLS rows followed by the quantile rows.
    pub fn all_rows(&self) -> Vec<CoefficientRow> {
        merge(vec![self.ols_rows.clone(), self.quantile_rows.clone()])
    }

    pub fn fitted_models(&self) -> Vec<&FittedModel> {
        std::iter::once(&self.ols)
            .chain(self.sweep.outcomes.iter().filter_map(|o| o.model()))
            .collect()
    }
}

/// Load the configured dataset and run the pipeline with the default estimator.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutput, AppError> {
    // Parameter errors surface before the download.
    validate_quantiles(&config.quantiles)?;
    validate_level(config.confidence_level)?;

    let dataset = load_dataset(&config.source, config.fetch_attempts)?;
    let estimator: Arc<dyn QuantileEstimator> = Arc::new(MmQuantileEstimator::new(config.estimator));
    run_with_dataset(config, &dataset, estimator)
}

/// Run the pipeline on an already loaded dataset.
pub fn run_with_dataset(
    config: &RunConfig,
    dataset: &Dataset,
    estimator: Arc<dyn QuantileEstimator>,
) -> Result<RunOutput, AppError> {
    validate_quantiles(&config.quantiles)?;
    validate_level(config.confidence_level)?;

    let sample = Arc::new(EstimationSample::build(dataset, &config.spec)?);
    let ols = fit_ols_sample(&sample)?;

    let sweep = match config.timeout {
        Some(timeout) => {
            fit_quantile_with_timeout(Arc::clone(&sample), &config.quantiles, estimator, timeout)?
        }
        None => SweepOutcome::from_results(
            &config.quantiles,
            fit_quantile_sample(&sample, &config.quantiles, estimator.as_ref()),
        ),
    };

    let normalized = normalize_sweep(&sweep, config.confidence_level)?;
    if !normalized.failures.is_empty() && !config.allow_partial {
        let detail: Vec<String> = normalized
            .failures
            .iter()
            .map(|f| format!("tau={}: {}", f.tau, f.reason))
            .collect();
        return Err(AppError::fit_failure(
            "quantile sweep",
            format!(
                "{} of {} quantiles failed ({}); rerun with --allow-partial to keep the rest",
                normalized.failures.len(),
                config.quantiles.len(),
                detail.join("; ")
            ),
        ));
    }
    info!(
        "Sweep finished: {} of {} quantiles fitted",
        normalized.quantiles.len(),
        config.quantiles.len()
    );

    let ols_rows = normalize(&ols, config.confidence_level, None)?;
    Ok(RunOutput {
        n_obs: sample.n_obs(),
        dropped: sample.dropped,
        ols,
        sweep,
        ols_rows,
        quantile_rows: merge(normalized.rows_by_quantile),
        fitted_quantiles: normalized.quantiles,
        failures: normalized.failures,
    })
}
