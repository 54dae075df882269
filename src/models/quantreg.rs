//! Linear quantile regression.
//!
//! For a quantile `τ ∈ (0, 1)` we minimize the check loss
//!
//! ```text
//! Σ ρτ(y_i - x_i^T β),   ρτ(r) = r (τ - 1{r < 0})
//! ```
//!
//! The default estimator is the Hunter–Lange MM algorithm. Each step majorizes
//! an ε-perturbed check loss by a quadratic and solves the weighted normal
//! equations
//!
//! ```text
//! (XᵀWX) β = XᵀWy + (2τ - 1) Xᵀ1,   W = diag(1 / (ε + |r_i|))
//! ```
//!
//! which is an iteratively reweighted least squares step with an asymmetric
//! shift. Iterations start from OLS and stop once the check loss settles.
//!
//! Standard errors follow `SeMethod`:
//! - `Nid`: `τ(1-τ) (XᵀFX)⁻¹ XᵀX (XᵀFX)⁻¹` with local densities
//!   `f_i = 2h / x_iᵀ(β(τ+h) - β(τ-h))` from two neighbouring refits
//! - `Iid`: `τ(1-τ) / f̂(0)² · (XᵀX)⁻¹` with a Gaussian-kernel density at zero
//! - `Ker`: the Nid sandwich with Gaussian-kernel weights `φ(u_i/h)/h`

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::domain::{EstimatorConfig, FittedModel, ModelKind, SeMethod};
use crate::error::AppError;
use crate::fit::EstimationSample;
use crate::math::{invert_spd, normal_pdf, solve_least_squares, solve_spd, weighted_gram};
use crate::models::{checked_bandwidth, coefficient_estimates, residual_bandwidth};

/// Relative size of the MM perturbation.
const MM_EPSILON: f64 = 1e-6;
/// Per-observation check loss, relative to `|y|`, treated as an exact fit.
const EXACT_FIT_LOSS: f64 = 1e-12;
/// Guard against dividing by a zero fitted-quantile spread (`eps^(2/3)`).
const NID_EPS: f64 = 3.666_852_862_501_036e-11;

/// Fits one quantile. Implementations must not share mutable state between
/// calls so a sweep can run them concurrently.
pub trait QuantileEstimator: Send + Sync {
    fn fit(&self, sample: &EstimationSample, tau: f64) -> Result<FittedModel, AppError>;
}

/// Point estimate of a single MM run.
#[derive(Debug, Clone)]
pub struct MmSolution {
    pub beta: DVector<f64>,
    pub check_loss: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MmQuantileEstimator {
    config: EstimatorConfig,
}

impl MmQuantileEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Coefficients only (no inference).
    pub fn solve(&self, sample: &EstimationSample, tau: f64) -> Result<MmSolution, AppError> {
        let label = ModelKind::Quantile { tau }.label();
        let x = &sample.x;
        let y = &sample.y;
        let n = sample.n_obs();
        let p = sample.n_terms();
        if n <= p {
            return Err(AppError::fit_failure(
                label,
                format!("{n} observations for {p} terms"),
            ));
        }

        let mut beta = solve_least_squares(x, y)
            .ok_or_else(|| AppError::fit_failure(&label, "design matrix is rank deficient"))?;
        let mut resid = y - x * &beta;
        let mut loss = check_loss(resid.as_slice(), tau);

        // Below this the loss is round-off: the data lie on a hyperplane.
        let y_scale = y.iter().map(|v| v.abs()).sum::<f64>() / n as f64;
        let loss_floor = EXACT_FIT_LOSS * n as f64 * (1.0 + y_scale);
        if loss <= loss_floor {
            return Ok(MmSolution {
                beta,
                check_loss: loss,
                iterations: 0,
            });
        }

        let scale = resid.iter().map(|r| r.abs()).sum::<f64>() / n as f64;
        let eps = MM_EPSILON * scale.max(f64::MIN_POSITIVE);

        // Xᵀ1 is fixed across iterations.
        let col_sums = DVector::from_iterator(p, x.column_iter().map(|c| c.sum()));
        let shift = col_sums * (2.0 * tau - 1.0);

        let mut weights = vec![0.0; n];
        for iter in 1..=self.config.max_iter {
            for (w, r) in weights.iter_mut().zip(resid.iter()) {
                *w = 1.0 / (eps + r.abs());
            }
            let gram = weighted_gram(x, &weights);
            let wy = DVector::from_iterator(n, weights.iter().zip(y.iter()).map(|(w, yi)| w * yi));
            let rhs = x.tr_mul(&wy) + &shift;

            let next = solve_spd(&gram, &rhs).ok_or_else(|| {
                AppError::fit_failure(&label, "weighted normal equations are singular")
            })?;
            let next_resid = y - x * &next;
            let next_loss = check_loss(next_resid.as_slice(), tau);
            if !next_loss.is_finite() {
                return Err(AppError::fit_failure(&label, "check loss is not finite"));
            }

            let settled = (loss - next_loss).abs() <= self.config.tolerance * loss
                || next_loss <= loss_floor;
            beta = next;
            resid = next_resid;
            loss = next_loss;
            if settled {
                debug!("{label}: converged after {iter} MM iterations (loss={loss:.6})");
                return Ok(MmSolution {
                    beta,
                    check_loss: loss,
                    iterations: iter,
                });
            }
        }

        Err(AppError::fit_failure(
            label,
            format!("did not converge within {} iterations", self.config.max_iter),
        ))
    }

    fn covariance(
        &self,
        sample: &EstimationSample,
        tau: f64,
        beta: &DVector<f64>,
    ) -> Result<DMatrix<f64>, AppError> {
        let label = ModelKind::Quantile { tau }.label();
        let x = &sample.x;
        let n = sample.n_obs();
        let h = checked_bandwidth(tau, n).map_err(|reason| AppError::fit_failure(&label, reason))?;
        debug!("{label}: Hall-Sheather bandwidth {h:.5}");

        let xtx = x.tr_mul(x);
        let scale = tau * (1.0 - tau);

        match self.config.se_method {
            SeMethod::Nid => {
                let refit = |t: f64| {
                    self.solve(sample, t).map(|s| s.beta).map_err(|e| {
                        AppError::fit_failure(&label, format!("sparsity refit at tau={t:.4} failed: {e}"))
                    })
                };
                let hi = refit(tau + h)?;
                let lo = refit(tau - h)?;
                let dyhat = x * (hi - lo);
                let density: Vec<f64> = dyhat
                    .iter()
                    .map(|d| (2.0 * h / (d - NID_EPS)).max(0.0))
                    .collect();
                let non_positive = dyhat.iter().filter(|d| **d <= 0.0).count();
                if non_positive > 0 {
                    debug!("{label}: {non_positive} non-positive local densities");
                }
                sandwich(&label, x, &xtx, &density, scale)
            }
            SeMethod::Ker => {
                let resid = &sample.y - x * beta;
                let width = residual_bandwidth(tau, h, resid.as_slice())?;
                let density: Vec<f64> = resid.iter().map(|u| normal_pdf(u / width) / width).collect();
                sandwich(&label, x, &xtx, &density, scale)
            }
            SeMethod::Iid => {
                let resid = &sample.y - x * beta;
                let width = residual_bandwidth(tau, h, resid.as_slice())?;
                let f0 = resid.iter().map(|u| normal_pdf(u / width)).sum::<f64>() / (n as f64 * width);
                if !(f0.is_finite() && f0 > 0.0) {
                    return Err(AppError::fit_failure(&label, "density at zero is not positive"));
                }
                let xtx_inv = invert_spd(&xtx)
                    .ok_or_else(|| AppError::fit_failure(&label, "XᵀX is singular"))?;
                Ok(xtx_inv * (scale / (f0 * f0)))
            }
        }
    }
}

impl QuantileEstimator for MmQuantileEstimator {
    fn fit(&self, sample: &EstimationSample, tau: f64) -> Result<FittedModel, AppError> {
        let solution = self.solve(sample, tau)?;
        let cov = self.covariance(sample, tau, &solution.beta)?;
        let df = (sample.n_obs() - sample.n_terms()) as f64;

        Ok(FittedModel {
            kind: ModelKind::Quantile { tau },
            coefficients: coefficient_estimates(&sample.terms, &solution.beta, &cov, df)?,
            df_residual: df,
            n_obs: sample.n_obs(),
            se_method: Some(self.config.se_method),
            objective: solution.check_loss,
            iterations: solution.iterations,
        })
    }
}

/// `scale · (XᵀFX)⁻¹ XᵀX (XᵀFX)⁻¹` with `F = diag(density)`.
fn sandwich(
    label: &str,
    x: &DMatrix<f64>,
    xtx: &DMatrix<f64>,
    density: &[f64],
    scale: f64,
) -> Result<DMatrix<f64>, AppError> {
    let fxx = weighted_gram(x, density);
    let fxx_inv = invert_spd(&fxx)
        .ok_or_else(|| AppError::fit_failure(label, "density-weighted XᵀX is singular"))?;
    Ok(&fxx_inv * xtx * &fxx_inv * scale)
}

/// `Σ ρτ(r_i)`.
pub fn check_loss(resid: &[f64], tau: f64) -> f64 {
    resid
        .iter()
        .map(|&r| if r < 0.0 { r * (tau - 1.0) } else { r * tau })
        .sum()
}
