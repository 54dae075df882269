//! Bandwidth rules for sparsity estimation.

use crate::error::AppError;
use crate::math::{normal_pdf, normal_quantile, sample_std, sorted_quantile};

/// Significance level the Hall–Sheather rule is tuned for.
pub const HS_ALPHA: f64 = 0.05;

/// Hall–Sheather bandwidth in quantile units:
///
/// `h = n^(-1/3) · z_{1-α/2}^(2/3) · (1.5 φ(Φ⁻¹(τ))² / (2 Φ⁻¹(τ)² + 1))^(1/3)`
pub fn hall_sheather(tau: f64, n: usize, alpha: f64) -> f64 {
    let x0 = normal_quantile(tau);
    let f0 = normal_pdf(x0);
    let z = normal_quantile(1.0 - alpha / 2.0);
    (n as f64).powf(-1.0 / 3.0)
        * z.powf(2.0 / 3.0)
        * ((1.5 * f0 * f0) / (2.0 * x0 * x0 + 1.0)).powf(1.0 / 3.0)
}

/// Hall–Sheather bandwidth, failing when `τ ± h` leaves (0, 1).
///
/// Sparsity at the τ-quantile is estimated from the neighbourhood `[τ - h, τ + h]`;
/// without room on both sides it cannot be estimated at this sample size.
pub fn checked_bandwidth(tau: f64, n: usize) -> Result<f64, String> {
    let h = hall_sheather(tau, n, HS_ALPHA);
    if !h.is_finite() || h <= 0.0 {
        return Err(format!("bandwidth is not positive (h={h})"));
    }
    if tau - h <= 0.0 {
        return Err(format!(
            "tau - h = {:.4} <= 0: sparsity not estimable at n={n}",
            tau - h
        ));
    }
    if tau + h >= 1.0 {
        return Err(format!(
            "tau + h = {:.4} >= 1: sparsity not estimable at n={n}",
            tau + h
        ));
    }
    Ok(h)
}

/// Convert a quantile-unit bandwidth into residual units for kernel density
/// estimation: `(Φ⁻¹(τ+h) - Φ⁻¹(τ-h)) · min(sd, IQR / 1.34)`.
pub fn residual_bandwidth(tau: f64, h: f64, residuals: &[f64]) -> Result<f64, AppError> {
    if residuals.is_empty() {
        return Err(AppError::fit_failure(
            format!("QR({tau})"),
            "no residuals for kernel bandwidth",
        ));
    }
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let iqr = sorted_quantile(&sorted, 0.75) - sorted_quantile(&sorted, 0.25);
    let spread = sample_std(residuals).min(iqr / 1.34);
    let width = (normal_quantile(tau + h) - normal_quantile(tau - h)) * spread;
    if width.is_finite() && width > 0.0 {
        Ok(width)
    } else {
        Err(AppError::fit_failure(
            format!("QR({tau})"),
            "residual spread is zero; kernel sparsity not estimable",
        ))
    }
}
