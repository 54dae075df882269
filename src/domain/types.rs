//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - rendered by the reporter without touching the estimators

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::t_critical;

/// Term name used for the constant column.
pub const INTERCEPT: &str = "(Intercept)";

/// Standard-error method for quantile fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeMethod {
    /// Hendricks–Koenker sandwich: local sparsity from refits at `τ ± h`.
    Nid,
    /// Koenker–Bassett: i.i.d. errors, one kernel sparsity estimate.
    Iid,
    /// Powell kernel sandwich.
    Ker,
}

impl SeMethod {
    pub fn label(self) -> &'static str {
        match self {
            SeMethod::Nid => "nid",
            SeMethod::Iid => "iid",
            SeMethod::Ker => "ker",
        }
    }
}

/// Table output flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Markdown,
}

/// Regression formula: `dependent ~ regressors` (+ intercept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub dependent: String,
    pub regressors: Vec<String>,
    pub intercept: bool,
}

impl ModelSpec {
    pub fn new(dependent: impl Into<String>, regressors: &[&str]) -> Self {
        Self {
            dependent: dependent.into(),
            regressors: regressors.iter().map(|r| r.to_string()).collect(),
            intercept: true,
        }
    }

    /// Term names in coefficient order.
    pub fn terms(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.regressors.len() + 1);
        if self.intercept {
            out.push(INTERCEPT.to_string());
        }
        out.extend(self.regressors.iter().cloned());
        out
    }

    /// Every variable the model reads (dependent first).
    pub fn variables(&self) -> Vec<&str> {
        std::iter::once(self.dependent.as_str())
            .chain(self.regressors.iter().map(String::as_str))
            .collect()
    }
}

/// Which estimator produced a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelKind {
    Ols,
    Quantile { tau: f64 },
}

impl ModelKind {
    pub fn label(self) -> String {
        match self {
            ModelKind::Ols => "OLS".to_string(),
            ModelKind::Quantile { tau } => format!("QR({tau})"),
        }
    }

    pub fn tau(self) -> Option<f64> {
        match self {
            ModelKind::Ols => None,
            ModelKind::Quantile { tau } => Some(tau),
        }
    }
}

/// Per-term inference reported by an estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEstimate {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub p_value: f64,
}

/// An immutable fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub kind: ModelKind,
    pub coefficients: Vec<CoefficientEstimate>,
    /// Residual degrees of freedom (`n - p`); the t reference for intervals.
    pub df_residual: f64,
    pub n_obs: usize,
    /// `None` for OLS (classical covariance).
    pub se_method: Option<SeMethod>,
    /// SSE for OLS, check loss for quantile fits.
    pub objective: f64,
    pub iterations: usize,
}

impl FittedModel {
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.coefficients.iter().map(|c| c.term.as_str())
    }

    /// Confidence interval for coefficient `index` at `level`, using the
    /// model's own standard error and t reference distribution.
    pub fn conf_int(&self, index: usize, level: f64) -> Result<(f64, f64), AppError> {
        let coef = self.coefficients.get(index).ok_or_else(|| {
            AppError::InvalidParameter(format!(
                "Coefficient index {index} out of range for {}.",
                self.kind.label()
            ))
        })?;
        let crit = t_critical(level, self.df_residual)?;
        let half = crit * coef.std_error;
        Ok((coef.estimate - half, coef.estimate + half))
    }
}

/// One normalized coefficient row: the unit of the comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub conf_low: f64,
    pub conf_high: f64,
    /// `None` for OLS rows.
    pub quantile: Option<f64>,
}

/// A quantile whose fit did not produce rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileFailure {
    pub tau: f64,
    pub reason: String,
}

/// Where the dataset comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Url(String),
    Path(PathBuf),
    Synthetic { rows: usize, seed: u64 },
}

/// Quantile estimator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub se_method: SeMethod,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            se_method: SeMethod::Nid,
            max_iter: 5000,
            tolerance: 1e-9,
        }
    }
}

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: DataSource,
    pub fetch_attempts: usize,
    pub spec: ModelSpec,
    pub quantiles: Vec<f64>,
    pub confidence_level: f64,
    pub estimator: EstimatorConfig,
    pub timeout: Option<Duration>,
    pub allow_partial: bool,
    pub format: OutputFormat,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_put_intercept_first() {
        let spec = ModelSpec::new("ltotexp", &["suppins", "totchr"]);
        assert_eq!(spec.terms(), vec![INTERCEPT, "suppins", "totchr"]);
        assert_eq!(spec.variables(), vec!["ltotexp", "suppins", "totchr"]);
    }

    #[test]
    fn terms_without_intercept() {
        let mut spec = ModelSpec::new("y", &["x"]);
        spec.intercept = false;
        assert_eq!(spec.terms(), vec!["x"]);
    }

    #[test]
    fn conf_int_brackets_estimate() {
        let model = FittedModel {
            kind: ModelKind::Quantile { tau: 0.5 },
            coefficients: vec![CoefficientEstimate {
                term: "x".to_string(),
                estimate: 2.0,
                std_error: 0.5,
                statistic: 4.0,
                p_value: 0.001,
            }],
            df_residual: 1000.0,
            n_obs: 1001,
            se_method: Some(SeMethod::Nid),
            objective: 0.0,
            iterations: 1,
        };
        let (lo, hi) = model.conf_int(0, 0.95).unwrap();
        assert!(lo < 2.0 && 2.0 < hi);
        // t(1000) is close to the normal: 1.962 * 0.5
        assert!((hi - 2.0 - 0.981).abs() < 0.01);
        assert!(model.conf_int(1, 0.95).is_err());
    }
}
