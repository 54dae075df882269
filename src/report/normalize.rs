//! Fitted models to flat coefficient rows.
//!
//! `normalize` is a structural projection: it copies the estimator's own
//! estimates and standard errors and only adds the confidence interval.

use crate::domain::{CoefficientRow, FittedModel, QuantileFailure};
use crate::error::AppError;
use crate::fit::SweepOutcome;
use crate::math::validate_level;

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// One row per term, in estimator order.
pub fn normalize(
    model: &FittedModel,
    confidence_level: f64,
    quantile_tag: Option<f64>,
) -> Result<Vec<CoefficientRow>, AppError> {
    validate_level(confidence_level)?;
    model
        .coefficients
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let (conf_low, conf_high) = model.conf_int(idx, confidence_level)?;
            Ok(CoefficientRow {
                term: c.term.clone(),
                estimate: c.estimate,
                std_error: c.std_error,
                statistic: c.statistic,
                p_value: c.p_value,
                conf_low,
                conf_high,
                quantile: quantile_tag,
            })
        })
        .collect()
}

/// Concatenate row groups in input order.
pub fn merge(rows_by_quantile: Vec<Vec<CoefficientRow>>) -> Vec<CoefficientRow> {
    rows_by_quantile.into_iter().flatten().collect()
}

/// Normalized rows of a sweep plus markers for the taus without a model.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSweep {
    pub rows_by_quantile: Vec<Vec<CoefficientRow>>,
    /// Taus that produced rows, in sweep order.
    pub quantiles: Vec<f64>,
    pub failures: Vec<QuantileFailure>,
}

pub fn normalize_sweep(sweep: &SweepOutcome, confidence_level: f64) -> Result<NormalizedSweep, AppError> {
    let mut out = NormalizedSweep {
        rows_by_quantile: Vec::new(),
        quantiles: Vec::new(),
        failures: Vec::new(),
    };
    for (tau, outcome) in sweep.iter() {
        match outcome.model() {
            Some(model) => {
                out.rows_by_quantile
                    .push(normalize(model, confidence_level, Some(tau))?);
                out.quantiles.push(tau);
            }
            None => out.failures.push(QuantileFailure {
                tau,
                reason: outcome.failure_reason().unwrap_or_default(),
            }),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CoefficientEstimate, ModelKind};
    use crate::fit::QuantileOutcome;

    fn model(kind: ModelKind, estimates: &[(&str, f64)]) -> FittedModel {
        FittedModel {
            kind,
            coefficients: estimates
                .iter()
                .map(|(term, est)| CoefficientEstimate {
                    term: term.to_string(),
                    estimate: *est,
                    std_error: 0.2,
                    statistic: est / 0.2,
                    p_value: 0.03,
                })
                .collect(),
            df_residual: 50.0,
            n_obs: 52,
            se_method: None,
            objective: 1.0,
            iterations: 3,
        }
    }

    #[test]
    fn normalize_keeps_term_order_and_tags() {
        let m = model(ModelKind::Quantile { tau: 0.25 }, &[("(Intercept)", 1.0), ("age", -0.5)]);
        let rows = normalize(&m, 0.9, Some(0.25)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].term, "(Intercept)");
        assert_eq!(rows[1].term, "age");
        for r in &rows {
            assert_eq!(r.quantile, Some(0.25));
            assert_eq!(r.std_error, 0.2);
            assert!(r.conf_low <= r.estimate && r.estimate <= r.conf_high);
        }
    }

    #[test]
    fn wider_level_gives_wider_interval() {
        let m = model(ModelKind::Ols, &[("x", 1.0)]);
        let narrow = &normalize(&m, 0.9, None).unwrap()[0];
        let wide = &normalize(&m, 0.99, None).unwrap()[0];
        assert!(wide.conf_high - wide.conf_low > narrow.conf_high - narrow.conf_low);
        assert_eq!(narrow.quantile, None);
    }

    #[test]
    fn invalid_level_is_rejected() {
        let m = model(ModelKind::Ols, &[("x", 1.0)]);
        for level in [0.0, 1.0, 1.2] {
            assert!(matches!(
                normalize(&m, level, None),
                Err(AppError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn merge_preserves_group_order() {
        let a = normalize(&model(ModelKind::Quantile { tau: 0.1 }, &[("a", 1.0), ("b", 2.0)]), 0.95, Some(0.1)).unwrap();
        let b = normalize(&model(ModelKind::Quantile { tau: 0.9 }, &[("a", 3.0), ("b", 4.0)]), 0.95, Some(0.9)).unwrap();
        let merged = merge(vec![a, Vec::new(), b]);
        assert_eq!(merged.len(), 4);
        let estimates: Vec<f64> = merged.iter().map(|r| r.estimate).collect();
        assert_eq!(estimates, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(merged[2].quantile, Some(0.9));
        assert!(merge(Vec::new()).is_empty());
    }

    #[test]
    fn sweep_failures_become_markers() {
        let sweep = SweepOutcome {
            quantiles: vec![0.1, 0.5, 0.9],
            outcomes: vec![
                QuantileOutcome::Fitted(model(ModelKind::Quantile { tau: 0.1 }, &[("x", 1.0)])),
                QuantileOutcome::Failed(AppError::fit_failure("QR(0.5)", "did not converge")),
                QuantileOutcome::TimedOut,
            ],
        };
        let norm = normalize_sweep(&sweep, 0.95).unwrap();
        assert_eq!(norm.quantiles, vec![0.1]);
        assert_eq!(norm.rows_by_quantile.len(), 1);
        assert_eq!(norm.failures.len(), 2);
        assert_eq!(norm.failures[0].tau, 0.5);
        assert!(norm.failures[0].reason.contains("did not converge"));
        assert_eq!(norm.failures[1].reason, "timed out");
    }
}
