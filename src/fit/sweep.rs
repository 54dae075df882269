//! Quantile sweep with a whole-sweep deadline.
//!
//! Every tau is submitted as its own task to a rayon pool owned by the sweep;
//! results come back over a channel tagged with their slot index. When the
//! deadline passes, slots still pending are reported as `TimedOut` and the
//! fits that did finish are kept.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::domain::FittedModel;
use crate::error::AppError;
use crate::fit::{EstimationSample, validate_quantiles};
use crate::models::QuantileEstimator;

/// Result slot for one tau of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantileOutcome {
    Fitted(FittedModel),
    Failed(AppError),
    TimedOut,
}

impl QuantileOutcome {
    pub fn model(&self) -> Option<&FittedModel> {
        match self {
            QuantileOutcome::Fitted(m) => Some(m),
            _ => None,
        }
    }

    /// Human-readable reason for a slot without a model.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            QuantileOutcome::Fitted(_) => None,
            QuantileOutcome::Failed(e) => Some(e.to_string()),
            QuantileOutcome::TimedOut => Some("timed out".to_string()),
        }
    }
}

/// Sweep results, aligned with `quantiles`.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub quantiles: Vec<f64>,
    pub outcomes: Vec<QuantileOutcome>,
}

impl SweepOutcome {
    pub fn from_results(quantiles: &[f64], results: Vec<Result<FittedModel, AppError>>) -> Self {
        Self {
            quantiles: quantiles.to_vec(),
            outcomes: results
                .into_iter()
                .map(|r| match r {
                    Ok(m) => QuantileOutcome::Fitted(m),
                    Err(e) => QuantileOutcome::Failed(e),
                })
                .collect(),
        }
    }

    /// Taus that produced a model.
    pub fn completed(&self) -> Vec<f64> {
        self.iter()
            .filter(|(_, o)| matches!(o, QuantileOutcome::Fitted(_)))
            .map(|(tau, _)| tau)
            .collect()
    }

    /// Taus cut off by the deadline.
    pub fn pending(&self) -> Vec<f64> {
        self.iter()
            .filter(|(_, o)| matches!(o, QuantileOutcome::TimedOut))
            .map(|(tau, _)| tau)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, QuantileOutcome::Fitted(_)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &QuantileOutcome)> {
        self.quantiles.iter().copied().zip(self.outcomes.iter())
    }
}

/// Run the sweep, giving up on unfinished taus after `timeout`.
///
/// Tasks still running at the deadline are detached, not cancelled. They
/// finish on the sweep's own pool, whose threads exit once that work drains,
/// so the global rayon pool is never left holding them.
pub fn fit_quantile_with_timeout(
    sample: Arc<EstimationSample>,
    quantiles: &[f64],
    estimator: Arc<dyn QuantileEstimator>,
    timeout: Duration,
) -> Result<SweepOutcome, AppError> {
    validate_quantiles(quantiles)?;
    info!(
        "Fitting {} quantile models on {} observations (deadline {:?})",
        quantiles.len(),
        sample.n_obs(),
        timeout
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(quantiles.len().clamp(1, rayon::current_num_threads()))
        .thread_name(|i| format!("qreg-sweep-{i}"))
        .build()
        .map_err(|e| AppError::fit_failure("quantile sweep", format!("thread pool: {e}")))?;

    let (tx, rx) = mpsc::channel::<(usize, Result<FittedModel, AppError>)>();
    for (idx, &tau) in quantiles.iter().enumerate() {
        let tx = tx.clone();
        let sample = Arc::clone(&sample);
        let estimator = Arc::clone(&estimator);
        pool.spawn(move || {
            let result = estimator.fit(&sample, tau);
            // The receiver is gone once the deadline has passed.
            let _ = tx.send((idx, result));
        });
    }
    drop(tx);

    let mut outcomes = vec![QuantileOutcome::TimedOut; quantiles.len()];
    let deadline = Instant::now() + timeout;
    let mut received = 0;
    while received < quantiles.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((idx, result)) => {
                outcomes[idx] = match result {
                    Ok(m) => QuantileOutcome::Fitted(m),
                    Err(e) => {
                        warn!("Quantile {} failed: {e}", quantiles[idx]);
                        QuantileOutcome::Failed(e)
                    }
                };
                received += 1;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => break,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let outcome = SweepOutcome {
        quantiles: quantiles.to_vec(),
        outcomes,
    };
    let pending = outcome.pending();
    if !pending.is_empty() {
        warn!("Sweep deadline reached; unfinished quantiles: {pending:?}");
    }
    Ok(outcome)
}
