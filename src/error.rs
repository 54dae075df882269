//! Application error type.
//!
//! Every fallible path in the crate returns `AppError`. The variant decides the
//! process exit code, so `main` only has to print the message.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    /// The dataset could not be fetched or parsed. Fatal.
    #[error("Dataset unavailable: {0}")]
    DataUnavailable(String),

    /// A quantile outside (0, 1), an unknown variable, or another bad input.
    /// Raised before any fit runs.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The estimator did not converge or the problem is degenerate.
    #[error("Fit failed ({model}): {reason}")]
    FitFailure { model: String, reason: String },

    /// Table or plot construction failed. Fitted results stay valid.
    #[error("Render failed: {0}")]
    RenderFailure(String),

    /// Writing an export file failed.
    #[error("Export failed: {0}")]
    Export(String),
}

impl AppError {
    pub fn fit_failure(model: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::FitFailure {
            model: model.into(),
            reason: reason.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InvalidParameter(_) | AppError::Export(_) => 2,
            AppError::DataUnavailable(_) => 3,
            AppError::FitFailure { .. } => 4,
            AppError::RenderFailure(_) => 5,
        }
    }
}
