//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - build the shared estimation sample (listwise deletion)
//! - fit OLS and one quantile model per tau (parallel)
//! - enforce an optional whole-sweep deadline

pub mod fitter;
pub mod sample;
pub mod sweep;

pub use fitter::*;
pub use sample::EstimationSample;
pub use sweep::*;
