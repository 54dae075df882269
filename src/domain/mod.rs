//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model and run configuration (`ModelSpec`, `RunConfig`, `SeMethod`)
//! - fitted-model outputs (`FittedModel`, `CoefficientEstimate`)
//! - normalized comparison rows (`CoefficientRow`, `QuantileFailure`)

pub mod types;

pub use types::*;
