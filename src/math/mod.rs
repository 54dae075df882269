//! Mathematical utilities: least squares and reference distributions.

pub mod inference;
pub mod ols;

pub use inference::*;
pub use ols::*;
