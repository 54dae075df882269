//! Input/output helpers.
//!
//! - dataset ingest from URL, file, or synthetic spec (`ingest`)
//! - coefficient row exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
