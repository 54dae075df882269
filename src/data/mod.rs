//! Dataset loading: in-memory columns, Stata `.dta` decoding, remote fetch,
//! and an offline synthetic sample.

pub mod dataset;
pub mod dta;
pub mod remote;
pub mod synthetic;

pub use dataset::{Column, Dataset, VariableSummary};
pub use dta::{looks_like_dta, parse_dta};
pub use remote::{DatasetFetcher, data_url_from_env};
pub use synthetic::generate_expenditure_sample;
