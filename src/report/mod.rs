//! Reporting: normalized coefficient rows, the comparison table, and its
//! text/Markdown rendering.

pub mod format;
pub mod normalize;
pub mod table;

pub use format::*;
pub use normalize::*;
pub use table::*;
