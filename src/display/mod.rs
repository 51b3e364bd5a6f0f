//! Report rendering for check results.
pub mod report;

pub use report::{JsonFormatter, ReportFormatter, TextFormatter};
