//! Output formatting module
//!
//! Provides output formats for aggregate responses and run reports.

mod formatter;
mod report;

pub use formatter::{OutputFormat, ResultFormatter};
pub use report::RunReport;
