//! Output module for persisting and summarizing crawl results
//!
//! This module handles:
//! - Writing one JSON result document per job
//! - Printing the end-of-run summary

mod json_output;
pub mod stats;
mod traits;

pub use json_output::{report_file_name, write_report, JsonReportWriter, ReportDocument};
pub use stats::{format_summary, print_summary, RunStatistics};
pub use traits::{OutputError, OutputResult, ReportWriter};
