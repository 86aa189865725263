//! Output handler traits and types
//!
//! This module defines the trait interface for report writers and the errors they return.

use crate::crawler::CrawlReport;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for persisting a finished job
pub trait ReportWriter {
    /// Writes the report and returns where it went
    ///
    /// # Arguments
    ///
    /// * `report` - The finished job
    /// * `config_hash` - Hash of the configuration file the job ran with, if any
    fn write(&self, report: &CrawlReport, config_hash: Option<&str>) -> OutputResult<PathBuf>;
}
