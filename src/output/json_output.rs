//! JSON result documents
//!
//! One document per job, named after the number of records it holds.

use crate::crawler::{AdRecord, CrawlReport, Outcome};
use crate::output::traits::{OutputResult, ReportWriter};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Label recorded in every document for the acquisition method
const METHOD: &str = "hybrid";

/// Serialized shape of a result document
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub keyword: &'a str,
    pub count: usize,
    pub elapsed_seconds: f64,
    pub ads_per_second: f64,
    pub method: &'static str,
    pub outcome: Outcome,
    pub termination: String,
    pub pages_fetched: usize,
    pub rebootstraps: u32,
    pub finished_at: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<&'a str>,

    pub ads: &'a [AdRecord],
}

impl<'a> ReportDocument<'a> {
    pub fn new(report: &'a CrawlReport, config_hash: Option<&'a str>) -> Self {
        Self {
            keyword: &report.keyword,
            count: report.count(),
            elapsed_seconds: round2(report.elapsed.as_secs_f64()),
            ads_per_second: round2(report.ads_per_second()),
            method: METHOD,
            outcome: report.outcome(),
            termination: report.termination.to_string(),
            pages_fetched: report.pages_fetched,
            rebootstraps: report.rebootstraps,
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            config_hash,
            ads: &report.records,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// File name for a report holding `count` records
pub fn report_file_name(count: usize) -> String {
    format!("hybrid_ads_{}.json", count)
}

/// Writes a report as pretty-printed JSON into `dir`, creating it if needed
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written document
/// * `Err(OutputError)` - Serialization or filesystem failure
pub fn write_report(
    report: &CrawlReport,
    config_hash: Option<&str>,
    dir: &Path,
) -> OutputResult<PathBuf> {
    fs::create_dir_all(dir)?;

    let path = dir.join(report_file_name(report.count()));
    let document = ReportDocument::new(report, config_hash);
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(&path, json)?;

    tracing::info!("Saved {} ads to {}", report.count(), path.display());
    Ok(path)
}

/// Writes reports into a fixed directory
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    directory: PathBuf,
}

impl JsonReportWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl ReportWriter for JsonReportWriter {
    fn write(&self, report: &CrawlReport, config_hash: Option<&str>) -> OutputResult<PathBuf> {
        write_report(report, config_hash, &self.directory)
    }
}
