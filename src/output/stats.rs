//! Run statistics and the console summary
//!
//! This module condenses a finished job into the figures printed at the end of a run.

use crate::crawler::{CrawlReport, Outcome};

/// Figures describing a finished job
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    /// Records collected
    pub count: usize,

    /// Records requested
    pub target: usize,

    /// Pages successfully fetched
    pub pages_fetched: usize,

    /// Sessions re-acquired after expiry
    pub rebootstraps: u32,

    /// Wall time in seconds
    pub elapsed_seconds: f64,

    /// Records per second of wall time
    pub ads_per_second: f64,

    pub outcome: Outcome,

    /// Why the job stopped
    pub reason: String,
}

impl RunStatistics {
    pub fn from_report(report: &CrawlReport) -> Self {
        Self {
            count: report.count(),
            target: report.target,
            pages_fetched: report.pages_fetched,
            rebootstraps: report.rebootstraps,
            elapsed_seconds: report.elapsed.as_secs_f64(),
            ads_per_second: report.ads_per_second(),
            outcome: report.outcome(),
            reason: report.termination.to_string(),
        }
    }
}

/// Formats the end-of-run summary, including one sample record
pub fn format_summary(report: &CrawlReport) -> String {
    let stats = RunStatistics::from_report(report);
    let mut out = String::new();

    match stats.outcome {
        Outcome::Full => out.push_str(&format!("✓ SUCCESS: {} ads collected\n", stats.count)),
        Outcome::Partial => out.push_str(&format!(
            "~ PARTIAL: {} of {} ads collected ({})\n",
            stats.count, stats.target, stats.reason
        )),
        Outcome::Empty => {
            out.push_str(&format!("✗ FAILED: No ads collected ({})\n", stats.reason));
        }
    }

    if let Some(sample) = report.records.first() {
        out.push_str("\nSample ad:\n");
        out.push_str(&format!("  - ad_archive_id: {}\n", display(&sample.id)));
        out.push_str(&format!("  - page_name: {}\n", display(&sample.owner_name)));
        out.push_str(&format!(
            "  - start_date: {}\n",
            sample
                .start_time
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
    }

    out.push_str(&format!(
        "\nPages: {}, re-bootstraps: {}, time: {:.2}s ({:.2} ads/sec)\n",
        stats.pages_fetched, stats.rebootstraps, stats.elapsed_seconds, stats.ads_per_second
    ));
    out
}

fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(report: &CrawlReport) {
    println!("\n{}", format_summary(report));
}
