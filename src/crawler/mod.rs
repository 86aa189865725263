//! Crawler module for paginated result harvesting
//!
//! This module contains the core crawling logic, including:
//! - Page request construction
//! - HTTP fetching with retry logic
//! - Response classification and normalization
//! - Job orchestration across session expiry

mod fetcher;
mod orchestrator;
mod request;
mod response;
mod retry;

pub use fetcher::{build_http_client, PageSource, PaginatedFetcher};
pub use orchestrator::{CrawlJob, CrawlReport, Outcome, Termination};
pub use request::{build_form, build_headers, QueryVariables};
pub use response::{
    classify_payload, classify_status, decode_body, normalize_page, AdRecord, Cursor,
    FetchResult, FetchedPage,
};
pub use retry::{sleep_or_cancel, RetryPolicy};

use crate::config::Config;
use crate::session::{Bootstrapper, ChromiumLauncher, ProxyDescriptor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl for one keyword
///
/// This is the main entry point for a crawl. It will:
/// 1. Build the HTTP client and page fetcher
/// 2. Wire a Chromium-backed bootstrapper (through the proxy, if any)
/// 3. Run the job until the target, the last page, an error or cancellation
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The job ran; its termination says how it ended
/// * `Err(CrawlError)` - The HTTP client could not be built
pub async fn crawl(
    config: Arc<Config>,
    keyword: &str,
    target: usize,
    proxy: Option<ProxyDescriptor>,
    cancel: CancellationToken,
) -> crate::Result<CrawlReport> {
    let fetcher = PaginatedFetcher::new(&config)?;
    let bootstrapper = Bootstrapper::new(Arc::new(ChromiumLauncher), config.clone(), proxy);

    let job = CrawlJob::new(
        keyword,
        target,
        &config.crawl,
        Arc::new(bootstrapper),
        Arc::new(fetcher),
    )
    .with_cancellation(cancel);

    Ok(job.run().await)
}
