//! Crawl orchestrator - drives one keyword from bootstrap to a final report
//!
//! A job bootstraps a session, then pages through results sequentially. A session that
//! expires mid-crawl is replaced through a bounded number of re-bootstraps, and pagination
//! resumes from the cursor that was in use when the session expired.

use crate::config::CrawlConfig;
use crate::crawler::fetcher::PageSource;
use crate::crawler::response::{AdRecord, Cursor};
use crate::crawler::retry::sleep_or_cancel;
use crate::session::{CrawlSession, SessionProvider};
use crate::state::JobState;
use crate::{BootstrapError, CrawlError, FetchError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a job stopped
#[derive(Debug)]
pub enum Termination {
    /// The requested number of records was collected
    TargetReached,

    /// The server reported no further pages
    NoMorePages,

    /// A page came back without records
    EmptyPage,

    /// The cancellation token fired
    Cancelled,

    /// An unrecoverable error ended the job
    Failed(CrawlError),
}

impl Termination {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&CrawlError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::NoMorePages => write!(f, "no more pages"),
            Self::EmptyPage => write!(f, "empty page"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// User-visible classification of a finished job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The target count was met
    Full,

    /// Some records, fewer than requested
    Partial,

    /// No records at all
    Empty,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::Empty => "empty",
        };
        write!(f, "{}", s)
    }
}

/// Everything a finished job produced
#[derive(Debug)]
pub struct CrawlReport {
    pub keyword: String,
    pub target: usize,

    /// Collected records in fetch order, never more than `target`
    pub records: Vec<AdRecord>,

    /// Pages successfully fetched
    pub pages_fetched: usize,

    /// Sessions re-acquired after expiry
    pub rebootstraps: u32,

    pub elapsed: Duration,
    pub termination: Termination,
    pub final_state: JobState,
}

impl CrawlReport {
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn outcome(&self) -> Outcome {
        if self.records.is_empty() {
            Outcome::Empty
        } else if self.records.len() >= self.target {
            Outcome::Full
        } else {
            Outcome::Partial
        }
    }

    /// Records per second of wall time; zero when no time elapsed
    pub fn ads_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records.len() as f64 / secs
        } else {
            0.0
        }
    }
}

/// One keyword crawl
///
/// The job exclusively owns its session and accumulated records. Jobs for different keywords
/// share nothing and may run concurrently.
pub struct CrawlJob {
    keyword: String,
    target: usize,
    page_delay: Duration,
    max_rebootstraps: u32,
    sessions: Arc<dyn SessionProvider>,
    pages: Arc<dyn PageSource>,
    cancel: CancellationToken,
    state: JobState,
    cursor: Option<Cursor>,
    records: Vec<AdRecord>,
    pages_fetched: usize,
    rebootstraps: u32,
}

impl CrawlJob {
    pub fn new(
        keyword: impl Into<String>,
        target: usize,
        limits: &CrawlConfig,
        sessions: Arc<dyn SessionProvider>,
        pages: Arc<dyn PageSource>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            target,
            page_delay: limits.page_delay(),
            max_rebootstraps: limits.max_rebootstraps,
            sessions,
            pages,
            cancel: CancellationToken::new(),
            state: JobState::Bootstrapping,
            cursor: None,
            records: Vec::new(),
            pages_fetched: 0,
            rebootstraps: 0,
        }
    }

    /// Uses an externally owned token, so the caller can stop the job
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the job to completion
    ///
    /// Never fails outright: errors end up in [`CrawlReport::termination`] alongside whatever
    /// records were collected before them.
    pub async fn run(mut self) -> CrawlReport {
        let started = Instant::now();
        tracing::info!(keyword = %self.keyword, target = self.target, "Starting crawl job");

        let termination = match self.drive().await {
            Ok(termination) => termination,
            Err(e) => {
                tracing::error!("Crawl job failed in state {}: {}", self.state, e);
                Termination::Failed(e)
            }
        };

        let terminal = if termination.is_failure() {
            JobState::Failed
        } else {
            JobState::Completed
        };
        if let Err(e) = self.state.transition(terminal) {
            tracing::warn!("{}", e);
        }

        self.records.truncate(self.target);

        let report = CrawlReport {
            keyword: self.keyword,
            target: self.target,
            records: self.records,
            pages_fetched: self.pages_fetched,
            rebootstraps: self.rebootstraps,
            elapsed: started.elapsed(),
            termination,
            final_state: self.state,
        };

        tracing::info!(
            "Crawl job finished: {} records in {:.2}s ({}, {})",
            report.count(),
            report.elapsed.as_secs_f64(),
            report.outcome(),
            report.termination
        );
        report
    }

    /// The state machine proper
    ///
    /// `Ok` carries a normal stop; `Err` a failure after which the job is Failed.
    async fn drive(&mut self) -> Result<Termination, CrawlError> {
        if self.cancel.is_cancelled() {
            return Ok(Termination::Cancelled);
        }
        if self.records.len() >= self.target {
            return Ok(Termination::TargetReached);
        }

        let mut session = match self.acquire_session().await? {
            Some(session) => session,
            None => return Ok(Termination::Cancelled),
        };
        self.state.transition(JobState::Paginating)?;

        let mut first_request = true;
        loop {
            if !first_request && !sleep_or_cancel(self.page_delay, &self.cancel).await {
                return Ok(Termination::Cancelled);
            }
            if self.cancel.is_cancelled() {
                return Ok(Termination::Cancelled);
            }
            first_request = false;

            let fetched = self
                .pages
                .fetch_page(&self.keyword, &session, self.cursor.as_ref(), &self.cancel)
                .await;

            match fetched {
                Ok(page) => {
                    self.pages_fetched += 1;
                    if page.records.is_empty() {
                        tracing::info!(page = self.pages_fetched, "Page came back empty, stopping");
                        return Ok(Termination::EmptyPage);
                    }

                    let batch = page.records.len();
                    self.records.extend(page.records);
                    tracing::info!(
                        page = self.pages_fetched,
                        batch,
                        total = self.records.len(),
                        "Fetched page"
                    );

                    if self.records.len() >= self.target {
                        return Ok(Termination::TargetReached);
                    }
                    match page.next_cursor {
                        Some(cursor) => self.cursor = Some(cursor),
                        None => {
                            tracing::info!("No more pages available");
                            return Ok(Termination::NoMorePages);
                        }
                    }
                }
                Err(FetchError::Cancelled) => return Ok(Termination::Cancelled),
                Err(e) if e.needs_new_session() => {
                    self.state.transition(JobState::AwaitingRebootstrap)?;
                    if self.rebootstraps >= self.max_rebootstraps {
                        tracing::error!(
                            "Session expired again after {} re-bootstrap(s), giving up",
                            self.rebootstraps
                        );
                        return Err(e.into());
                    }

                    self.rebootstraps += 1;
                    let age = chrono::Utc::now() - session.created_at();
                    tracing::info!(
                        resume_cursor = self.cursor.is_some(),
                        session_age_secs = age.num_seconds(),
                        "Session expired, re-bootstrapping"
                    );
                    session = match self.acquire_session().await? {
                        Some(session) => session,
                        None => return Ok(Termination::Cancelled),
                    };
                    self.state.transition(JobState::Paginating)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Asks the provider for a session; `None` means the job was cancelled meanwhile
    async fn acquire_session(&self) -> Result<Option<CrawlSession>, CrawlError> {
        match self.sessions.acquire(&self.keyword, &self.cancel).await {
            Ok(session) => Ok(Some(session)),
            Err(BootstrapError::Cancelled) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
