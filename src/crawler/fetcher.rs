//! Paginated fetcher
//!
//! This module issues token-authenticated page requests, including:
//! - Building the HTTP client owned by a job
//! - Rate capping with a minimum delay before every attempt
//! - Retry with exponential backoff for throttling and server errors
//! - Error classification and response normalization

use crate::config::{ApiConfig, Config, QueryConfig};
use crate::crawler::request::{build_form, build_headers};
use crate::crawler::response::{
    classify_payload, classify_status, decode_body, normalize_page, Cursor, FetchResult,
};
use crate::crawler::retry::{sleep_or_cancel, RetryPolicy};
use crate::session::CrawlSession;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Anything that can fetch one page of results for a session
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        keyword: &str,
        session: &CrawlSession,
        cursor: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> FetchResult;
}

/// Builds the HTTP client used for page requests
///
/// Headers are set per request from the session, so one client serves every session of a job.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// Fetches pages from the query endpoint over plain HTTP
pub struct PaginatedFetcher {
    client: Client,
    api: ApiConfig,
    query: QueryConfig,
    retry: RetryPolicy,
}

impl PaginatedFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client()?, config))
    }

    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            api: config.api.clone(),
            query: config.query.clone(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    /// Fetches one page, retrying where the failure allows it
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 429 / throttling payload code | Backoff `base * 2^attempt`, retry |
    /// | HTTP 5xx | Backoff `base * 2^attempt`, retry |
    /// | HTTP 403 | Return `SessionExpired` immediately |
    /// | Other non-200 | Return `FatalPage` immediately |
    /// | Other payload error | Return `GraphQl` immediately |
    /// | Transport failure / undecodable body | Wait `base`, retry |
    ///
    /// Every attempt, including the first, is preceded by the minimum request delay.
    /// When attempts run out the last failure is wrapped in `MaxRetriesExceeded`.
    pub async fn fetch(
        &self,
        keyword: &str,
        session: &CrawlSession,
        cursor: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> FetchResult {
        let mut last_error = None;

        for attempt in 0..self.retry.max_attempts {
            if !sleep_or_cancel(self.retry.min_request_delay, cancel).await {
                return Err(FetchError::Cancelled);
            }

            let error = match self.attempt(keyword, session, cursor).await {
                Ok(page) => {
                    tracing::info!(
                        records = page.records.len(),
                        has_next = page.next_cursor.is_some(),
                        "HTTP fetch complete"
                    );
                    return Ok(page);
                }
                Err(e) if e.is_retryable() => e,
                Err(e) => {
                    if e.needs_new_session() {
                        tracing::warn!("Got 403 - session may have expired, need re-bootstrap");
                    }
                    return Err(e);
                }
            };

            if self.retry.has_attempt_after(attempt) {
                let delay = self.retry.delay_after(&error, attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "{}, retrying",
                    error
                );
                if !sleep_or_cancel(delay, cancel).await {
                    return Err(FetchError::Cancelled);
                }
            } else {
                tracing::warn!(attempt = attempt + 1, "{}, no attempts left", error);
            }

            last_error = Some(error);
        }

        Err(FetchError::MaxRetriesExceeded {
            attempts: self.retry.max_attempts,
            last: Box::new(last_error.unwrap_or(FetchError::RateLimited)),
        })
    }

    /// Sends a single request and classifies the outcome
    async fn attempt(
        &self,
        keyword: &str,
        session: &CrawlSession,
        cursor: Option<&Cursor>,
    ) -> FetchResult {
        let form = build_form(&self.api, &self.query, keyword, session, cursor)?;
        let headers = build_headers(&self.api, session)?;

        let response = self
            .client
            .post(&self.api.endpoint)
            .headers(headers)
            .form(&form)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if let Some(error) = classify_status(status) {
            tracing::debug!(status = status.as_u16(), "Non-success status");
            return Err(error);
        }

        let body = response.bytes().await.map_err(classify_transport_error)?;
        let payload = decode_body(&body)?;

        if let Some(error) = classify_payload(&payload, self.api.throttle_error_code) {
            if !error.is_retryable() {
                tracing::error!("GraphQL errors: {}", payload["errors"]);
            }
            return Err(error);
        }

        Ok(normalize_page(&payload))
    }
}

#[async_trait]
impl PageSource for PaginatedFetcher {
    async fn fetch_page(
        &self,
        keyword: &str,
        session: &CrawlSession,
        cursor: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> FetchResult {
        self.fetch(keyword, session, cursor, cancel).await
    }
}

fn classify_transport_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::TransientNetwork("request timeout".to_string())
    } else if error.is_connect() {
        FetchError::TransientNetwork(format!("connection failed: {}", error))
    } else {
        FetchError::TransientNetwork(error.to_string())
    }
}
