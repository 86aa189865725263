//! Adlib-Harvest: a hybrid ad library harvester
//!
//! This crate acquires a short-lived session by rendering the ad library search page in a
//! headless browser, then pages through the library's internal query endpoint over plain HTTP
//! using the harvested cookies and tokens.

pub mod config;
pub mod crawler;
pub mod output;
pub mod session;
pub mod state;

use session::TokenKind;
use thiserror::Error;

/// Main error type for Adlib-Harvest operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("Page fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobState,
        to: state::JobState,
    },

}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors produced while acquiring a session
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("mandatory tokens missing (found: {found:?}, missing: {missing:?})")]
    TokenMissing {
        found: Vec<TokenKind>,
        missing: Vec<TokenKind>,
    },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("invalid search URL: {0}")]
    InvalidSearchUrl(#[from] ::url::ParseError),

    #[error("bootstrap cancelled")]
    Cancelled,
}

/// Errors produced by a single page fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("session expired (HTTP 403)")]
    SessionExpired,

    #[error("rate limited")]
    RateLimited,

    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("GraphQL error {code:?}: {message}")]
    GraphQl { code: Option<i64>, message: String },

    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("gave up after {attempts} attempts (last: {last})")]
    MaxRetriesExceeded { attempts: u32, last: Box<FetchError> },

    #[error("unexpected HTTP status {status}")]
    FatalPage { status: u16 },

    #[error("could not build request: {0}")]
    InvalidRequest(String),

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if the fetcher should back off and try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::ServerError { .. }
                | Self::TransientNetwork(_)
                | Self::MalformedPayload(_)
        )
    }

    /// Returns true if the delay before the next attempt doubles with each attempt
    ///
    /// Transport failures wait the fixed base delay instead.
    pub fn uses_backoff(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError { .. })
    }

    /// Returns true if the caller needs a fresh session to continue
    pub fn needs_new_session(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

/// Proxy descriptor errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to parse proxy URL: {0}")]
    Parse(#[from] ::url::ParseError),

    #[error("Proxy URL has no host: {0}")]
    MissingHost(String),

    #[error("Unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),
}

/// Result type alias for Adlib-Harvest operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{AdRecord, CrawlJob, CrawlReport, Outcome, Termination};
pub use session::{CrawlSession, ProxyDescriptor};
pub use state::JobState;
