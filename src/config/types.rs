use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Adlib-Harvest
///
/// The configuration is read once and never mutated afterwards; jobs receive it by reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub query: QueryConfig,
    pub retry: RetryConfig,
    pub bootstrap: BootstrapConfig,
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
}

/// Identifiers of the remote query endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Query endpoint receiving the form-encoded page requests
    pub endpoint: String,

    /// Search page rendered during bootstrap
    pub search_page: String,

    /// Origin sent with page requests
    pub origin: String,

    /// Referer sent with page requests
    pub referer: String,

    /// Persisted query identifier
    pub doc_id: String,

    /// Operation name, sent as a body field and as a header
    pub friendly_name: String,

    /// Payload error code the server uses for throttling
    pub throttle_error_code: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.facebook.com/api/graphql/".to_string(),
            search_page: "https://www.facebook.com/ads/library/".to_string(),
            origin: "https://www.facebook.com".to_string(),
            referer: "https://www.facebook.com/ads/library/".to_string(),
            doc_id: "25464068859919530".to_string(),
            friendly_name: "AdLibrarySearchPaginationQuery".to_string(),
            throttle_error_code: 1_675_004,
        }
    }
}

/// Search filters fixed for the lifetime of a job
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QueryConfig {
    pub country: String,
    pub active_status: String,
    pub ad_type: String,
    pub media_type: String,

    /// Records requested per page
    pub page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            country: "US".to_string(),
            active_status: "ACTIVE".to_string(),
            ad_type: "ALL".to_string(),
            media_type: "ALL".to_string(),
            page_size: 30,
        }
    }
}

/// Retry behavior of the page fetcher
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Attempts per page request, including the first
    pub max_attempts: u32,

    /// First backoff delay (milliseconds); doubles on each further attempt
    pub base_delay_ms: u64,

    /// Delay enforced before every attempt (milliseconds)
    pub min_request_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn min_request_delay(&self) -> Duration {
        Duration::from_millis(self.min_request_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10_000,
            min_request_delay_ms: 3_000,
        }
    }
}

/// Browser bootstrap settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BootstrapConfig {
    /// Upper bound for the page load and network-idle wait (milliseconds)
    pub navigation_timeout_ms: u64,

    /// Pause after load for deferred scripts (milliseconds)
    pub settle_delay_ms: u64,

    /// Cool-down between a successful bootstrap and the first page request (milliseconds)
    pub cooldown_ms: u64,

    /// Bytes of rendered markup kept when tokens are missing
    pub debug_markup_cap: usize,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// User agent set on the browser, also used when the rendered one can't be read
    pub user_agent: String,

    pub headless: bool,

    /// Extra command line flags for the browser
    pub extra_args: Vec<String>,
}

impl BootstrapConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            settle_delay_ms: 2_000,
            cooldown_ms: 5_000,
            debug_markup_cap: 50_000,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            headless: true,
            extra_args: Vec::new(),
        }
    }
}

/// Job-level limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Records collected when no target is given on the command line
    pub default_target: usize,

    /// Minimum time between consecutive page fetches (milliseconds)
    pub page_delay_ms: u64,

    /// Session re-acquisitions allowed per job
    pub max_rebootstraps: u32,
}

impl CrawlConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            default_target: 50,
            page_delay_ms: 1_000,
            max_rebootstraps: 1,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory for result documents and bootstrap diagnostics
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "out".to_string(),
        }
    }
}
