//! Session bootstrapper
//!
//! Renders the search page in a browser, harvests cookies and tokens, and turns them into a
//! [`CrawlSession`]. The browser context is created and torn down on every call.

use crate::config::Config;
use crate::crawler::sleep_or_cancel;
use crate::session::browser::{BrowserLauncher, BrowserPage, LaunchOptions};
use crate::session::tokens::extract_all;
use crate::session::{token_preview, CrawlSession, ProxyDescriptor};
use crate::BootstrapError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Name of the diagnostic file written when tokens are missing
const DEBUG_MARKUP_FILE: &str = "debug_bootstrap.html";

/// Anything that can hand out a fresh session for a keyword
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(
        &self,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> Result<CrawlSession, BootstrapError>;
}

/// Builds the search page address for a keyword
///
/// # Example
///
/// ```
/// use adlib_harvest::config::Config;
/// use adlib_harvest::session::search_url;
///
/// let url = search_url(&Config::default(), "running shoes").unwrap();
/// assert!(url.as_str().contains("q=running+shoes"));
/// ```
pub fn search_url(config: &Config, keyword: &str) -> Result<Url, BootstrapError> {
    let url = Url::parse_with_params(
        &config.api.search_page,
        &[
            ("active_status", "active"),
            ("ad_type", "all"),
            ("country", config.query.country.as_str()),
            ("media_type", "all"),
            ("q", keyword),
            ("search_type", "keyword_unordered"),
        ],
    )?;
    Ok(url)
}

/// Cuts markup to at most `cap` bytes without splitting a character
pub fn truncate_markup(markup: &str, cap: usize) -> &str {
    if markup.len() <= cap {
        return markup;
    }
    let mut end = cap;
    while !markup.is_char_boundary(end) {
        end -= 1;
    }
    &markup[..end]
}

/// Raw material read back from the rendered page
struct Harvest {
    cookies: Vec<(String, String)>,
    markup: String,
    user_agent: String,
}

/// Acquires sessions by rendering the search page in a browser
pub struct Bootstrapper {
    launcher: Arc<dyn BrowserLauncher>,
    config: Arc<Config>,
    proxy: Option<ProxyDescriptor>,
}

impl Bootstrapper {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        config: Arc<Config>,
        proxy: Option<ProxyDescriptor>,
    ) -> Self {
        Self {
            launcher,
            config,
            proxy,
        }
    }

    /// Runs one bootstrap
    ///
    /// # Flow
    ///
    /// 1. Launch a browser context (through the proxy, if any)
    /// 2. Load the search page and wait for the network to settle
    /// 3. Give deferred scripts a moment, then read cookies, markup and user agent
    /// 4. Close the context, whatever happened above
    /// 5. Extract tokens; on success hold the cool-down before returning
    ///
    /// Browser failures are reported as [`BootstrapError::Browser`], never raised raw.
    pub async fn bootstrap(
        &self,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> Result<CrawlSession, BootstrapError> {
        if cancel.is_cancelled() {
            return Err(BootstrapError::Cancelled);
        }

        let url = search_url(&self.config, keyword)?;
        tracing::info!(keyword, "Bootstrapping session via browser");

        let options = LaunchOptions::from_config(&self.config.bootstrap, self.proxy.as_ref());
        let mut page = self.launcher.launch(&options).await?;

        let harvested = self.harvest(page.as_mut(), url.as_str(), cancel).await;

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close browser context: {}", e);
        }

        let harvest = harvested?;
        tracing::info!("Got {} cookies", harvest.cookies.len());

        let tokens = extract_all(&harvest.markup);
        if !tokens.is_complete() {
            tracing::warn!(
                found = ?tokens.found(),
                missing = ?tokens.missing_mandatory(),
                "Bootstrap page is missing mandatory tokens"
            );
            self.save_debug_markup(&harvest.markup);
        }

        let session = CrawlSession::new(harvest.cookies, tokens, harvest.user_agent)?;
        tracing::info!(
            "Bootstrap success: fb_dtsg={}, lsd={}",
            token_preview(session.primary_token(), 20),
            token_preview(session.secondary_token(), 10)
        );

        let cooldown = self.config.bootstrap.cooldown();
        tracing::info!("Waiting {:?} before API calls", cooldown);
        if !sleep_or_cancel(cooldown, cancel).await {
            return Err(BootstrapError::Cancelled);
        }

        Ok(session)
    }

    async fn harvest(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Harvest, BootstrapError> {
        tracing::debug!("Loading search page {}", url);
        page.navigate(url, self.config.bootstrap.navigation_timeout())
            .await?;

        if !sleep_or_cancel(self.config.bootstrap.settle_delay(), cancel).await {
            return Err(BootstrapError::Cancelled);
        }

        let cookies = page.cookies().await?;
        let markup = page.content().await?;
        let user_agent = match page.user_agent().await {
            Ok(ua) if !ua.is_empty() => ua,
            Ok(_) => self.config.bootstrap.user_agent.clone(),
            Err(e) => {
                tracing::debug!("Falling back to configured user agent: {}", e);
                self.config.bootstrap.user_agent.clone()
            }
        };

        Ok(Harvest {
            cookies,
            markup,
            user_agent,
        })
    }

    /// Writes a size-bounded prefix of the markup for later inspection
    fn save_debug_markup(&self, markup: &str) {
        let dir = PathBuf::from(&self.config.output.directory);
        let path = dir.join(DEBUG_MARKUP_FILE);
        let snippet = truncate_markup(markup, self.config.bootstrap.debug_markup_cap);

        let written = std::fs::create_dir_all(&dir).and_then(|_| std::fs::write(&path, snippet));
        match written {
            Ok(()) => tracing::info!("Saved bootstrap markup to {}", path.display()),
            Err(e) => tracing::warn!("Could not save bootstrap markup to {}: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl SessionProvider for Bootstrapper {
    async fn acquire(
        &self,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> Result<CrawlSession, BootstrapError> {
        self.bootstrap(keyword, cancel).await
    }
}
