//! Browser automation boundary
//!
//! The bootstrapper only needs to open a page, wait for it to settle, and read cookies and
//! markup back. That narrow surface is expressed as two traits so the bootstrap flow can be
//! driven by a real Chromium instance or by a scripted stand-in.

use crate::config::BootstrapConfig;
use crate::session::ProxyDescriptor;
use crate::BootstrapError;
use async_trait::async_trait;
use chromiumoxide::auth::Credentials;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Settings for one browser launch
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub user_agent: String,
    pub proxy: Option<ProxyDescriptor>,
    pub extra_args: Vec<String>,
}

impl LaunchOptions {
    pub fn from_config(config: &BootstrapConfig, proxy: Option<&ProxyDescriptor>) -> Self {
        Self {
            headless: config.headless,
            viewport: (config.viewport_width, config.viewport_height),
            user_agent: config.user_agent.clone(),
            proxy: proxy.cloned(),
            extra_args: config.extra_args.clone(),
        }
    }
}

/// Starts browser contexts
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a fresh browser context with a single blank page
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserPage>, BootstrapError>;
}

/// A page inside a launched browser context
///
/// The owner must call [`BrowserPage::close`] on every path; implementations may add a
/// best-effort `Drop` fallback but should not rely on it.
#[async_trait]
pub trait BrowserPage: Send {
    /// Navigates and waits until network activity settles or `timeout` elapses
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BootstrapError>;

    /// All cookies in the browser context as `(name, value)` pairs, whatever their path or domain
    async fn cookies(&mut self) -> Result<Vec<(String, String)>, BootstrapError>;

    /// The fully rendered document markup
    async fn content(&mut self) -> Result<String, BootstrapError>;

    /// The user agent the page reports to scripts
    async fn user_agent(&mut self) -> Result<String, BootstrapError>;

    /// Tears down the page and its browser context
    async fn close(self: Box<Self>) -> Result<(), BootstrapError>;
}

fn browser_error(context: &str, error: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::Browser(format!("{}: {}", context, error))
}

/// Launches headless Chromium through the DevTools protocol
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserPage>, BootstrapError> {
        let (width, height) = options.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", options.user_agent));

        if !options.headless {
            builder = builder.with_head();
        }

        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.server));
        }

        for arg in &options.extra_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| browser_error("invalid browser config", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("failed to launch Chromium", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error: {}", e);
                }
            }
        });

        let mut context = ChromiumPage {
            browser,
            page: None,
            handler_task: Some(handler_task),
        };

        // From here on the context owns the browser process, so failures must close it.
        match context.open_page(options).await {
            Ok(page) => {
                context.page = Some(page);
                Ok(Box::new(context))
            }
            Err(e) => {
                let _ = Box::new(context).close().await;
                Err(e)
            }
        }
    }
}

/// A Chromium process plus its single working page
pub struct ChromiumPage {
    browser: Browser,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
}

impl ChromiumPage {
    async fn open_page(&self, options: &LaunchOptions) -> Result<Page, BootstrapError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_error("failed to open page", e))?;

        if let Some((username, password)) = options.proxy.as_ref().and_then(|p| p.credentials()) {
            page.authenticate(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
            .map_err(|e| browser_error("failed to register proxy credentials", e))?;
        }

        Ok(page)
    }

    fn page(&self) -> Result<&Page, BootstrapError> {
        self.page
            .as_ref()
            .ok_or_else(|| BootstrapError::Browser("page is not open".to_string()))
    }

    /// Polls the page's resource timeline until it stops growing for a second
    ///
    /// Returns false when `timeout` elapsed first.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<bool, BootstrapError> {
        let timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        let script = format!(
            r#"(async () => {{
                const timeoutMs = {timeout_ms};
                const idleMs = 1000;
                const interval = 250;
                const start = Date.now();
                let lastCount = performance.getEntriesByType('resource').length;
                let stableMs = 0;
                while (Date.now() - start < timeoutMs) {{
                    await new Promise(r => setTimeout(r, interval));
                    const count = performance.getEntriesByType('resource').length;
                    if (document.readyState === 'complete' && count === lastCount) {{
                        stableMs += interval;
                        if (stableMs >= idleMs) {{ return true; }}
                    }} else {{
                        stableMs = 0;
                    }}
                    lastCount = count;
                }}
                return false;
            }})()"#,
            timeout_ms = timeout_ms
        );

        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| browser_error("network idle wait failed", e))?;

        Ok(result.into_value::<bool>().unwrap_or(false))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BootstrapError> {
        let started = Instant::now();
        let page = self.page()?;

        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| BootstrapError::Browser(format!("navigation timed out after {:?}", timeout)))?
            .map_err(|e| browser_error("navigation failed", e))?;

        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            tracing::warn!("No time left to wait for network idle on {}", url);
            return Ok(());
        }

        match self.wait_for_network_idle(remaining).await {
            Ok(true) => tracing::debug!("Network idle reached for {}", url),
            Ok(false) => tracing::warn!("Network did not settle within {:?}", timeout),
            Err(e) => tracing::warn!("Network idle wait failed: {}", e),
        }

        Ok(())
    }

    async fn cookies(&mut self) -> Result<Vec<(String, String)>, BootstrapError> {
        // Whole context, not only cookies scoped to the current URL
        let cookies = self
            .browser
            .get_cookies()
            .await
            .map_err(|e| browser_error("failed to read cookies", e))?;

        Ok(cookies.into_iter().map(|c| (c.name, c.value)).collect())
    }

    async fn content(&mut self) -> Result<String, BootstrapError> {
        self.page()?
            .content()
            .await
            .map_err(|e| browser_error("failed to read page content", e))
    }

    async fn user_agent(&mut self) -> Result<String, BootstrapError> {
        let value = self
            .page()?
            .evaluate("navigator.userAgent")
            .await
            .map_err(|e| browser_error("failed to read user agent", e))?;

        value
            .into_value::<String>()
            .map_err(|e| browser_error("user agent is not a string", e))
    }

    async fn close(mut self: Box<Self>) -> Result<(), BootstrapError> {
        self.page = None;

        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        closed
            .map(|_| ())
            .map_err(|e| browser_error("failed to close browser", e))
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process; the handler task must not outlive it.
        if let Some(task) = self.handler_task.take() {
            tracing::debug!("ChromiumPage dropped without close, aborting CDP handler");
            task.abort();
        }
    }
}
