//! Session acquisition
//!
//! This module covers everything needed to obtain a usable session:
//! - Token extraction from rendered markup
//! - Proxy descriptor parsing
//! - The browser automation boundary and its Chromium implementation
//! - The bootstrapper that ties them together

mod bootstrap;
mod browser;
mod proxy;
mod tokens;

pub use bootstrap::{search_url, truncate_markup, Bootstrapper, SessionProvider};
pub use browser::{BrowserLauncher, BrowserPage, ChromiumLauncher, ChromiumPage, LaunchOptions};
pub use proxy::ProxyDescriptor;
pub use tokens::{extract_all, extract_token, ExtractedTokens, TokenKind, TokenStrategy};

use crate::BootstrapError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Cookies and tokens authenticating page requests
///
/// A session only exists when both mandatory tokens are non-empty. It is never mutated:
/// re-acquisition replaces it wholesale.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    cookies: BTreeMap<String, String>,
    primary_token: String,
    secondary_token: String,
    verification_token: Option<String>,
    user_agent: String,
    created_at: DateTime<Utc>,
}

impl CrawlSession {
    /// Builds a session from harvested material
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSession)` - Both mandatory tokens were present
    /// * `Err(BootstrapError::TokenMissing)` - A mandatory token was absent or empty
    pub fn new(
        cookies: impl IntoIterator<Item = (String, String)>,
        tokens: ExtractedTokens,
        user_agent: impl Into<String>,
    ) -> Result<Self, BootstrapError> {
        let missing = tokens.missing_mandatory();
        let found = tokens.found();

        match (tokens.primary, tokens.secondary) {
            (Some(primary), Some(secondary)) if missing.is_empty() => Ok(Self {
                cookies: cookies.into_iter().collect(),
                primary_token: primary,
                secondary_token: secondary,
                verification_token: tokens.verification,
                user_agent: user_agent.into(),
                created_at: Utc::now(),
            }),
            _ => Err(BootstrapError::TokenMissing { found, missing }),
        }
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// Cookies formatted for a `Cookie` request header
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn primary_token(&self) -> &str {
        &self.primary_token
    }

    pub fn secondary_token(&self) -> &str {
        &self.secondary_token
    }

    pub fn verification_token(&self) -> Option<&str> {
        self.verification_token.as_deref()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Shortens a secret for log output
pub(crate) fn token_preview(token: &str, len: usize) -> String {
    let cut = token
        .char_indices()
        .nth(len)
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    format!("{}...", &token[..cut])
}
