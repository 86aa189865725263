//! Token extraction from rendered page markup
//!
//! The search page embeds the same credential under several structural forms depending on
//! the page variant served. Each token kind therefore carries an ordered list of strategies;
//! the first strategy that yields a non-empty value wins.

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;

/// The credentials harvested from the search page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Request-signing token (`fb_dtsg`), mandatory
    Primary,

    /// Anti-forgery token (`lsd`), mandatory, also sent as a header
    Secondary,

    /// Numeric verification value (`jazoest`), optional
    Verification,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [Self::Primary, Self::Secondary, Self::Verification];

    /// Form field name the token travels under
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Primary => "fb_dtsg",
            Self::Secondary => "lsd",
            Self::Verification => "jazoest",
        }
    }

    /// Returns true if a session cannot be built without this token
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::Primary | Self::Secondary)
    }

    /// Ordered extraction strategies for this token
    pub fn strategies(&self) -> Vec<TokenStrategy> {
        match self {
            Self::Primary => vec![
                TokenStrategy::ScopedToken {
                    scope: "DTSGInitialData",
                },
                TokenStrategy::NestedToken { key: "dtsg" },
                TokenStrategy::NamedValue { name: "fb_dtsg" },
                TokenStrategy::HiddenInput { name: "fb_dtsg" },
            ],
            Self::Secondary => vec![
                TokenStrategy::ScopedToken { scope: "LSD" },
                TokenStrategy::NamedValue { name: "lsd" },
                TokenStrategy::HiddenInput { name: "lsd" },
            ],
            Self::Verification => vec![
                TokenStrategy::QuotedDigits { key: "jazoest" },
                TokenStrategy::HiddenInput { name: "jazoest" },
            ],
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// One structural form a token may take in the markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStrategy {
    /// `"<scope>" ... "token":"<value>"` on a single line
    ScopedToken { scope: &'static str },

    /// `"<key>":{"token":"<value>"`
    NestedToken { key: &'static str },

    /// `{"name":"<name>","value":"<value>"}`
    NamedValue { name: &'static str },

    /// `"<key>":"<digits>"`
    QuotedDigits { key: &'static str },

    /// `<input name="<name>" value="<value>">`
    HiddenInput { name: &'static str },
}

impl TokenStrategy {
    /// Runs this strategy against the markup
    ///
    /// Returns `None` when the form is absent or the captured value is empty.
    pub fn apply(&self, markup: &str) -> Option<String> {
        let value = match self {
            Self::HiddenInput { name } => hidden_input_value(markup, name),
            _ => {
                let pattern = self.pattern()?;
                let re = Regex::new(&pattern).ok()?;
                re.captures(markup)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            }
        };

        value.filter(|v| !v.is_empty())
    }

    /// The regular expression for text-based strategies
    fn pattern(&self) -> Option<String> {
        let pattern = match self {
            Self::ScopedToken { scope } => format!(
                r#""{}".*?"token":"([^"]+)""#,
                regex::escape(scope)
            ),
            Self::NestedToken { key } => format!(
                r#""{}":\{{"token":"([^"]+)""#,
                regex::escape(key)
            ),
            Self::NamedValue { name } => format!(
                r#"\{{"name":"{}","value":"([^"]+)"\}}"#,
                regex::escape(name)
            ),
            Self::QuotedDigits { key } => format!(r#""{}":"(\d+)""#, regex::escape(key)),
            Self::HiddenInput { .. } => return None,
        };
        Some(pattern)
    }
}

fn hidden_input_value(markup: &str, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"input[name="{}"]"#, name)).ok()?;
    let document = Html::parse_document(markup);

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("value"))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Extracts a single token, trying each of its strategies in order
pub fn extract_token(markup: &str, kind: TokenKind) -> Option<String> {
    kind.strategies()
        .iter()
        .find_map(|strategy| strategy.apply(markup))
}

/// All tokens found in one page render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTokens {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub verification: Option<String>,
}

impl ExtractedTokens {
    pub fn get(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Primary => self.primary.as_deref(),
            TokenKind::Secondary => self.secondary.as_deref(),
            TokenKind::Verification => self.verification.as_deref(),
        }
    }

    /// Token kinds that were found
    pub fn found(&self) -> Vec<TokenKind> {
        TokenKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_some())
            .collect()
    }

    /// Mandatory token kinds that were not found
    pub fn missing_mandatory(&self) -> Vec<TokenKind> {
        TokenKind::ALL
            .into_iter()
            .filter(|kind| kind.is_mandatory() && self.get(*kind).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_mandatory().is_empty()
    }
}

/// Runs the extractor for every token kind
pub fn extract_all(markup: &str) -> ExtractedTokens {
    ExtractedTokens {
        primary: extract_token(markup, TokenKind::Primary),
        secondary: extract_token(markup, TokenKind::Secondary),
        verification: extract_token(markup, TokenKind::Verification),
    }
}
