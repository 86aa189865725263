//! Page request construction
//!
//! The endpoint expects the session tokens twice: as form fields in the body and, for the
//! secondary token, as a header.

use crate::config::{ApiConfig, QueryConfig};
use crate::crawler::Cursor;
use crate::session::{CrawlSession, TokenKind};
use crate::FetchError;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE,
    COOKIE, ORIGIN, REFERER, USER_AGENT,
};
use serde::Serialize;

/// The serialized `variables` object of a page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryVariables<'a> {
    pub query_string: &'a str,
    pub country: &'a str,
    pub active_status: &'a str,
    pub ad_type: &'a str,
    pub media_type: &'a str,
    pub first: u32,
    /// Serialized as `null` on the first page
    pub cursor: Option<&'a str>,
}

impl<'a> QueryVariables<'a> {
    pub fn new(query: &'a QueryConfig, keyword: &'a str, cursor: Option<&'a Cursor>) -> Self {
        Self {
            query_string: keyword,
            country: &query.country,
            active_status: &query.active_status,
            ad_type: &query.ad_type,
            media_type: &query.media_type,
            first: query.page_size,
            cursor: cursor.map(Cursor::as_str),
        }
    }
}

/// Builds the form fields of a page request
pub fn build_form(
    api: &ApiConfig,
    query: &QueryConfig,
    keyword: &str,
    session: &CrawlSession,
    cursor: Option<&Cursor>,
) -> Result<Vec<(&'static str, String)>, FetchError> {
    let variables = serde_json::to_string(&QueryVariables::new(query, keyword, cursor))
        .map_err(|e| FetchError::InvalidRequest(format!("variables: {}", e)))?;

    let mut form = vec![
        (
            TokenKind::Primary.field_name(),
            session.primary_token().to_string(),
        ),
        (
            TokenKind::Secondary.field_name(),
            session.secondary_token().to_string(),
        ),
        ("fb_api_req_friendly_name", api.friendly_name.clone()),
        ("doc_id", api.doc_id.clone()),
        ("variables", variables),
    ];

    if let Some(verification) = session.verification_token() {
        form.push((TokenKind::Verification.field_name(), verification.to_string()));
    }

    Ok(form)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value)
        .map_err(|_| FetchError::InvalidRequest(format!("invalid value for header {}", name)))
}

/// Builds the headers of a page request
///
/// Compression is refused (`Accept-Encoding: identity`) and the fetch metadata matches a
/// same-origin XHR from the library page.
pub fn build_headers(api: &ApiConfig, session: &CrawlSession) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();

    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers.insert(ORIGIN, header_value("Origin", &api.origin)?);
    headers.insert(REFERER, header_value("Referer", &api.referer)?);
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("x-fb-friendly-name"),
        header_value("X-FB-Friendly-Name", &api.friendly_name)?,
    );
    headers.insert(
        HeaderName::from_static("x-fb-lsd"),
        header_value("X-FB-LSD", session.secondary_token())?,
    );
    headers.insert(USER_AGENT, header_value("User-Agent", session.user_agent())?);

    let cookie_header = session.cookie_header();
    if !cookie_header.is_empty() {
        headers.insert(COOKIE, header_value("Cookie", &cookie_header)?);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ExtractedTokens;

    fn session(verification: Option<&str>) -> CrawlSession {
        CrawlSession::new(
            vec![("datr".to_string(), "abc".to_string())],
            ExtractedTokens {
                primary: Some("dtsg1".to_string()),
                secondary: Some("lsd1".to_string()),
                verification: verification.map(String::from),
            },
            "TestAgent/1.0",
        )
        .unwrap()
    }

    fn field<'a>(form: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_variables_serialization() {
        let query = QueryConfig::default();
        let cursor = Cursor::new("AQHcursor");
        let json = serde_json::to_value(QueryVariables::new(&query, "shoes", Some(&cursor)))
            .unwrap();

        assert_eq!(json["queryString"], "shoes");
        assert_eq!(json["country"], "US");
        assert_eq!(json["activeStatus"], "ACTIVE");
        assert_eq!(json["adType"], "ALL");
        assert_eq!(json["mediaType"], "ALL");
        assert_eq!(json["first"], 30);
        assert_eq!(json["cursor"], "AQHcursor");
    }

    #[test]
    fn test_first_page_cursor_is_null() {
        let query = QueryConfig::default();
        let json = serde_json::to_value(QueryVariables::new(&query, "shoes", None)).unwrap();
        assert!(json["cursor"].is_null());
    }

    #[test]
    fn test_build_form_fields() {
        let form = build_form(
            &ApiConfig::default(),
            &QueryConfig::default(),
            "shoes",
            &session(Some("2581")),
            None,
        )
        .unwrap();

        assert_eq!(field(&form, "fb_dtsg"), Some("dtsg1"));
        assert_eq!(field(&form, "lsd"), Some("lsd1"));
        assert_eq!(
            field(&form, "fb_api_req_friendly_name"),
            Some("AdLibrarySearchPaginationQuery")
        );
        assert_eq!(field(&form, "doc_id"), Some("25464068859919530"));
        assert_eq!(field(&form, "jazoest"), Some("2581"));
        assert!(field(&form, "variables").unwrap().contains("\"queryString\":\"shoes\""));
    }

    #[test]
    fn test_build_form_without_verification() {
        let form = build_form(
            &ApiConfig::default(),
            &QueryConfig::default(),
            "shoes",
            &session(None),
            None,
        )
        .unwrap();
        assert_eq!(field(&form, "jazoest"), None);
    }

    #[test]
    fn test_build_headers() {
        let headers = build_headers(&ApiConfig::default(), &session(None)).unwrap();

        assert_eq!(headers["x-fb-lsd"], "lsd1");
        assert_eq!(headers["x-fb-friendly-name"], "AdLibrarySearchPaginationQuery");
        assert_eq!(headers[ACCEPT_ENCODING], "identity");
        assert_eq!(headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert_eq!(headers[USER_AGENT], "TestAgent/1.0");
        assert_eq!(headers[COOKIE], "datr=abc");
        assert_eq!(headers["sec-fetch-site"], "same-origin");
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let bad = CrawlSession::new(
            Vec::<(String, String)>::new(),
            ExtractedTokens {
                primary: Some("dtsg".to_string()),
                secondary: Some("bad\nvalue".to_string()),
                verification: None,
            },
            "UA",
        )
        .unwrap();

        let err = build_headers(&ApiConfig::default(), &bad).unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
    }
}
