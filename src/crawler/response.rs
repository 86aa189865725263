//! Response decoding, classification and normalization
//!
//! This module turns a raw response into either a flat page of records or a
//! [`FetchError`] describing how the fetcher should react.

use crate::FetchError;
use flate2::read::{GzDecoder, ZlibDecoder};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io::Read;

/// Opaque continuation marker for the next page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single library entry, flattened
///
/// The projected fields keep the endpoint's names in serialized form; `snapshot` holds the
/// complete original record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    #[serde(rename = "ad_archive_id")]
    pub id: Option<String>,

    #[serde(rename = "page_name")]
    pub owner_name: Option<String>,

    #[serde(rename = "page_id")]
    pub owner_id: Option<String>,

    #[serde(rename = "start_date")]
    pub start_time: Option<i64>,

    #[serde(rename = "end_date")]
    pub end_time: Option<i64>,

    #[serde(rename = "is_active")]
    pub active: Option<bool>,

    pub snapshot: Value,
}

impl AdRecord {
    /// Projects the known fields out of a raw result record
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            id: string_field(raw, "ad_archive_id"),
            owner_name: string_field(raw, "page_name"),
            owner_id: string_field(raw, "page_id"),
            start_time: timestamp_field(raw, "start_date"),
            end_time: timestamp_field(raw, "end_date"),
            active: raw.get("is_active").and_then(Value::as_bool),
            snapshot: raw.clone(),
        }
    }
}

/// Reads a field as a string, stringifying numeric identifiers
fn string_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a field as a unix timestamp, accepting numeric strings
fn timestamp_field(raw: &Value, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One successfully fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub records: Vec<AdRecord>,

    /// Present only when the server reported more pages
    pub next_cursor: Option<Cursor>,
}

/// Result of one page fetch
pub type FetchResult = Result<FetchedPage, FetchError>;

/// Classifies a transport-level status
///
/// Returns `None` for success statuses. Evaluated in priority order: rate limit, server
/// error, forbidden, anything else.
pub fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(FetchError::RateLimited)
    } else if status.is_server_error() {
        Some(FetchError::ServerError {
            status: status.as_u16(),
        })
    } else if status == StatusCode::FORBIDDEN {
        Some(FetchError::SessionExpired)
    } else if status != StatusCode::OK {
        Some(FetchError::FatalPage {
            status: status.as_u16(),
        })
    } else {
        None
    }
}

/// Classifies the `errors` list of a decoded payload
///
/// Any entry carrying `throttle_code` makes the whole response a rate limit; otherwise the
/// first entry is reported as a query error.
pub fn classify_payload(payload: &Value, throttle_code: i64) -> Option<FetchError> {
    let errors = payload.get("errors")?;
    let entries: Vec<&Value> = match errors {
        Value::Array(entries) => entries.iter().collect(),
        Value::Null => return None,
        other => vec![other],
    };

    if entries
        .iter()
        .any(|e| e.get("code").and_then(Value::as_i64) == Some(throttle_code))
    {
        return Some(FetchError::RateLimited);
    }

    let first = entries.first();
    Some(FetchError::GraphQl {
        code: first.and_then(|e| e.get("code")).and_then(Value::as_i64),
        message: first
            .and_then(|e| e.get("message").or_else(|| e.get("summary")))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    })
}

/// Decodes a response body into JSON
///
/// Tries, in order: plain JSON, gzip, zlib, and finally a lossy UTF-8 reading of the raw
/// bytes. Fails with [`FetchError::MalformedPayload`] only when all four fail.
pub fn decode_body(body: &[u8]) -> Result<Value, FetchError> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return Ok(value);
    }

    if let Some(value) = inflate_json(GzDecoder::new(body)) {
        tracing::debug!("Decoded gzip-compressed payload");
        return Ok(value);
    }

    if let Some(value) = inflate_json(ZlibDecoder::new(body)) {
        tracing::debug!("Decoded zlib-compressed payload");
        return Ok(value);
    }

    let lossy = String::from_utf8_lossy(body);
    serde_json::from_str(lossy.trim_start_matches('\u{feff}').trim()).map_err(|e| {
        FetchError::MalformedPayload(format!("{} ({} bytes)", e, body.len()))
    })
}

fn inflate_json(mut decoder: impl Read) -> Option<Value> {
    let mut inflated = Vec::new();
    decoder.read_to_end(&mut inflated).ok()?;
    serde_json::from_slice(&inflated).ok()
}

/// Flattens the nested connection structure into a page of records
///
/// Walks `data.ad_library_main.search_results_connection.edges[].node.collated_results[]`.
/// Missing intermediate objects count as empty. The cursor is reported only when
/// `page_info.has_next_page` is true, whatever `end_cursor` holds.
pub fn normalize_page(payload: &Value) -> FetchedPage {
    let connection = payload
        .pointer("/data/ad_library_main/search_results_connection")
        .unwrap_or(&Value::Null);

    let records: Vec<AdRecord> = connection
        .get("edges")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|edge| edge.pointer("/node/collated_results"))
        .filter_map(Value::as_array)
        .flatten()
        .map(AdRecord::from_raw)
        .collect();

    let page_info = connection.get("page_info").unwrap_or(&Value::Null);
    let has_next_page = page_info
        .get("has_next_page")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let next_cursor = if has_next_page {
        page_info
            .get("end_cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(Cursor::new)
    } else {
        None
    };

    FetchedPage {
        records,
        next_cursor,
    }
}
