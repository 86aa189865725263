//! Integration tests for the crawler
//!
//! These tests use wiremock for the query endpoint and a scripted browser for bootstraps,
//! and run full jobs end-to-end.

use adlib_harvest::config::{load_config, Config};
use adlib_harvest::crawler::{CrawlJob, Outcome, PaginatedFetcher, Termination};
use adlib_harvest::output::write_report;
use adlib_harvest::session::{BrowserLauncher, BrowserPage, Bootstrapper, LaunchOptions};
use adlib_harvest::{BootstrapError, CrawlError, JobState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Markup carrying all three tokens, with a distinct primary token per bootstrap
fn markup(primary: &str) -> String {
    format!(
        r#"<html><script>["DTSGInitialData",[],{{"token":"{}"}}]</script>
        <script>["LSD",[],{{"token":"lsdTok"}}]</script>
        <input type="hidden" name="jazoest" value="2581" /></html>"#,
        primary
    )
}

/// Hands out one scripted markup per launch and counts launches and closes
struct ScriptedLauncher {
    pages: Mutex<VecDeque<String>>,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    fn new(pages: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }
}

struct ScriptedPage {
    markup: String,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserPage>, BootstrapError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let markup = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BootstrapError::Browser("no more scripted pages".into()))?;
        Ok(Box::new(ScriptedPage {
            markup,
            closes: Arc::clone(&self.closes),
        }))
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), BootstrapError> {
        Ok(())
    }

    async fn cookies(&mut self) -> Result<Vec<(String, String)>, BootstrapError> {
        Ok(vec![("datr".to_string(), "cookie1".to_string())])
    }

    async fn content(&mut self) -> Result<String, BootstrapError> {
        Ok(self.markup.clone())
    }

    async fn user_agent(&mut self) -> Result<String, BootstrapError> {
        Ok("IntegrationAgent/1.0".to_string())
    }

    async fn close(self: Box<Self>) -> Result<(), BootstrapError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Matches requests whose `variables.cursor` equals the given value (or is null)
struct CursorIs(Option<&'static str>);

impl Match for CursorIs {
    fn matches(&self, request: &Request) -> bool {
        let variables = url::form_urlencoded::parse(&request.body)
            .find(|(k, _)| k == "variables")
            .map(|(_, v)| v.into_owned());
        let Some(variables) = variables else {
            return false;
        };
        let Ok(variables) = serde_json::from_str::<Value>(&variables) else {
            return false;
        };
        match self.0 {
            Some(cursor) => variables["cursor"] == cursor,
            None => variables["cursor"].is_null(),
        }
    }
}

fn page_body(ids: &[&str], cursor: Option<&str>) -> Value {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "ad_archive_id": id,
                "page_name": "Shoe Shop",
                "page_id": 1234,
                "start_date": 1700000000,
                "is_active": true,
                "snapshot": { "body": { "text": "Buy shoes" } },
            })
        })
        .collect();

    json!({
        "data": { "ad_library_main": { "search_results_connection": {
            "edges": [ { "node": { "collated_results": results } } ],
            "page_info": {
                "end_cursor": cursor.unwrap_or("STALE"),
                "has_next_page": cursor.is_some(),
            },
        } } }
    })
}

/// Creates a test configuration pointing at the mock server with all delays zeroed
fn create_test_config(server: &MockServer, output_dir: &str) -> Config {
    let mut config = Config::default();
    config.api.endpoint = format!("{}/api/graphql/", server.uri());
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 0;
    config.retry.min_request_delay_ms = 0;
    config.bootstrap.settle_delay_ms = 0;
    config.bootstrap.cooldown_ms = 0;
    config.crawl.page_delay_ms = 0;
    config.output.directory = output_dir.to_string();
    config
}

fn build_job(config: Config, launcher: Arc<ScriptedLauncher>, target: usize) -> CrawlJob {
    let config = Arc::new(config);
    let fetcher = PaginatedFetcher::new(&config).unwrap();
    let bootstrapper = Bootstrapper::new(launcher, Arc::clone(&config), None);
    CrawlJob::new(
        "shoes",
        target,
        &config.crawl,
        Arc::new(bootstrapper),
        Arc::new(fetcher),
    )
}

#[tokio::test]
async fn test_full_crawl_two_pages() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/graphql/"))
        .and(CursorIs(None))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["1", "2", "3"], Some("C1"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/graphql/"))
        .and(CursorIs(Some("C1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["4", "5"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let launcher = ScriptedLauncher::new(vec![markup("dtsg1")]);
    let config = create_test_config(&mock_server, &out.path().display().to_string());
    let report = build_job(config, launcher.clone(), 5).run().await;

    assert_eq!(report.count(), 5);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.rebootstraps, 0);
    assert_eq!(report.final_state, JobState::Completed);
    assert_eq!(report.outcome(), Outcome::Full);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.closes.load(Ordering::SeqCst), 1);

    let first = &report.records[0];
    assert_eq!(first.id.as_deref(), Some("1"));
    assert_eq!(first.owner_id.as_deref(), Some("1234"));
    assert_eq!(first.start_time, Some(1700000000));
    assert_eq!(first.snapshot["snapshot"]["body"]["text"], "Buy shoes");

    let path = write_report(&report, Some("hash"), out.path()).unwrap();
    let doc: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(doc["count"], 5);
    assert_eq!(doc["outcome"], "full");
    assert_eq!(doc["ads"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_expired_session_rebootstraps_and_resumes() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(CursorIs(None))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["1", "2", "3"], Some("C1"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The first session is rejected on page two
    Mock::given(method("POST"))
        .and(CursorIs(Some("C1")))
        .and(body_string_contains("fb_dtsg=dtsg1"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The replacement session resumes from the same cursor
    Mock::given(method("POST"))
        .and(CursorIs(Some("C1")))
        .and(body_string_contains("fb_dtsg=dtsg2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["4", "5"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let launcher = ScriptedLauncher::new(vec![markup("dtsg1"), markup("dtsg2")]);
    let config = create_test_config(&mock_server, &out.path().display().to_string());
    let report = build_job(config, launcher.clone(), 10).run().await;

    assert_eq!(report.rebootstraps, 1);
    assert_eq!(report.count(), 5);
    assert_eq!(report.pages_fetched, 2);
    assert!(matches!(report.termination, Termination::NoMorePages));
    assert_eq!(report.final_state, JobState::Completed);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    assert_eq!(launcher.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_secondary_token_fails_without_fetching() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["1"], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let no_lsd = r#"<script>["DTSGInitialData",[],{"token":"dtsg1"}]</script>"#.to_string();
    let launcher = ScriptedLauncher::new(vec![no_lsd]);
    let config = create_test_config(&mock_server, &out.path().display().to_string());
    let report = build_job(config, launcher.clone(), 5).run().await;

    assert_eq!(report.final_state, JobState::Failed);
    assert_eq!(report.outcome(), Outcome::Empty);
    assert_eq!(report.pages_fetched, 0);
    assert!(matches!(
        report.termination.error(),
        Some(CrawlError::Bootstrap(BootstrapError::TokenMissing { .. }))
    ));
    assert_eq!(launcher.closes.load(Ordering::SeqCst), 1);
    assert!(out.path().join("debug_bootstrap.html").exists());
}

#[tokio::test]
async fn test_rate_limit_exhaustion_keeps_partial_records() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(CursorIs(None))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["1", "2"], Some("C1"))))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(CursorIs(Some("C1")))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let launcher = ScriptedLauncher::new(vec![markup("dtsg1")]);
    let config = create_test_config(&mock_server, &out.path().display().to_string());
    let report = build_job(config, launcher, 10).run().await;

    assert_eq!(report.count(), 2);
    assert_eq!(report.outcome(), Outcome::Partial);
    assert_eq!(report.final_state, JobState::Failed);
    assert_eq!(report.rebootstraps, 0);
}

#[tokio::test]
async fn test_job_from_config_file() {
    let mock_server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(body_string_contains("doc_id=4242"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["1", "2"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[api]
endpoint = "{}/api/graphql/"
doc-id = "4242"

[retry]
max-attempts = 2
base-delay-ms = 0
min-request-delay-ms = 0

[bootstrap]
settle-delay-ms = 0
cooldown-ms = 0

[crawl]
page-delay-ms = 0

[output]
directory = "{}"
"#,
        mock_server.uri(),
        out.path().display()
    )
    .unwrap();
    file.flush().unwrap();

    let config = load_config(file.path()).unwrap();
    let launcher = ScriptedLauncher::new(vec![markup("dtsg1")]);
    let report = build_job(config, launcher, 5).run().await;

    assert_eq!(report.count(), 2);
    assert_eq!(report.outcome(), Outcome::Partial);
    assert!(matches!(report.termination, Termination::NoMorePages));
}
