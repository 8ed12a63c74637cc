//! Replay Engine (stage 4): executes every TestCase as an HTTP request
//! under a bounded concurrency and a global rate ceiling.
//!
//! Concurrency is bounded by a semaphore (mirroring the DAG executor's
//! worker-pool pattern elsewhere in this codebase); the global rate limit
//! is a mutex-protected serial spacer, not a token bucket, so the minimum
//! inter-request interval is enforced regardless of how many workers are
//! racing for the next slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::{Config, RESEARCHER_HEADER_NAME, RESEARCHER_HEADER_VALUE};
use crate::model::{CapturedResponse, SessionMaterial, TestCase, TestResult};

/// Serializes request dispatch to at most one per `1/rate` seconds,
/// globally across every worker.
struct RateSpacer {
    last_slot: Mutex<Instant>,
}

impl RateSpacer {
    fn new() -> Self {
        Self {
            last_slot: Mutex::new(Instant::now() - Duration::from_secs(3600)),
        }
    }

    async fn acquire(&self, min_interval: Duration) {
        let wait_until = {
            let mut last = self.last_slot.lock().await;
            let now = Instant::now();
            let candidate = if *last + min_interval > now {
                *last + min_interval
            } else {
                now
            };
            *last = candidate;
            candidate
        };
        let now = Instant::now();
        if wait_until > now {
            tokio::time::sleep(wait_until - now).await;
        }
    }
}

fn truncate_body(body: String, max_bytes: usize) -> String {
    if body.len() <= max_bytes {
        return body;
    }
    let mut cut = max_bytes;
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }
    let omitted = body.len() - cut;
    let mut truncated = body[..cut].to_string();
    truncated.push_str(&format!(
        "{} {} bytes omitted)",
        crate::model::TRUNCATION_MARKER_PREFIX,
        omitted
    ));
    truncated
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
        warn!(header = name, "skipping header with invalid name or value");
        return;
    };
    headers.insert(name, value);
}

async fn execute_one(
    client: Client,
    test: TestCase,
    session: Arc<SessionMaterial>,
    config: Arc<Config>,
) -> TestResult {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let method = match Method::from_bytes(test.method.as_bytes()) {
        Ok(m) => m,
        Err(e) => {
            return TestResult {
                test_id: test.test_id,
                test_type: test.test_type,
                method: test.method,
                url: test.url,
                timestamp,
                success: false,
                error: Some(format!("Unexpected error: invalid method ({e})")),
                response: None,
            }
        }
    };

    // Layered header defaults: researcher identification, then session
    // material, then test-specific overrides. Each layer must be able to
    // override the previous one for the same header name (the researcher
    // header and a captured browser session both set `User-Agent`), so
    // this builds a HeaderMap with `insert` rather than chaining
    // `RequestBuilder::header()`, which appends instead of replacing.
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, RESEARCHER_HEADER_NAME, RESEARCHER_HEADER_VALUE);
    for (name, value) in &session.headers {
        insert_header(&mut headers, name, value);
    }
    if test.use_session && !session.cookies.is_empty() {
        let cookie_header = session
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ");
        insert_header(&mut headers, "Cookie", &cookie_header);
    }
    if let Some(test_headers) = &test.headers {
        for (name, value) in test_headers {
            insert_header(&mut headers, name, value);
        }
    }

    let mut builder = client
        .request(method.clone(), &test.url)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .headers(headers);

    if let Some(body) = &test.body {
        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
            builder = builder.json(body);
        }
    }

    match builder.send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let status_text = resp
                .status()
                .canonical_reason()
                .unwrap_or_default()
                .to_string();
            let headers = resp
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect();
            let body_text = resp.text().await.unwrap_or_default();
            TestResult {
                test_id: test.test_id,
                test_type: test.test_type,
                method: test.method,
                url: test.url,
                timestamp,
                success: true,
                error: None,
                response: Some(CapturedResponse {
                    status,
                    status_text,
                    headers,
                    body: truncate_body(body_text, config.max_body_bytes),
                }),
            }
        }
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() || e.is_request() {
                format!("Request error: {e}")
            } else {
                format!("Unexpected error: {e}")
            };
            TestResult {
                test_id: test.test_id,
                test_type: test.test_type,
                method: test.method,
                url: test.url,
                timestamp,
                success: false,
                error: Some(error),
                response: None,
            }
        }
    }
}

fn cancelled_result(test: TestCase) -> TestResult {
    TestResult {
        test_id: test.test_id,
        test_type: test.test_type,
        method: test.method,
        url: test.url,
        timestamp: chrono::Utc::now().to_rfc3339(),
        success: false,
        error: Some("cancelled".to_string()),
        response: None,
    }
}

/// Replays every TestCase, respecting `config.concurrency` and
/// `config.rate_per_sec`. Never panics or propagates a per-request
/// failure: every input produces exactly one TestResult. If `cancel` is
/// set before a task is dispatched, no further tasks are started; each
/// un-dispatched test still materializes as a TestResult with
/// `success=false` and a cancellation error, so `|results| = |tests|`
/// holds on a cancelled run the same as an uninterrupted one. Already
/// in-flight requests are allowed to finish and their real results are
/// returned.
pub async fn replay_tests(
    tests: Vec<TestCase>,
    config: Config,
    session: SessionMaterial,
    cancel: Arc<AtomicBool>,
) -> Vec<TestResult> {
    let client = Client::new();
    let config = Arc::new(config);
    let session = Arc::new(session);
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let rate = Arc::new(RateSpacer::new());
    let min_interval = Duration::from_secs_f64(1.0 / config.rate_per_sec.max(0.001));

    let mut joinset: JoinSet<TestResult> = JoinSet::new();
    let mut results = Vec::with_capacity(tests.len());

    let mut tests = tests.into_iter();
    for test in &mut tests {
        if cancel.load(Ordering::Relaxed) {
            debug!("replay cancelled, recording remaining tests as cancelled");
            results.push(cancelled_result(test));
            break;
        }
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
        let client = client.clone();
        let rate = rate.clone();
        let config = config.clone();
        let session = session.clone();

        joinset.spawn(async move {
            rate.acquire(min_interval).await;
            let result = execute_one(client, test, session, config).await;
            drop(permit);
            result
        });
    }

    // If the loop above broke on cancellation, `tests` still holds every
    // test that was never dispatched; each one still owes a TestResult.
    for test in tests {
        results.push(cancelled_result(test));
    }

    while let Some(joined) = joinset.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!(error = %e, "replay task panicked, dropping its result"),
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestType;

    #[test]
    fn truncate_body_adds_marker_past_cap() {
        let body = "a".repeat(100);
        let truncated = truncate_body(body.clone(), 10);
        assert!(truncated.starts_with(&"a".repeat(10)));
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn truncate_body_leaves_short_bodies_untouched() {
        let body = "short".to_string();
        assert_eq!(truncate_body(body.clone(), 100), body);
    }

    #[test]
    fn later_header_layers_override_earlier_ones_for_the_same_name() {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, RESEARCHER_HEADER_NAME, RESEARCHER_HEADER_VALUE);
        insert_header(&mut headers, "User-Agent", "captured-browser/1.0");
        insert_header(&mut headers, "User-Agent", "test-override/1.0");
        assert_eq!(headers.get("User-Agent").unwrap(), "test-override/1.0");
        assert_eq!(headers.len(), 1);
    }

    fn test_case(id: &str) -> TestCase {
        TestCase {
            test_id: id.to_string(),
            test_type: TestType::AuthBypass,
            templated_path: "/x".to_string(),
            method: "GET".to_string(),
            url: "https://example.invalid/x".to_string(),
            headers: None,
            body: None,
            use_session: false,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn cancelling_before_dispatch_still_produces_a_result_per_test() {
        let tests = vec![test_case("test_000000"), test_case("test_000001")];
        let cancel = Arc::new(AtomicBool::new(true));
        let results = replay_tests(tests, Config::default(), SessionMaterial::default(), cancel).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success && r.error.as_deref() == Some("cancelled")));
    }

    #[tokio::test]
    async fn rate_spacer_enforces_minimum_interval() {
        let spacer = RateSpacer::new();
        let min_interval = Duration::from_millis(50);
        let start = Instant::now();
        for _ in 0..5 {
            spacer.acquire(min_interval).await;
        }
        // 5 slots, 4 gaps of >= 50ms between them.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn invalid_method_produces_failed_result_not_panic() {
        let test = TestCase {
            test_id: "test_000000".to_string(),
            test_type: TestType::AuthBypass,
            templated_path: "/x".to_string(),
            method: "NOT A METHOD".to_string(),
            url: "https://example.invalid/x".to_string(),
            headers: None,
            body: None,
            use_session: false,
            description: String::new(),
        };
        let result = execute_one(
            Client::new(),
            test,
            Arc::new(SessionMaterial::default()),
            Arc::new(Config::default()),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unexpected error"));
    }
}
