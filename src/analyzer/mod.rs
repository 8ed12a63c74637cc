//! Differential Analyzer (stage 5): compares each successful TestResult
//! against a captured baseline response and, when the comparison is
//! interesting, emits a Finding with a severity and reproduction command.

use std::collections::HashMap;

use crate::config::Config;
use crate::diff::{diff_bodies, Diff};
use crate::model::{CapturedRequest, Finding, Severity, TestCase, TestResult, TestType};
use crate::vocab::name_matches_sensitive_vocab;

struct BaselineIndex<'a> {
    by_url_method: HashMap<(String, String), &'a CapturedRequest>,
    first_by_method: HashMap<String, &'a CapturedRequest>,
}

impl<'a> BaselineIndex<'a> {
    fn build(captured: &'a [CapturedRequest]) -> Self {
        let mut by_url_method = HashMap::new();
        let mut first_by_method = HashMap::new();
        for req in captured {
            if req.response.is_none() {
                continue;
            }
            let method = req.method.to_uppercase();
            by_url_method
                .entry((req.url.clone(), method.clone()))
                .or_insert(req);
            first_by_method.entry(method).or_insert(req);
        }
        Self {
            by_url_method,
            first_by_method,
        }
    }

    fn lookup(&self, url: &str, method: &str) -> Option<&'a CapturedRequest> {
        let method = method.to_uppercase();
        self.by_url_method
            .get(&(url.to_string(), method.clone()))
            .or_else(|| self.first_by_method.get(&method))
            .copied()
    }
}

fn severity_for(
    baseline_status: u16,
    test_status: u16,
    test_type: TestType,
    diff: &Diff,
    baseline_len: usize,
    test_len: usize,
    config: &Config,
) -> Severity {
    let auth_gate_bypass = matches!(baseline_status, 401 | 403 | 404) && matches!(test_status, 200 | 201 | 204);
    if auth_gate_bypass {
        return Severity::High;
    }

    if diff.paths().any(name_matches_sensitive_vocab) {
        return Severity::High;
    }

    if test_type == TestType::Idor && baseline_status == 200 && test_status == 200 && !diff.is_empty() {
        return Severity::High;
    }

    if matches!(baseline_status, 400 | 404) && matches!(test_status, 200 | 201 | 204) {
        return Severity::Medium;
    }

    if baseline_len > 0 {
        let delta = (test_len as f64 - baseline_len as f64).abs() / baseline_len as f64;
        if delta > config.length_diff_threshold {
            return Severity::Medium;
        }
    }

    if baseline_status == 200 && test_status == 200 && !diff.is_empty() {
        return Severity::Medium;
    }

    if !diff.is_empty() {
        return Severity::Low;
    }

    Severity::Low
}

fn build_reproduction_command(test: &TestCase, response_headers: &HashMap<String, String>) -> String {
    let mut cmd = format!("curl -X {} '{}'", test.method, test.url);
    let mut header_names: Vec<&String> = response_headers.keys().collect();
    header_names.sort();
    for name in header_names {
        let lower = name.to_lowercase();
        if lower == "content-length" || lower == "host" {
            continue;
        }
        cmd.push_str(&format!(" -H '{}: {}'", name, response_headers[name]));
    }
    if let Some(body) = &test.body {
        if let Ok(serialized) = serde_json::to_string(body) {
            cmd.push_str(&format!(" -d '{}'", serialized));
        }
    }
    cmd
}

/// Produces Findings in test-generation order, with stable `finding_{n}`
/// identifiers starting at 1.
pub fn analyze(
    captured: &[CapturedRequest],
    tests: &[TestCase],
    results: &[TestResult],
    config: &Config,
) -> Vec<Finding> {
    let baseline_index = BaselineIndex::build(captured);
    let results_by_id: HashMap<&str, &TestResult> =
        results.iter().map(|r| (r.test_id.as_str(), r)).collect();

    let mut findings = Vec::new();
    let mut next_id = 1usize;

    for test in tests {
        let Some(result) = results_by_id.get(test.test_id.as_str()) else {
            continue;
        };
        if !result.success {
            continue;
        }
        let Some(test_response) = &result.response else {
            continue;
        };
        let Some(baseline) = baseline_index.lookup(&result.url, &result.method) else {
            continue;
        };
        let Some(baseline_response) = &baseline.response else {
            continue;
        };

        let diff = diff_bodies(&baseline_response.body, &test_response.body);
        let severity = severity_for(
            baseline_response.status,
            test_response.status,
            test.test_type,
            &diff,
            baseline_response.body.len(),
            test_response.body.len(),
            config,
        );

        let diff_text = diff.to_text();
        let diff_summary: String = diff_text.chars().take(500).collect();

        findings.push(Finding {
            finding_id: format!("finding_{}", next_id),
            severity,
            test_id: test.test_id.clone(),
            test_type: test.test_type,
            method: result.method.clone(),
            url: result.url.clone(),
            baseline_status: baseline_response.status,
            test_status: test_response.status,
            diff_summary,
            reproduction_command: build_reproduction_command(test, &test_response.headers),
        });
        next_id += 1;
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CapturedResponse;

    fn captured(method: &str, url: &str, status: u16, body: &str) -> CapturedRequest {
        CapturedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: Default::default(),
            post_data: String::new(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            response: Some(CapturedResponse {
                status,
                status_text: "OK".to_string(),
                headers: Default::default(),
                body: body.to_string(),
            }),
        }
    }

    fn test_case(id: &str, test_type: TestType, method: &str, url: &str) -> TestCase {
        TestCase {
            test_id: id.to_string(),
            test_type,
            templated_path: "/x".to_string(),
            method: method.to_string(),
            url: url.to_string(),
            headers: None,
            body: None,
            use_session: true,
            description: String::new(),
        }
    }

    fn result(id: &str, test_type: TestType, method: &str, url: &str, status: u16, body: &str) -> TestResult {
        TestResult {
            test_id: id.to_string(),
            test_type,
            method: method.to_string(),
            url: url.to_string(),
            timestamp: "2026-01-01T00:00:01Z".to_string(),
            success: true,
            error: None,
            response: Some(CapturedResponse {
                status,
                status_text: "OK".to_string(),
                headers: Default::default(),
                body: body.to_string(),
            }),
        }
    }

    #[test]
    fn auth_gate_bypass_is_high() {
        let captured = vec![captured("GET", "https://api.example.com/x", 401, "")];
        let tests = vec![test_case("test_000000", TestType::AuthBypass, "GET", "https://api.example.com/x")];
        let results = vec![result("test_000000", TestType::AuthBypass, "GET", "https://api.example.com/x", 200, "{}")];
        let findings = analyze(&captured, &tests, &results, &Config::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].finding_id, "finding_1");
    }

    #[test]
    fn missing_baseline_produces_no_finding() {
        let captured = vec![];
        let tests = vec![test_case("test_000000", TestType::AuthBypass, "GET", "https://api.example.com/x")];
        let results = vec![result("test_000000", TestType::AuthBypass, "GET", "https://api.example.com/x", 200, "{}")];
        let findings = analyze(&captured, &tests, &results, &Config::default());
        assert!(findings.is_empty());
    }

    #[test]
    fn idor_same_status_with_diff_is_high() {
        let captured = vec![captured(
            "GET",
            "https://api.example.com/orders/1",
            200,
            r#"{"owner_id": 1}"#,
        )];
        let tests = vec![test_case(
            "test_000000",
            TestType::Idor,
            "GET",
            "https://api.example.com/orders/1",
        )];
        let results = vec![result(
            "test_000000",
            TestType::Idor,
            "GET",
            "https://api.example.com/orders/1",
            200,
            r#"{"owner_id": 2}"#,
        )];
        let findings = analyze(&captured, &tests, &results, &Config::default());
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn sensitive_field_change_is_high_even_without_status_change() {
        let captured = vec![captured(
            "PATCH",
            "https://api.example.com/users/1",
            200,
            r#"{"user":"a","role":"user"}"#,
        )];
        let tests = vec![test_case(
            "test_000000",
            TestType::MassAssignment,
            "PATCH",
            "https://api.example.com/users/1",
        )];
        let results = vec![result(
            "test_000000",
            TestType::MassAssignment,
            "PATCH",
            "https://api.example.com/users/1",
            200,
            r#"{"user":"a","role":"admin"}"#,
        )];
        let findings = analyze(&captured, &tests, &results, &Config::default());
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn failed_result_is_skipped() {
        let captured = vec![captured("GET", "https://api.example.com/x", 200, "{}")];
        let tests = vec![test_case("test_000000", TestType::AuthBypass, "GET", "https://api.example.com/x")];
        let mut failed = result("test_000000", TestType::AuthBypass, "GET", "https://api.example.com/x", 0, "");
        failed.success = false;
        failed.response = None;
        let findings = analyze(&captured, &tests, &[failed], &Config::default());
        assert!(findings.is_empty());
    }
}
