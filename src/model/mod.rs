//! Core data model shared by every stage of the pipeline.
//!
//! Every entity here is serialized to one of the durable JSON artifacts
//! (requests.json, endpoints.json, tests.json, test_results.json,
//! findings.json) and is immutable once constructed.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cap applied to the number of distinct values tracked per parameter.
pub const MAX_PARAM_VALUES: usize = 10;
/// Cap applied to the number of sample bodies retained per endpoint.
pub const MAX_SAMPLE_BODIES: usize = 5;
/// Cap applied to each IDPool bucket.
pub const MAX_POOL_BUCKET: usize = 20;

/// One observed HTTP response, as embedded in a CapturedRequest or produced
/// by the replay engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub status: u16,
    #[serde(default, rename = "status_text")]
    pub status_text: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

/// One observed HTTP request/response pair from the capture log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub post_data: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub response: Option<CapturedResponse>,
}

/// Marker prefix the capture stage uses to signal a truncated body.
/// Bodies carrying it are treated as opaque text, never re-parsed past it.
pub const TRUNCATION_MARKER_PREFIX: &str = "\n... (truncated,";

/// Per-location, per-name inventory of observed parameter values, capped at
/// [`MAX_PARAM_VALUES`] distinct values per name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParameterMap {
    #[serde(default)]
    pub path: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub query: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: BTreeMap<String, Vec<String>>,
}

impl ParameterMap {
    pub fn record(&mut self, location: ParamLocation, name: &str, value: String) {
        let bucket = match location {
            ParamLocation::Path => &mut self.path,
            ParamLocation::Query => &mut self.query,
            ParamLocation::Body => &mut self.body,
        };
        let values = bucket.entry(name.to_string()).or_default();
        if values.len() < MAX_PARAM_VALUES && !values.contains(&value) {
            values.push(value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Body => "body",
        }
    }
}

/// A distinct (method, templated_path) shape observed in the capture log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: String,
    pub templated_path: String,
    /// Scheme + authority of an observed request to this endpoint (e.g.
    /// `https://api.example.com`), retained so the generator can
    /// concretize an absolute URL rather than a host-less path.
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub parameters: ParameterMap,
    #[serde(default)]
    pub sample_bodies: Vec<Value>,
    #[serde(default)]
    pub id_pools: BTreeMap<String, IdPool>,
}

impl Endpoint {
    pub fn key(&self) -> (String, String) {
        (self.method.clone(), self.templated_path.clone())
    }
}

/// The inferred type of an IDPool, derived from bucket precedence
/// int > uuid > string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Int,
    Uuid,
    String,
}

/// A per-parameter grouping of observed identifier values, bucketed by
/// classification. Buckets are disjoint; each is capped at
/// [`MAX_POOL_BUCKET`] distinct values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdPool {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub integers: BTreeSet<i64>,
    #[serde(default)]
    pub uuids: BTreeSet<String>,
    #[serde(default)]
    pub strings: BTreeSet<String>,
}

impl IdPool {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            integers: BTreeSet::new(),
            uuids: BTreeSet::new(),
            strings: BTreeSet::new(),
        }
    }

    pub fn inferred_type(&self) -> Option<IdKind> {
        if !self.integers.is_empty() {
            Some(IdKind::Int)
        } else if !self.uuids.is_empty() {
            Some(IdKind::Uuid)
        } else if !self.strings.is_empty() {
            Some(IdKind::String)
        } else {
            None
        }
    }

    pub fn insert_int(&mut self, v: i64) {
        if self.integers.len() < MAX_POOL_BUCKET {
            self.integers.insert(v);
        }
    }

    pub fn insert_uuid(&mut self, v: String) {
        if self.uuids.len() < MAX_POOL_BUCKET {
            self.uuids.insert(v);
        }
    }

    pub fn insert_string(&mut self, v: String) {
        if self.strings.len() < MAX_POOL_BUCKET {
            self.strings.insert(v);
        }
    }

    pub fn merge(&mut self, other: &IdPool) {
        for v in &other.integers {
            self.insert_int(*v);
        }
        for v in &other.uuids {
            self.insert_uuid(v.clone());
        }
        for v in &other.strings {
            self.insert_string(v.clone());
        }
    }

    /// All values as strings, in a stable order (integers, then uuids, then
    /// strings), for uses that don't care about bucket identity.
    pub fn all_values(&self) -> Vec<String> {
        let mut out: Vec<String> = self.integers.iter().map(|v| v.to_string()).collect();
        out.extend(self.uuids.iter().cloned());
        out.extend(self.strings.iter().cloned());
        out
    }

    pub fn is_empty(&self) -> bool {
        self.integers.is_empty() && self.uuids.is_empty() && self.strings.is_empty()
    }
}

/// One of the four adversarial test classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestType {
    #[serde(rename = "IDOR")]
    Idor,
    #[serde(rename = "AUTH_BYPASS")]
    AuthBypass,
    #[serde(rename = "METHOD_CONFUSION")]
    MethodConfusion,
    #[serde(rename = "MASS_ASSIGNMENT")]
    MassAssignment,
}

/// A planned adversarial request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    pub test_type: TestType,
    pub templated_path: String,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub use_session: bool,
    pub description: String,
}

/// The outcome of replaying one TestCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub test_type: TestType,
    pub method: String,
    pub url: String,
    pub timestamp: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CapturedResponse>,
}

/// Severity of a Finding, as decided by the severity decision procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The analyzer's verdict on one TestCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub finding_id: String,
    pub severity: Severity,
    pub test_id: String,
    pub test_type: TestType,
    pub method: String,
    pub url: String,
    pub baseline_status: u16,
    pub test_status: u16,
    pub diff_summary: String,
    pub reproduction_command: String,
}

/// Session material supplied to the replay engine: cookies and extra
/// headers loaded from optional JSON files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMaterial {
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}
