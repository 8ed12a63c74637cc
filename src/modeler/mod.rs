//! Endpoint Modeler (stage 1): collapses a captured HTTP log into the
//! minimal set of Endpoints with templated paths and parameter inventories.
//!
//! Grouping happens in two passes. First, each captured request is reduced
//! to a coarse shape key (method + path with every digit-only or UUID
//! segment replaced by a wildcard marker) so that e.g. `/api/users/42` and
//! `/api/users/43` land in the same bucket even though their paths differ
//! literally. Second, within each bucket, the exact per-segment template is
//! derived from the actual observed values, applying the int > uuid > param
//! precedence rule.

use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::model::{CapturedRequest, Endpoint, ParamLocation, ParameterMap, MAX_SAMPLE_BODIES};
use crate::vocab::{is_integer_literal, is_uuid_literal};

struct GroupMember {
    segments: Vec<String>,
    url: Url,
    post_data: String,
}

struct Group {
    method: String,
    members: Vec<GroupMember>,
}

fn shape_key(method: &str, segments: &[String]) -> String {
    let normalized: Vec<&str> = segments
        .iter()
        .enumerate()
        .map(|(i, seg)| {
            if i == 0 {
                seg.as_str()
            } else if is_integer_literal(seg) || is_uuid_literal(seg) {
                "*"
            } else {
                seg.as_str()
            }
        })
        .collect();
    format!("{}:{}", method.to_uppercase(), normalized.join("/"))
}

/// Splits a URL path into its real segments, discarding the leading empty
/// component a raw `"/a/b".split('/')` would otherwise produce. Segment 0
/// is therefore the first real path component (e.g. `api`), not an empty
/// sentinel — see SPEC_FULL.md §9 on the source's segment-0 sentinel bug.
fn segments_of(url: &Url) -> Vec<String> {
    url.path()
        .trim_start_matches('/')
        .split('/')
        .map(|s| s.to_string())
        .collect()
}

/// Builds the Endpoint set from a capture log. Requests without a response
/// are skipped entirely; requests with an unparseable URL are skipped with
/// a debug log.
pub fn model_endpoints(requests: &[CapturedRequest]) -> Vec<Endpoint> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Group> = std::collections::HashMap::new();

    for req in requests {
        if req.response.is_none() {
            continue;
        }
        let url = match Url::parse(&req.url) {
            Ok(u) => u,
            Err(e) => {
                debug!(url = %req.url, error = %e, "skipping request with unparseable URL");
                continue;
            }
        };
        let method = req.method.to_uppercase();
        let segments = segments_of(&url);
        let key = shape_key(&method, &segments);

        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Group {
                method: method.clone(),
                members: Vec::new(),
            }
        });
        group.members.push(GroupMember {
            segments,
            url,
            post_data: req.post_data.clone(),
        });
    }

    order
        .into_iter()
        .map(|key| {
            let group = groups.remove(&key).expect("key present");
            build_endpoint(group)
        })
        .collect()
}

fn origin_of(url: &Url) -> String {
    let mut origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{}", port));
    }
    origin
}

fn build_endpoint(group: Group) -> Endpoint {
    let origin = origin_of(&group.members[0].url);
    let template_len = group.members[0].segments.len();
    let uniform_len = group
        .members
        .iter()
        .all(|m| m.segments.len() == template_len);

    let mut templated_segments: Vec<String> = Vec::with_capacity(template_len);
    let mut variable_indices: Vec<usize> = Vec::new();

    for i in 0..template_len {
        if i == 0 {
            templated_segments.push(group.members[0].segments[0].clone());
            continue;
        }

        if !uniform_len {
            // A segment position that doesn't exist on every member is, by
            // definition, a point of structural variation.
            if group.members.iter().any(|m| m.segments.len() <= i) {
                templated_segments.push("{param}".to_string());
                variable_indices.push(i);
                continue;
            }
        }

        let values: Vec<&str> = group
            .members
            .iter()
            .filter_map(|m| m.segments.get(i).map(|s| s.as_str()))
            .collect();

        if values.iter().any(|v| is_integer_literal(v)) {
            templated_segments.push("{id:int}".to_string());
            variable_indices.push(i);
        } else if values.iter().any(|v| is_uuid_literal(v)) {
            templated_segments.push("{id:uuid}".to_string());
            variable_indices.push(i);
        } else if values.iter().any(|v| *v != values[0]) {
            templated_segments.push("{param}".to_string());
            variable_indices.push(i);
        } else {
            templated_segments.push(values[0].to_string());
        }
    }

    let templated_path = format!("/{}", templated_segments.join("/"));

    let mut parameters = ParameterMap::default();
    let mut sample_bodies: Vec<Value> = Vec::new();

    for member in &group.members {
        for &i in &variable_indices {
            if let Some(seg) = member.segments.get(i) {
                parameters.record(ParamLocation::Path, &format!("param_{}", i), seg.clone());
            }
        }

        for (name, value) in member.url.query_pairs() {
            parameters.record(ParamLocation::Query, &name, value.into_owned());
        }

        if !member.post_data.is_empty() {
            match serde_json::from_str::<Value>(&member.post_data) {
                Ok(Value::Object(map)) => {
                    for (key, value) in &map {
                        if let Some(scalar) = scalar_to_string(value) {
                            parameters.record(ParamLocation::Body, key, scalar);
                        }
                    }
                    let body_value = Value::Object(map);
                    if sample_bodies.len() < MAX_SAMPLE_BODIES
                        && !sample_bodies.contains(&body_value)
                    {
                        sample_bodies.push(body_value);
                    }
                }
                Ok(_) => {
                    debug!("request body parsed as non-object JSON, skipping parameter extraction");
                }
                Err(_) => {
                    debug!("request body failed JSON parse, contributes only path/query params");
                }
            }
        }
    }

    Endpoint {
        method: group.method,
        templated_path,
        origin,
        parameters,
        sample_bodies,
        id_pools: Default::default(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CapturedResponse;

    fn req(method: &str, url: &str) -> CapturedRequest {
        CapturedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: Default::default(),
            post_data: String::new(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            response: Some(CapturedResponse {
                status: 200,
                status_text: "OK".to_string(),
                headers: Default::default(),
                body: "{}".to_string(),
            }),
        }
    }

    #[test]
    fn template_inference_groups_int_ids() {
        let requests = vec![
            req("GET", "https://api.example.com/api/users/42"),
            req("GET", "https://api.example.com/api/users/43"),
        ];
        let endpoints = model_endpoints(&requests);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].templated_path, "/api/users/{id:int}");
        let values = endpoints[0].parameters.path.get("param_2").unwrap();
        assert!(values.contains(&"42".to_string()));
        assert!(values.contains(&"43".to_string()));
    }

    #[test]
    fn int_beats_uuid_when_sibling_segments_differ() {
        let requests = vec![
            req(
                "GET",
                "https://api.example.com/x/550e8400-e29b-41d4-a716-446655440000",
            ),
            req("GET", "https://api.example.com/x/7"),
        ];
        let endpoints = model_endpoints(&requests);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].templated_path, "/x/{id:int}");
    }

    #[test]
    fn request_without_response_is_skipped() {
        let mut r = req("GET", "https://api.example.com/api/ping");
        r.response = None;
        let endpoints = model_endpoints(&[r]);
        assert!(endpoints.is_empty());
    }

    #[test]
    fn leading_segment_is_structural_not_param() {
        let requests = vec![req("GET", "https://api.example.com/health")];
        let endpoints = model_endpoints(&requests);
        assert_eq!(endpoints[0].templated_path, "/health");
    }

    #[test]
    fn body_with_invalid_json_contributes_nothing_to_body_params() {
        let mut r1 = req("POST", "https://api.example.com/api/orders");
        r1.post_data = "{not json".to_string();
        let mut r2 = req("POST", "https://api.example.com/api/orders");
        r2.post_data = r#"{"qty": 3}"#.to_string();
        let endpoints = model_endpoints(&[r1, r2]);
        assert_eq!(endpoints.len(), 1);
        assert!(endpoints[0].parameters.body.contains_key("qty"));
    }
}
