//! Test Generator (stage 3): synthesizes adversarial TestCases from the
//! enriched Endpoint set.
//!
//! Four classes are emitted per endpoint, in a fixed order (IDOR,
//! AUTH_BYPASS, METHOD_CONFUSION, MASS_ASSIGNMENT), then the concatenation
//! is truncated to `config.max_tests_per_endpoint`. Selection is driven by
//! a `StdRng` seeded from `config.seed`, so the same input and seed always
//! produce the same output.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::config::Config;
use crate::model::{Endpoint, TestCase, TestType};
use crate::vocab::{is_destructive, name_matches_id_vocab, METHODS, SUSPICIOUS_FIELDS};

struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    fn new() -> Self {
        Self { next: 0 }
    }

    fn next_id(&mut self) -> String {
        let id = format!("test_{:06}", self.next);
        self.next += 1;
        id
    }
}

/// All IDPools in the endpoint set, grouped by pool name but keeping each
/// contributing endpoint's values distinguishable, so a target id can be
/// preferred from an endpoint other than the one under test — the whole
/// point of a *cross*-endpoint IDOR probe. Two structurally unrelated
/// endpoints can land on the same pool name (names are purely positional,
/// `param_{i}`), so "union by name" alone isn't enough to find a foreign
/// value; provenance has to survive the merge.
struct PoolUnion {
    by_name: BTreeMap<String, Vec<(usize, Vec<String>)>>,
}

impl PoolUnion {
    fn build(endpoints: &[Endpoint]) -> Self {
        let mut by_name: BTreeMap<String, Vec<(usize, Vec<String>)>> = BTreeMap::new();
        for (idx, endpoint) in endpoints.iter().enumerate() {
            for (name, pool) in &endpoint.id_pools {
                by_name.entry(name.clone()).or_default().push((idx, pool.all_values()));
            }
        }
        Self { by_name }
    }

    /// Values for `name` contributed by endpoints other than `exclude_idx`.
    fn foreign_values(&self, name: &str, exclude_idx: usize) -> Vec<String> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter(|(idx, _)| *idx != exclude_idx)
            .flat_map(|(_, values)| values.iter().cloned())
            .collect()
    }

    /// Values under every pool name other than `exclude_name`, in stable
    /// name order.
    fn other_named_values(&self, exclude_name: &str) -> Vec<String> {
        self.by_name
            .iter()
            .filter(|(name, _)| name.as_str() != exclude_name)
            .flat_map(|(_, contributions)| contributions.iter().flat_map(|(_, v)| v.iter().cloned()))
            .collect()
    }
}

fn concretize_path(templated_path: &str, target_id: &str) -> String {
    templated_path
        .split('/')
        .map(|seg| match seg {
            "{id:int}" | "{id:uuid}" | "{param}" => target_id,
            other => other,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn substitute_body_ids(body: &Value, source_pool_name: &str, target_id: &str) -> Value {
    let Value::Object(map) = body else {
        return body.clone();
    };
    let mut out = map.clone();
    for (key, value) in out.iter_mut() {
        if key.eq_ignore_ascii_case(source_pool_name) || name_matches_id_vocab(key) {
            *value = Value::String(target_id.to_string());
        }
    }
    Value::Object(out)
}

fn generate_idor(
    endpoint_idx: usize,
    endpoint: &Endpoint,
    union: &PoolUnion,
    config: &Config,
    rng: &mut StdRng,
    ids: &mut IdGenerator,
) -> Vec<TestCase> {
    if endpoint.id_pools.is_empty() {
        return Vec::new();
    }
    let own_pools: Vec<(&String, &crate::model::IdPool)> = endpoint.id_pools.iter().collect();
    let mut out = Vec::new();

    for i in 0..config.idor_count {
        let (source_name, source_pool) = own_pools[i % own_pools.len()];
        let values = source_pool.all_values();
        if values.is_empty() {
            continue;
        }
        let original_id = &values[rng.gen_range(0..values.len())];

        // Prefer a value another endpoint contributed under the same pool
        // name — the genuine cross-object reference probe. Only fall back
        // to a value from an unrelated pool name if no such foreign value
        // exists for this name.
        let mut target_id = union
            .foreign_values(source_name, endpoint_idx)
            .into_iter()
            .find(|v| v != original_id);
        if target_id.is_none() {
            target_id = union
                .other_named_values(source_name)
                .into_iter()
                .find(|v| v != original_id);
        }
        let Some(target_id) = target_id else {
            break;
        };

        let url = format!(
            "{}{}",
            endpoint.origin,
            concretize_path(&endpoint.templated_path, &target_id)
        );
        let body = endpoint
            .sample_bodies
            .first()
            .map(|b| substitute_body_ids(b, source_name, &target_id));

        out.push(TestCase {
            test_id: ids.next_id(),
            test_type: TestType::Idor,
            templated_path: endpoint.templated_path.clone(),
            method: endpoint.method.clone(),
            url,
            headers: None,
            body,
            use_session: true,
            description: format!(
                "substitute {} -> {} on {} {}",
                original_id, target_id, endpoint.method, endpoint.templated_path
            ),
        });
    }

    out
}

fn generate_auth_bypass(endpoint: &Endpoint, config: &Config, ids: &mut IdGenerator) -> Vec<TestCase> {
    let url = format!("{}{}", endpoint.origin, endpoint.templated_path);
    (0..config.auth_bypass_count)
        .map(|_| TestCase {
            test_id: ids.next_id(),
            test_type: TestType::AuthBypass,
            templated_path: endpoint.templated_path.clone(),
            method: endpoint.method.clone(),
            url: url.clone(),
            headers: None,
            body: endpoint.sample_bodies.first().cloned(),
            use_session: false,
            description: format!(
                "replay {} {} without session material",
                endpoint.method, endpoint.templated_path
            ),
        })
        .collect()
}

fn generate_method_confusion(
    endpoint: &Endpoint,
    config: &Config,
    ids: &mut IdGenerator,
) -> Vec<TestCase> {
    let url = format!("{}{}", endpoint.origin, endpoint.templated_path);
    let mut out = Vec::new();
    for &method in METHODS {
        if out.len() >= config.method_confusion_count {
            break;
        }
        if method.eq_ignore_ascii_case(&endpoint.method) {
            continue;
        }
        if !config.allow_destructive && is_destructive(method) {
            continue;
        }
        let body = if matches!(method, "POST" | "PUT" | "PATCH") {
            endpoint.sample_bodies.first().cloned()
        } else {
            None
        };
        out.push(TestCase {
            test_id: ids.next_id(),
            test_type: TestType::MethodConfusion,
            templated_path: endpoint.templated_path.clone(),
            method: method.to_string(),
            url: url.clone(),
            headers: None,
            body,
            use_session: true,
            description: format!(
                "{} against {} (observed as {})",
                method, endpoint.templated_path, endpoint.method
            ),
        });
    }
    out
}

fn mass_assignment_value(field: &str) -> Value {
    let lower = field.to_lowercase();
    if lower.contains("admin") || lower.starts_with("is") {
        Value::Bool(true)
    } else if lower.contains("role") {
        Value::String("admin".to_string())
    } else if lower.contains("permission") || lower.contains("access") {
        Value::String("full".to_string())
    } else {
        Value::Bool(true)
    }
}

fn generate_mass_assignment(
    endpoint: &Endpoint,
    config: &Config,
    ids: &mut IdGenerator,
) -> Vec<TestCase> {
    if !matches!(endpoint.method.as_str(), "POST" | "PUT" | "PATCH") {
        return Vec::new();
    }
    let url = format!("{}{}", endpoint.origin, endpoint.templated_path);
    let base = endpoint
        .sample_bodies
        .first()
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    SUSPICIOUS_FIELDS
        .iter()
        .take(config.mass_assignment_count)
        .map(|&field| {
            let mut obj = match &base {
                Value::Object(map) => map.clone(),
                _ => Default::default(),
            };
            obj.insert(field.to_string(), mass_assignment_value(field));
            TestCase {
                test_id: ids.next_id(),
                test_type: TestType::MassAssignment,
                templated_path: endpoint.templated_path.clone(),
                method: endpoint.method.clone(),
                url: url.clone(),
                headers: None,
                body: Some(Value::Object(obj)),
                use_session: true,
                description: format!("inject privileged field `{}`", field),
            }
        })
        .collect()
}

/// Generates the full TestCase set for every endpoint, in stable order.
pub fn generate_tests(endpoints: &[Endpoint], config: &Config) -> Vec<TestCase> {
    let union = PoolUnion::build(endpoints);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut ids = IdGenerator::new();
    let mut all = Vec::new();

    for (idx, endpoint) in endpoints.iter().enumerate() {
        let mut tests = generate_idor(idx, endpoint, &union, config, &mut rng, &mut ids);
        tests.extend(generate_auth_bypass(endpoint, config, &mut ids));
        tests.extend(generate_method_confusion(endpoint, config, &mut ids));
        tests.extend(generate_mass_assignment(endpoint, config, &mut ids));
        tests.truncate(config.max_tests_per_endpoint);
        all.extend(tests);
    }

    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IdPool, ParameterMap};

    fn endpoint(method: &str, path: &str) -> Endpoint {
        Endpoint {
            method: method.to_string(),
            templated_path: path.to_string(),
            origin: "https://api.example.com".to_string(),
            parameters: ParameterMap::default(),
            sample_bodies: vec![],
            id_pools: Default::default(),
        }
    }

    #[test]
    fn idor_requires_at_least_one_pool() {
        let endpoints = vec![endpoint("GET", "/api/users/{id:int}")];
        let config = Config::default();
        let tests = generate_tests(&endpoints, &config);
        assert!(tests.iter().all(|t| t.test_type != TestType::Idor));
    }

    #[test]
    fn idor_concretizes_against_origin_not_just_path() {
        let mut ep1 = endpoint("GET", "/api/users/{id:int}");
        let mut pool = IdPool::new("param_3", "path");
        pool.insert_int(42);
        ep1.id_pools.insert("param_3".to_string(), pool);

        let mut ep2 = endpoint("GET", "/api/orders/{id:int}");
        let mut pool2 = IdPool::new("param_3", "path");
        pool2.insert_int(99);
        ep2.id_pools.insert("param_3".to_string(), pool2);

        let config = Config::default();
        let tests = generate_tests(&[ep1, ep2], &config);
        let idor = tests.iter().find(|t| t.test_type == TestType::Idor).unwrap();
        assert!(idor.url.starts_with("https://api.example.com/"));
    }

    #[test]
    fn idor_prefers_foreign_value_when_pool_names_collide() {
        // Two structurally unrelated endpoints both produce a positional
        // pool name of `param_1`; the generator must still be able to pull
        // `100` from the sibling endpoint as an IDOR target for `/users`,
        // not just shuffle within `/users`'s own {1, 2}.
        let mut users = endpoint("GET", "/users/{id:int}");
        let mut users_pool = IdPool::new("param_1", "path");
        users_pool.insert_int(1);
        users_pool.insert_int(2);
        users.id_pools.insert("param_1".to_string(), users_pool);

        let mut projects = endpoint("GET", "/projects/{id:int}");
        let mut projects_pool = IdPool::new("param_1", "path");
        projects_pool.insert_int(100);
        projects.id_pools.insert("param_1".to_string(), projects_pool);

        let mut config = Config::default();
        config.idor_count = 20;
        let tests = generate_tests(&[users, projects], &config);
        assert!(tests
            .iter()
            .any(|t| t.test_type == TestType::Idor && t.url.ends_with("/users/100")));
    }

    #[test]
    fn method_confusion_excludes_delete_by_default() {
        let endpoints = vec![endpoint("GET", "/api/ping")];
        let config = Config::default();
        let tests = generate_tests(&endpoints, &config);
        assert!(tests
            .iter()
            .filter(|t| t.test_type == TestType::MethodConfusion)
            .all(|t| t.method != "DELETE"));
    }

    #[test]
    fn mass_assignment_only_for_write_methods() {
        let endpoints = vec![endpoint("GET", "/api/users/{id:int}")];
        let config = Config::default();
        let tests = generate_tests(&endpoints, &config);
        assert!(tests.iter().all(|t| t.test_type != TestType::MassAssignment));
    }

    #[test]
    fn global_cap_truncates_in_class_order() {
        let mut ep = endpoint("POST", "/api/widgets");
        let mut pool = IdPool::new("widget_id", "path");
        pool.insert_int(1);
        ep.id_pools.insert("widget_id".to_string(), pool);
        let mut other = endpoint("POST", "/api/gadgets");
        let mut pool2 = IdPool::new("widget_id", "path");
        pool2.insert_int(2);
        other.id_pools.insert("widget_id".to_string(), pool2);

        let mut config = Config::default();
        config.max_tests_per_endpoint = 3;
        let tests = generate_tests(&[ep, other], &config);
        let first_endpoint_tests: Vec<_> = tests
            .iter()
            .filter(|t| t.templated_path == "/api/widgets")
            .collect();
        assert_eq!(first_endpoint_tests.len(), 3);
        assert_eq!(first_endpoint_tests[0].test_type, TestType::Idor);
    }
}
