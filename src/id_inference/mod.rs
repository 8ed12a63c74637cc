//! ID Inference (stage 2): annotates each Endpoint's parameters with
//! IDPools, the raw material the Test Generator draws identifier values
//! from.
//!
//! A parameter becomes a pool when its name matches the ID vocabulary, or
//! when any observed value looks like an integer or a UUID. This rule is
//! generic over location: path, query, and body parameters are all pooled
//! directly under their own name. Separately, top-level sample-body scalars
//! get a second, stricter pass under a `body.<key>` name (name match AND
//! an int/uuid value required), since a body key and a path/query key of
//! the same name must not be conflated.

use serde_json::Value;

use crate::model::{Endpoint, IdKind, IdPool};
use crate::vocab::{is_integer_literal, is_uuid_literal, name_matches_id_vocab};

fn classify_str(value: &str) -> IdKind {
    if is_integer_literal(value) {
        IdKind::Int
    } else if is_uuid_literal(value) {
        IdKind::Uuid
    } else {
        IdKind::String
    }
}

fn insert_classified(pool: &mut IdPool, value: &str) {
    match classify_str(value) {
        IdKind::Int => {
            if let Ok(n) = value.parse::<i64>() {
                pool.insert_int(n);
            }
        }
        IdKind::Uuid => pool.insert_uuid(value.to_string()),
        IdKind::String => pool.insert_string(value.to_string()),
    }
}

fn should_pool(name: &str, values: &[String]) -> bool {
    name_matches_id_vocab(name) || values.iter().any(|v| classify_str(v) != IdKind::String)
}

/// Annotates every Endpoint in place with its inferred `id_pools`.
pub fn infer_ids(endpoints: &mut [Endpoint]) {
    for endpoint in endpoints.iter_mut() {
        for (name, values) in endpoint.parameters.path.iter() {
            if should_pool(name, values) {
                let pool = endpoint
                    .id_pools
                    .entry(name.clone())
                    .or_insert_with(|| IdPool::new(name.clone(), "path"));
                for v in values {
                    insert_classified(pool, v);
                }
            }
        }

        for (name, values) in endpoint.parameters.query.iter() {
            if should_pool(name, values) {
                let pool = endpoint
                    .id_pools
                    .entry(name.clone())
                    .or_insert_with(|| IdPool::new(name.clone(), "query"));
                for v in values {
                    insert_classified(pool, v);
                }
            }
        }

        for (name, values) in endpoint.parameters.body.iter() {
            if should_pool(name, values) {
                let pool = endpoint
                    .id_pools
                    .entry(name.clone())
                    .or_insert_with(|| IdPool::new(name.clone(), "body"));
                for v in values {
                    insert_classified(pool, v);
                }
            }
        }

        for body in &endpoint.sample_bodies {
            let Value::Object(map) = body else { continue };
            for (key, value) in map {
                if !name_matches_id_vocab(key) {
                    continue;
                }
                let Some((kind, insert_value)) = classify_json_scalar(value) else {
                    continue;
                };
                let pool_name = format!("body.{}", key);
                let pool = endpoint
                    .id_pools
                    .entry(pool_name.clone())
                    .or_insert_with(|| IdPool::new(pool_name.clone(), "body"));
                match kind {
                    IdKind::Int => {
                        if let Ok(n) = insert_value.parse::<i64>() {
                            pool.insert_int(n);
                        }
                    }
                    IdKind::Uuid => pool.insert_uuid(insert_value),
                    IdKind::String => {}
                }
            }
        }

        endpoint.id_pools.retain(|_, pool| !pool.is_empty());
    }
}

fn classify_json_scalar(value: &Value) -> Option<(IdKind, String)> {
    match value {
        Value::Number(n) => n.as_i64().map(|v| (IdKind::Int, v.to_string())),
        Value::String(s) => {
            if is_uuid_literal(s) {
                Some((IdKind::Uuid, s.clone()))
            } else if is_integer_literal(s) {
                Some((IdKind::Int, s.clone()))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterMap;

    fn endpoint_with_path_param(name: &str, values: Vec<&str>) -> Endpoint {
        let mut params = ParameterMap::default();
        for v in values {
            params.record(crate::model::ParamLocation::Path, name, v.to_string());
        }
        Endpoint {
            method: "GET".to_string(),
            templated_path: "/api/users/{id:int}".to_string(),
            origin: "https://api.example.com".to_string(),
            parameters: params,
            sample_bodies: vec![],
            id_pools: Default::default(),
        }
    }

    #[test]
    fn integer_values_create_int_pool() {
        let mut endpoints = vec![endpoint_with_path_param("param_3", vec!["42", "43"])];
        infer_ids(&mut endpoints);
        let pool = endpoints[0].id_pools.get("param_3").unwrap();
        assert_eq!(pool.inferred_type(), Some(IdKind::Int));
        assert!(pool.integers.contains(&42));
        assert!(pool.integers.contains(&43));
    }

    #[test]
    fn name_matching_vocab_pools_even_non_id_looking_values() {
        let mut endpoints = vec![endpoint_with_path_param("user_id", vec!["bob"])];
        infer_ids(&mut endpoints);
        let pool = endpoints[0].id_pools.get("user_id").unwrap();
        assert_eq!(pool.inferred_type(), Some(IdKind::String));
    }

    #[test]
    fn non_id_param_is_not_pooled() {
        let mut endpoints = vec![endpoint_with_path_param("sort", vec!["asc", "desc"])];
        infer_ids(&mut endpoints);
        assert!(endpoints[0].id_pools.is_empty());
    }

    #[test]
    fn body_parameter_matching_vocab_is_pooled_under_its_own_name() {
        let mut params = ParameterMap::default();
        params.record(crate::model::ParamLocation::Body, "user_id", "bob".to_string());
        let endpoint = Endpoint {
            method: "POST".to_string(),
            templated_path: "/api/users".to_string(),
            origin: "https://api.example.com".to_string(),
            parameters: params,
            sample_bodies: vec![],
            id_pools: Default::default(),
        };
        let mut endpoints = vec![endpoint];
        infer_ids(&mut endpoints);
        let pool = endpoints[0].id_pools.get("user_id").unwrap();
        assert_eq!(pool.inferred_type(), Some(IdKind::String));
        assert!(!endpoints[0].id_pools.contains_key("body.user_id"));
    }

    #[test]
    fn sample_body_ids_are_pooled_under_body_prefix() {
        let mut endpoint = endpoint_with_path_param("q", vec!["x"]);
        endpoint.sample_bodies = vec![serde_json::json!({"owner_id": 7, "note": "hi"})];
        let mut endpoints = vec![endpoint];
        infer_ids(&mut endpoints);
        let pool = endpoints[0].id_pools.get("body.owner_id").unwrap();
        assert!(pool.integers.contains(&7));
        assert!(!endpoints[0].id_pools.contains_key("body.note"));
    }
}
