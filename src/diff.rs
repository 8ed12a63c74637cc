//! Generic three-way structural diff used by the Differential Analyzer.
//!
//! This is a plain value diff, not tied to any particular JSON library's
//! object model beyond `serde_json::Value` — downstream code only ever
//! consumes dotted path strings and old/new scalars.

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub keys_added: BTreeMap<String, Value>,
    pub keys_removed: BTreeMap<String, Value>,
    pub values_changed: BTreeMap<String, (Value, Value)>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.keys_added.is_empty() && self.keys_removed.is_empty() && self.values_changed.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.keys_added
            .keys()
            .chain(self.keys_removed.keys())
            .chain(self.values_changed.keys())
            .map(|s| s.as_str())
    }

    pub fn to_text(&self) -> String {
        let mut parts = Vec::new();
        for (path, value) in &self.keys_added {
            parts.push(format!("+{}={}", path, value));
        }
        for (path, value) in &self.keys_removed {
            parts.push(format!("-{}={}", path, value));
        }
        for (path, (old, new)) in &self.values_changed {
            parts.push(format!("~{}: {}->{}", path, old, new));
        }
        parts.join(", ")
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Array comparison is order-insensitive: two arrays with the same
/// multiset of elements (by JSON text form) diff as equal.
fn arrays_equal_unordered(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted: Vec<String> = a.iter().map(|v| v.to_string()).collect();
    let mut b_sorted: Vec<String> = b.iter().map(|v| v.to_string()).collect();
    a_sorted.sort();
    b_sorted.sort();
    a_sorted == b_sorted
}

fn walk(path: &str, old: &Value, new: &Value, diff: &mut Diff) {
    match (old, new) {
        (Value::Object(o), Value::Object(n)) => {
            for (key, old_value) in o {
                let child_path = join_path(path, key);
                match n.get(key) {
                    Some(new_value) => walk(&child_path, old_value, new_value, diff),
                    None => {
                        diff.keys_removed.insert(child_path, old_value.clone());
                    }
                }
            }
            for (key, new_value) in n {
                if !o.contains_key(key) {
                    diff.keys_added.insert(join_path(path, key), new_value.clone());
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            if !arrays_equal_unordered(a, b) {
                diff.values_changed
                    .insert(path.to_string(), (old.clone(), new.clone()));
            }
        }
        _ => {
            if old != new {
                diff.values_changed
                    .insert(path.to_string(), (old.clone(), new.clone()));
            }
        }
    }
}

/// Computes the structural diff between two parsed JSON values.
pub fn diff_json(old: &Value, new: &Value) -> Diff {
    let mut diff = Diff::default();
    walk("", old, new, &mut diff);
    diff
}

/// Computes the diff for two response bodies, preferring a structural JSON
/// diff and falling back to a single body-level change when either side
/// fails to parse as JSON.
pub fn diff_bodies(old_body: &str, new_body: &str) -> Diff {
    match (
        serde_json::from_str::<Value>(old_body),
        serde_json::from_str::<Value>(new_body),
    ) {
        (Ok(old), Ok(new)) => diff_json(&old, &new),
        _ => {
            let mut diff = Diff::default();
            if old_body != new_body {
                diff.values_changed.insert(
                    "body".to_string(),
                    (Value::String(old_body.to_string()), Value::String(new_body.to_string())),
                );
            }
            diff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_added_and_removed_keys() {
        let old = json!({"a": 1, "b": 2});
        let new = json!({"a": 1, "c": 3});
        let diff = diff_json(&old, &new);
        assert!(diff.keys_removed.contains_key("b"));
        assert!(diff.keys_added.contains_key("c"));
    }

    #[test]
    fn detects_nested_value_change() {
        let old = json!({"user": {"role": "member"}});
        let new = json!({"user": {"role": "admin"}});
        let diff = diff_json(&old, &new);
        assert!(diff.values_changed.contains_key("user.role"));
    }

    #[test]
    fn arrays_are_compared_order_insensitively() {
        let old = json!({"tags": ["a", "b"]});
        let new = json!({"tags": ["b", "a"]});
        let diff = diff_json(&old, &new);
        assert!(diff.is_empty());
    }

    #[test]
    fn non_json_bodies_fall_back_to_string_diff() {
        let diff = diff_bodies("plain text", "different text");
        assert!(diff.values_changed.contains_key("body"));
    }
}
