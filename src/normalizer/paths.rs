//! Candidate key-path resolution over loosely-shaped provider JSON.
//!
//! Each canonical field lists the paths where known provider shapes keep it.
//! Paths are tried in order and the first non-blank value wins. A numeric
//! segment indexes into an array.

use serde_json::Value;

/// A path into nested JSON, e.g. `&["prices", "price"]`.
pub type KeyPath = &'static [&'static str];

pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(*key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// First candidate that resolves to a non-blank value.
pub fn first_present<'a>(value: &'a Value, candidates: &[KeyPath]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|v| !is_blank(v))
}

/// Render a scalar as trimmed text; numbers are accepted as ids and volumes
/// are often numeric.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First candidate that resolves to a non-empty scalar, as text.
pub fn first_text(value: &Value, candidates: &[KeyPath]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(as_text)
}

/// Names from the first candidate holding a list. Entries may be plain
/// strings or objects carrying a `name`.
pub fn first_names(value: &Value, candidates: &[KeyPath]) -> Vec<String> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter_map(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::Object(map) => map.get("name").and_then(as_text),
                    other => as_text(other),
                })
                .collect::<Vec<_>>()
        })
        .find(|names| !names.is_empty())
        .unwrap_or_default()
}
