//! Filter merging and dot-notation query flattening.
//!
//! List and count endpoints take their filters as flat query parameters
//! with dotted keys (`attributes.arc_display_type=door`), while callers
//! and fixtures express them as nested JSON. This module converts between
//! the two and merges caller filters over configured fixture defaults.

use serde_json::{Map, Value};

/// Deep-merge `overlay` onto `base`.
///
/// Nested objects merge key by key with `overlay` winning collisions;
/// any non-object value (arrays included) replaces the base wholesale.
/// Neither input is modified.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, incoming) in overlay {
                let entry = match merged.get(key) {
                    Some(existing) => deep_merge(existing, incoming),
                    None => incoming.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Flatten a nested filter into dot-notation query parameters.
///
/// Nested objects contribute `outer.inner` keys, arrays repeat their key
/// once per element, nulls are skipped and scalars are stringified.
/// Non-objects flatten to nothing.
pub fn dot_params(filter: &Value) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Value::Object(map) = filter {
        flatten_into("", map, &mut params);
    }
    params
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(&path, nested, out),
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        out.push((path.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    out.push((path, text));
                }
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        // Objects and arrays nested inside arrays have no dot-notation form.
        Value::Object(_) | Value::Array(_) => None,
    }
}
