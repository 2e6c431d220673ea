//! Canonical form for JSON trees.
//!
//! Objects keep their insertion order when parsed, so two documents that
//! differ only in key order serialize differently. [`normalize`] sorts every
//! object's keys recursively; arrays keep their order.

use serde_json::{Map, Value};

/// Returns a copy of `value` with every object's keys sorted ascending.
#[must_use]
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> =
                entries.into_iter().map(|(k, v)| (k.clone(), normalize(v))).collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        scalar => scalar.clone(),
    }
}

/// Serializes the canonical form of `value`.
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    // Serializing a `Value` cannot fail: keys are strings and numbers are finite.
    serde_json::to_string(&normalize(value)).unwrap_or_default()
}

/// Cheap equality check: true when both trees have the same canonical form.
#[must_use]
pub fn canonical_equals(a: &Value, b: &Value) -> bool {
    canonical_string(a) == canonical_string(b)
}
