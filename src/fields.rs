//! Lenient field access on model-produced JSON.
//!
//! Models drift between `snake_case` and `camelCase`, send numbers as
//! strings and single strings where lists were asked for. These helpers
//! accept all of those shapes so a usable reply is never rejected on form.

use serde_json::{Map, Value};

/// First present, non-null value among `keys`.
pub(crate) fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// A number, or a string that parses as one (`"82"`, `" 7.5 "`, `"80%"`).
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// A trimmed non-empty string; numbers and booleans are rendered.
pub(crate) fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// A list of strings; a lone string becomes a one-element list.
pub(crate) fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    }
}

/// Text field under any of `keys`, or empty.
pub(crate) fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    field(obj, keys).and_then(text).unwrap_or_default()
}

/// List field under any of `keys`, or empty.
pub(crate) fn list_field(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    field(obj, keys).map(string_list).unwrap_or_default()
}

/// The root object, unwrapping a one-element array some models emit.
pub(crate) fn root_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.first().and_then(Value::as_object),
        _ => None,
    }
}
