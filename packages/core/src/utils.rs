// ABOUTME: Shared JSON utilities for CRS content
// ABOUTME: Emptiness checks, JSON pointer token escaping and serialized sizes

use serde::Serialize;
use serde_json::Value;

/// Whether a value counts as "nothing to show" in the document pane
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Escape a single reference token per RFC 6901
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_pointer_token`]
pub fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Append one token to a JSON pointer
pub fn join_pointer(base: &str, token: &str) -> String {
    format!("{}/{}", base, escape_pointer_token(token))
}

/// Byte length of the JSON serialization of `value`, 0 if it cannot serialize
pub fn serialized_len<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}
