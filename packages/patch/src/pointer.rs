// ABOUTME: JSON pointer parsing and resolution over serde_json values
// ABOUTME: Used by the operation executor to find targets and their parent containers

use crs_core::utils::unescape_pointer_token;
use serde_json::Value;

use crate::error::{PatchError, Result};

/// Token meaning "one past the end" of an array
pub const APPEND_TOKEN: &str = "-";

/// Split a pointer into unescaped reference tokens. `""` is the root.
pub fn parse_pointer(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
    Ok(rest.split('/').map(unescape_pointer_token).collect())
}

/// Parse an array index token, rejecting leading zeros and signs like RFC 6901 does
pub fn parse_index(token: &str, path: &str) -> Result<usize> {
    let valid = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !valid {
        return Err(PatchError::TypeConflict {
            path: path.to_string(),
            expected: "array index",
        });
    }
    token
        .parse::<usize>()
        .map_err(|_| PatchError::InvalidPointer(path.to_string()))
}

/// Walk `tokens` from `root` and return the value they point at
pub fn resolve_mut<'a>(root: &'a mut Value, tokens: &[String], path: &str) -> Result<&'a mut Value> {
    let mut current = root;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let index = parse_index(token, path)?;
                let len = items.len();
                items.get_mut(index).ok_or(PatchError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len,
                })?
            }
            _ => {
                return Err(PatchError::TypeConflict {
                    path: path.to_string(),
                    expected: "object or array",
                })
            }
        };
    }
    Ok(current)
}

/// Split tokens into the parent's tokens and the last token
pub fn split_last(tokens: &[String]) -> Option<(&[String], &str)> {
    tokens
        .split_last()
        .map(|(last, parent)| (parent, last.as_str()))
}
