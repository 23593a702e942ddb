// ABOUTME: Executes single patch operations against a JSON content tree
// ABOUTME: Replace, add (array append or container insert), remove and RFC 7386 merge

use crs_core::PatchOperation;
use serde_json::{Map, Value};

use crate::error::{PatchError, Result};
use crate::pointer::{parse_index, parse_pointer, resolve_mut, split_last, APPEND_TOKEN};

/// Apply one operation to `root` in place.
///
/// On error `root` may be partially modified; callers work on a scratch copy.
pub fn apply_operation(root: &mut Value, op: &PatchOperation) -> Result<()> {
    let path = op.path();
    let tokens = parse_pointer(path)?;

    match op {
        PatchOperation::Replace { value, .. } => replace(root, &tokens, path, value.clone()),
        PatchOperation::Add { value, .. } => add(root, &tokens, path, value.clone()),
        PatchOperation::Remove { .. } => remove(root, &tokens, path),
        PatchOperation::Merge { value, .. } => {
            let target = resolve_mut(root, &tokens, path)?;
            if !target.is_object() {
                return Err(PatchError::TypeConflict {
                    path: path.to_string(),
                    expected: "object",
                });
            }
            if !value.is_object() {
                return Err(PatchError::TypeConflict {
                    path: path.to_string(),
                    expected: "object merge value",
                });
            }
            merge_patch(target, value);
            Ok(())
        }
        PatchOperation::Unsupported { raw } => {
            Err(PatchError::UnsupportedOperation(raw.to_string()))
        }
    }
}

/// Apply every operation in order, stopping at the first failure
pub fn apply_all(root: &mut Value, ops: &[PatchOperation]) -> Result<()> {
    for op in ops {
        apply_operation(root, op)?;
    }
    Ok(())
}

fn replace(root: &mut Value, tokens: &[String], path: &str, value: Value) -> Result<()> {
    let Some((parent_tokens, last)) = split_last(tokens) else {
        *root = value;
        return Ok(());
    };

    match resolve_mut(root, parent_tokens, path)? {
        Value::Object(map) => match map.get_mut(last) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PatchError::PathNotFound(path.to_string())),
        },
        Value::Array(items) => {
            let index = parse_index(last, path)?;
            let len = items.len();
            match items.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(PatchError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len,
                }),
            }
        }
        _ => Err(PatchError::TypeConflict {
            path: path.to_string(),
            expected: "object or array parent",
        }),
    }
}

fn add(root: &mut Value, tokens: &[String], path: &str, value: Value) -> Result<()> {
    let Some((parent_tokens, last)) = split_last(tokens) else {
        *root = value;
        return Ok(());
    };

    match resolve_mut(root, parent_tokens, path)? {
        Value::Object(map) => {
            // An existing array under the key receives the item
            match map.get_mut(last) {
                Some(Value::Array(items)) => items.push(value),
                _ => {
                    map.insert(last.to_string(), value);
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            if last == APPEND_TOKEN {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(last, path)?;
            if index > items.len() {
                return Err(PatchError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchError::TypeConflict {
            path: path.to_string(),
            expected: "object or array parent",
        }),
    }
}

fn remove(root: &mut Value, tokens: &[String], path: &str) -> Result<()> {
    let Some((parent_tokens, last)) = split_last(tokens) else {
        return Err(PatchError::InvalidPointer(
            "cannot remove the document root".to_string(),
        ));
    };

    match resolve_mut(root, parent_tokens, path)? {
        Value::Object(map) => map
            .remove(last)
            .map(|_| ())
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let index = parse_index(last, path)?;
            if index >= items.len() {
                return Err(PatchError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            items.remove(index);
            Ok(())
        }
        _ => Err(PatchError::TypeConflict {
            path: path.to_string(),
            expected: "object or array parent",
        }),
    }
}

/// RFC 7386 merge: objects merge recursively, `null` deletes, anything else replaces
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, patch_value) in patch_map {
            if patch_value.is_null() {
                target_map.remove(key);
            } else {
                let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                merge_patch(entry, patch_value);
            }
        }
    }
}
