// ABOUTME: Structural edit operations computed server-side against CRS content
// ABOUTME: Each operation targets a JSON pointer path into the content tree

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Replace the existing value at `path`
    Replace { path: String, value: Value },
    /// Append to the array at `path`, or insert into the parent container
    Add { path: String, value: Value },
    /// Remove the value at `path`
    Remove { path: String },
    /// RFC 7386 merge of `value` into the object at `path`
    Merge { path: String, value: Value },
    /// An operation this client cannot execute, kept verbatim.
    /// Applying it always fails, which forces a full-content fallback.
    #[serde(skip_deserializing)]
    Unsupported { raw: Value },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            Self::Replace { path, .. }
            | Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Merge { path, .. } => path,
            Self::Unsupported { raw } => raw.get("path").and_then(Value::as_str).unwrap_or(""),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Replace { .. } => "replace",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Merge { .. } => "merge",
            Self::Unsupported { .. } => "unsupported",
        }
    }

    /// Decode one operation, keeping anything unrecognized as [`Self::Unsupported`]
    pub fn from_value_lenient(value: Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(op) => op,
            Err(_) => Self::Unsupported { raw: value },
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn merge(path: impl Into<String>, value: Value) -> Self {
        Self::Merge {
            path: path.into(),
            value,
        }
    }
}
