// ABOUTME: Leaf-level diff between two rendered content snapshots
// ABOUTME: Finds changed fields and the one field most likely still being streamed

use crs_core::utils::{is_empty_value, join_pointer};
use serde_json::Value;

/// Result of comparing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderDiff {
    /// JSON pointers of changed leaves, in traversal order
    pub changed_paths: Vec<String>,
    /// Last string leaf that grew by appending
    pub active_field: Option<String>,
}

impl RenderDiff {
    pub fn is_empty(&self) -> bool {
        self.changed_paths.is_empty()
    }
}

/// Compare `current` against the previously rendered snapshot.
///
/// A string leaf counts as changed only when it extends its old value. Other
/// leaves count when they differ and are non-empty. With no previous snapshot
/// every populated leaf is reported.
pub fn diff_content(previous: Option<&Value>, current: &Value) -> RenderDiff {
    let mut diff = RenderDiff::default();
    walk(previous, current, String::new(), &mut diff);
    diff
}

fn walk(previous: Option<&Value>, current: &Value, path: String, diff: &mut RenderDiff) {
    match current {
        Value::Object(map) if !map.is_empty() => {
            for (key, value) in map {
                let before = previous.and_then(|p| p.as_object()).and_then(|p| p.get(key));
                walk(before, value, join_pointer(&path, key), diff);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, value) in items.iter().enumerate() {
                let before = previous.and_then(|p| p.as_array()).and_then(|p| p.get(index));
                walk(before, value, join_pointer(&path, &index.to_string()), diff);
            }
        }
        Value::String(text) => {
            let grew = match previous {
                None => !is_empty_value(current),
                Some(Value::String(old)) => text.len() > old.len() && text.starts_with(old.as_str()),
                Some(_) => !is_empty_value(current),
            };
            if grew {
                diff.changed_paths.push(path.clone());
                diff.active_field = Some(path);
            }
        }
        leaf => {
            let changed = match previous {
                None => !is_empty_value(leaf),
                Some(old) => old != leaf && !is_empty_value(leaf),
            };
            if changed {
                diff.changed_paths.push(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_first_render_reports_every_populated_leaf() {
        let current = json!({
            "project_title": "Clinic",
            "project_description": "",
            "project_objectives": ["Reduce no-shows"],
            "stakeholders": [],
            "technology_stack": {"frontend": ["React"]}
        });

        let diff = diff_content(None, &current);

        assert_eq!(
            diff.changed_paths,
            vec![
                "/project_objectives/0".to_string(),
                "/project_title".to_string(),
                "/technology_stack/frontend/0".to_string(),
            ]
        );
    }

    #[rstest]
    #[case("Build", "Build a", true)]
    #[case("Build a", "Build a", false)]
    #[case("Build a tool", "Build a", false)]
    #[case("Build", "Make", false)]
    #[case("", "B", true)]
    fn test_string_changes_only_on_append(
        #[case] old: &str,
        #[case] new: &str,
        #[case] changed: bool,
    ) {
        let diff = diff_content(Some(&json!({"d": old})), &json!({"d": new}));

        assert_eq!(diff.changed_paths.contains(&"/d".to_string()), changed);
        assert_eq!(diff.active_field.is_some(), changed);
    }

    #[test]
    fn test_non_string_leaves_change_when_different_and_populated() {
        let previous = json!({"n": 1, "b": false, "gone": 3});
        let current = json!({"n": 2, "b": false, "gone": null});

        let diff = diff_content(Some(&previous), &current);

        assert_eq!(diff.changed_paths, vec!["/n".to_string()]);
        assert_eq!(diff.active_field, None);
    }

    #[test]
    fn test_new_array_item_is_highlighted() {
        let previous = json!({"risks": ["Privacy"]});
        let current = json!({"risks": ["Privacy", "Adoption"]});

        let diff = diff_content(Some(&previous), &current);

        assert_eq!(diff.changed_paths, vec!["/risks/1".to_string()]);
        assert_eq!(diff.active_field.as_deref(), Some("/risks/1"));
    }

    #[test]
    fn test_active_field_is_last_growing_string() {
        let previous = json!({"a": "x", "b": "y", "c": 1});
        let current = json!({"a": "xx", "b": "yy", "c": 2});

        let diff = diff_content(Some(&previous), &current);

        assert_eq!(diff.active_field.as_deref(), Some("/b"));
        assert_eq!(diff.changed_paths.len(), 3);
    }

    #[test]
    fn test_keys_are_escaped_in_paths() {
        let diff = diff_content(None, &json!({"a/b": {"c~d": 1}}));
        assert_eq!(diff.changed_paths, vec!["/a~1b/c~0d".to_string()]);
    }

    #[test]
    fn test_inputs_are_untouched() {
        let previous = json!({"a": "x"});
        let current = json!({"a": "xy"});
        let (p, c) = (previous.clone(), current.clone());

        let _ = diff_content(Some(&previous), &current);

        assert_eq!(previous, p);
        assert_eq!(current, c);
    }
}
