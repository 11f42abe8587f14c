//! Per-tool parameter interpretation.
//!
//! Two views over a tool call's input map:
//!
//! - [`param_key`] — the short human-readable discriminator shown in the
//!   `<prunable-tools>` manifest and in notifications
//! - [`extract_file_paths`] — the file paths a call touches, used for
//!   protected-file checks and superseded-write detection

use regex::Regex;
use serde_json::{Map, Value};

use dcp_core::text::truncate_with_suffix;

/// Maximum length of a bash command shown as a param key.
const COMMAND_KEY_MAX: usize = 60;

fn str_field<'a>(input: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}

/// Derive the manifest discriminator for a tool call.
#[must_use]
pub fn param_key(tool: &str, input: &Map<String, Value>) -> String {
    match tool.to_ascii_lowercase().as_str() {
        "read" | "write" | "edit" | "multiedit" => str_field(input, "filePath")
            .unwrap_or("?")
            .to_owned(),
        "bash" => str_field(input, "description")
            .map_or_else(
                || {
                    let command = str_field(input, "command").unwrap_or("?");
                    truncate_with_suffix(command, COMMAND_KEY_MAX, "…")
                },
                ToOwned::to_owned,
            ),
        "grep" | "glob" => {
            let pattern = str_field(input, "pattern").unwrap_or("?");
            let path = str_field(input, "path").unwrap_or(".");
            format!("{pattern} in {path}")
        }
        "list" => str_field(input, "path").unwrap_or(".").to_owned(),
        "webfetch" => str_field(input, "url").unwrap_or("?").to_owned(),
        "websearch" => str_field(input, "query").unwrap_or("?").to_owned(),
        "task" => str_field(input, "description").unwrap_or("?").to_owned(),
        _ => {
            let raw = Value::Object(input.clone()).to_string();
            truncate_with_suffix(&raw, COMMAND_KEY_MAX, "…")
        }
    }
}

/// Extract every file path a tool call touches.
///
/// - `read`/`write`/`edit`: `filePath`
/// - `multiedit`: `filePath` plus any per-edit `filePath` overrides
/// - `apply_patch`: paths scanned from the patch envelope headers
#[must_use]
pub fn extract_file_paths(tool: &str, input: &Map<String, Value>) -> Vec<String> {
    let mut paths = Vec::new();
    match tool.to_ascii_lowercase().as_str() {
        "read" | "write" | "edit" => {
            if let Some(p) = str_field(input, "filePath") {
                paths.push(p.to_owned());
            }
        }
        "multiedit" => {
            if let Some(p) = str_field(input, "filePath") {
                paths.push(p.to_owned());
            }
            if let Some(edits) = input.get("edits").and_then(Value::as_array) {
                for edit in edits {
                    if let Some(p) = edit.get("filePath").and_then(Value::as_str) {
                        if !paths.iter().any(|existing| existing == p) {
                            paths.push(p.to_owned());
                        }
                    }
                }
            }
        }
        "apply_patch" => {
            if let Some(patch) = str_field(input, "patchText") {
                paths.extend(patch_file_paths(patch));
            }
        }
        _ => {}
    }
    paths
}

/// Scan a patch envelope for `*** Add|Delete|Update File: <path>` headers.
fn patch_file_paths(patch: &str) -> Vec<String> {
    // Compiled per call; patches are rare and small relative to transforms.
    let Ok(re) = Regex::new(r"(?m)^\*\*\* (?:Add|Delete|Update) File: (.+)$") else {
        return Vec::new();
    };
    re.captures_iter(patch)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_owned()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(pairs: &[(&str, Value)]) -> Map<String, Value> {
        let mut map = Map::new();
        for (k, v) in pairs {
            let _ = map.insert((*k).to_owned(), v.clone());
        }
        map
    }

    // ── param_key ───────────────────────────────────────────────────────

    #[test]
    fn file_tools_use_file_path() {
        let m = input(&[("filePath", json!("/src/main.rs"))]);
        assert_eq!(param_key("read", &m), "/src/main.rs");
        assert_eq!(param_key("write", &m), "/src/main.rs");
        assert_eq!(param_key("edit", &m), "/src/main.rs");
    }

    #[test]
    fn bash_prefers_description() {
        let m = input(&[
            ("command", json!("npm test -- --watch")),
            ("description", json!("Run tests")),
        ]);
        assert_eq!(param_key("bash", &m), "Run tests");
    }

    #[test]
    fn bash_falls_back_to_truncated_command() {
        let long = "x".repeat(100);
        let m = input(&[("command", json!(long))]);
        let key = param_key("bash", &m);
        assert!(key.ends_with('…'));
        assert!(key.len() <= COMMAND_KEY_MAX);
    }

    #[test]
    fn grep_combines_pattern_and_path() {
        let m = input(&[("pattern", json!("TODO")), ("path", json!("src"))]);
        assert_eq!(param_key("grep", &m), "TODO in src");
        let m = input(&[("pattern", json!("*.rs"))]);
        assert_eq!(param_key("glob", &m), "*.rs in .");
    }

    #[test]
    fn url_and_query_tools() {
        let m = input(&[("url", json!("https://docs.rs"))]);
        assert_eq!(param_key("webfetch", &m), "https://docs.rs");
        let m = input(&[("query", json!("rust dashmap"))]);
        assert_eq!(param_key("websearch", &m), "rust dashmap");
    }

    #[test]
    fn unknown_tool_shows_truncated_json() {
        let m = input(&[("foo", json!("bar"))]);
        let key = param_key("custom_tool", &m);
        assert!(key.contains("foo"));
    }

    #[test]
    fn missing_fields_show_placeholder() {
        assert_eq!(param_key("read", &Map::new()), "?");
        assert_eq!(param_key("webfetch", &Map::new()), "?");
    }

    // ── extract_file_paths ──────────────────────────────────────────────

    #[test]
    fn simple_file_tools() {
        let m = input(&[("filePath", json!("/a/b.rs"))]);
        assert_eq!(extract_file_paths("write", &m), vec!["/a/b.rs"]);
        assert_eq!(extract_file_paths("read", &m), vec!["/a/b.rs"]);
    }

    #[test]
    fn multiedit_collects_nested_paths() {
        let m = input(&[
            ("filePath", json!("/a/b.rs")),
            (
                "edits",
                json!([
                    {"oldString": "x", "newString": "y"},
                    {"filePath": "/a/c.rs", "oldString": "x", "newString": "y"},
                ]),
            ),
        ]);
        assert_eq!(extract_file_paths("multiedit", &m), vec!["/a/b.rs", "/a/c.rs"]);
    }

    #[test]
    fn apply_patch_scans_headers() {
        let patch = "*** Begin Patch\n*** Update File: src/lib.rs\n@@\n-old\n+new\n*** Add File: src/new.rs\n+content\n*** End Patch";
        let m = input(&[("patchText", json!(patch))]);
        assert_eq!(
            extract_file_paths("apply_patch", &m),
            vec!["src/lib.rs", "src/new.rs"]
        );
    }

    #[test]
    fn non_file_tools_have_no_paths() {
        let m = input(&[("command", json!("ls"))]);
        assert!(extract_file_paths("bash", &m).is_empty());
    }

    #[test]
    fn patch_delete_header_detected() {
        assert_eq!(
            patch_file_paths("*** Delete File: obsolete.txt"),
            vec!["obsolete.txt"]
        );
    }
}
