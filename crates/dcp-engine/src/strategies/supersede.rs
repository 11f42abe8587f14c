//! Superseded-write detection.
//!
//! A `write` (or `edit`/`multiedit`) whose path is later `read` carries
//! content the read has already captured — the write's input is redundant
//! and can be redacted. Protected-file globs short-circuit: calls touching
//! those paths are never marked.

use std::collections::HashMap;

use tracing::debug;

use dcp_core::messages::Message;
use dcp_core::paths::matches_any_glob;
use dcp_core::{CallId, ToolStatus};
use dcp_settings::DcpSettings;

use crate::state::SessionState;
use crate::strategies::{input_tokens, StrategyDetail, StrategyReport};
use crate::tool_params::extract_file_paths;

/// Tools that mutate file contents.
const WRITE_TOOLS: &[&str] = &["write", "edit", "multiedit", "apply_patch"];

/// Run superseded-write detection. Returns a report when something was
/// pruned.
pub fn run(
    state: &mut SessionState,
    settings: &DcpSettings,
    messages: &[Message],
) -> Option<StrategyReport> {
    // Chronological index of each path's writes and the last read position.
    let mut writes_by_path: HashMap<String, Vec<(usize, CallId, String)>> = HashMap::new();
    let mut last_read_by_path: HashMap<String, usize> = HashMap::new();

    for (position, id) in state.tool_id_list.iter().enumerate() {
        let Some(entry) = state.tool_cache.get(id) else {
            continue;
        };
        if entry.status != ToolStatus::Completed {
            continue;
        }
        let tool = entry.tool.to_ascii_lowercase();
        let paths = extract_file_paths(&entry.tool, &entry.parameters);

        if WRITE_TOOLS.contains(&tool.as_str()) {
            if state.prune.tool_ids.contains(id) || settings.is_protected_tool(&entry.tool) {
                continue;
            }
            for path in paths {
                if matches_any_glob(&path, &settings.protected_file_patterns) {
                    continue;
                }
                writes_by_path.entry(path).or_default().push((
                    position,
                    id.clone(),
                    entry.tool.clone(),
                ));
            }
        } else if tool == "read" {
            for path in paths {
                let slot = last_read_by_path.entry(path).or_insert(position);
                *slot = (*slot).max(position);
            }
        }
    }

    let mut details = Vec::new();
    let mut tokens_saved = 0u64;

    for (path, writes) in writes_by_path {
        let Some(&read_position) = last_read_by_path.get(&path) else {
            continue;
        };
        for (write_position, id, tool) in writes {
            if write_position >= read_position {
                continue;
            }
            tokens_saved += input_tokens(messages, &id);
            let _ = state.prune.tool_ids.insert(id.clone());
            details.push(StrategyDetail::SupersededWrite {
                tool,
                path: path.clone(),
                pruned: id,
            });
        }
    }

    if details.is_empty() {
        return None;
    }

    debug!(count = details.len(), tokens_saved, "superseded writes pruned");
    state.stats.add(tokens_saved);
    Some(StrategyReport {
        strategy: "supersedeWrites",
        details,
        tokens_saved,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
