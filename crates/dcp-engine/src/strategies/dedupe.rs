//! Duplicate tool-call detection.
//!
//! Live calls are grouped by a canonical signature of tool name plus
//! normalized parameters. Normalization drops null fields and orders keys
//! recursively (arrays keep their element order), so two calls that differ
//! only in key order or absent-vs-null fields collapse to one signature.
//! Within a group, everything but the newest occurrence is pruned.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::{Map, Value};
use tracing::debug;

use dcp_core::messages::Message;
use dcp_core::CallId;
use dcp_settings::DcpSettings;

use crate::state::SessionState;
use crate::strategies::{output_tokens, StrategyDetail, StrategyReport};
use crate::tool_params::param_key;

/// Run deduplication. Returns a report when at least one call was pruned.
pub fn run(
    state: &mut SessionState,
    settings: &DcpSettings,
    messages: &[Message],
) -> Option<StrategyReport> {
    // Group candidate ids by signature, preserving chronological order.
    let mut groups: BTreeMap<String, Vec<CallId>> = BTreeMap::new();
    for id in &state.tool_id_list {
        if state.prune.tool_ids.contains(id) {
            continue;
        }
        let Some(entry) = state.tool_cache.get(id) else {
            continue;
        };
        if settings.is_protected_tool(&entry.tool) {
            continue;
        }
        groups
            .entry(signature(&entry.tool, &entry.parameters))
            .or_default()
            .push(id.clone());
    }

    let mut details = Vec::new();
    let mut tokens_saved = 0u64;

    for ids in groups.into_values() {
        if ids.len() < 2 {
            continue;
        }
        let kept = ids[ids.len() - 1].clone();
        let pruned: Vec<CallId> = ids[..ids.len() - 1].to_vec();

        let Some(entry) = state.tool_cache.get(&kept) else {
            continue;
        };
        let detail = StrategyDetail::Duplicates {
            tool: entry.tool.clone(),
            param_key: param_key(&entry.tool, &entry.parameters),
            duplicate_count: pruned.len(),
            pruned: pruned.clone(),
            kept,
        };

        for id in &pruned {
            tokens_saved += output_tokens(messages, id);
            let _ = state.prune.tool_ids.insert(id.clone());
        }
        details.push(detail);
    }

    if details.is_empty() {
        return None;
    }

    debug!(groups = details.len(), tokens_saved, "deduplication pruned calls");
    state.stats.add(tokens_saved);
    Some(StrategyReport {
        strategy: "deduplication",
        details,
        tokens_saved,
    })
}

/// Build the canonical dedup signature for a call.
///
/// `tool::<canonical-json>` where the canonical form sorts object keys and
/// drops null values at every level.
#[must_use]
pub fn signature(tool: &str, parameters: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(tool.len() + 2 + parameters.len() * 16);
    out.push_str(tool);
    out.push_str("::");
    write_canonical(&Value::Object(parameters.clone()), &mut out);
    out
}

/// Serialize a value with sorted keys and nulls dropped.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            out.push('{');
            for (i, (key, val)) in sorted.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String((*key).clone()));
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => {
            let _ = write!(out, "{other}");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
