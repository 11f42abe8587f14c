//! In-place transcript rewriting.
//!
//! Two redaction modes, both keyed off the prune set:
//!
//! - completed calls of most tools get their **output** replaced with a
//!   placeholder
//! - `write`/`edit`/`multiedit` calls get their **input** strings replaced
//!   instead (their output is already tiny; the content is the bulk)
//! - errored calls get their input strings replaced while the error text
//!   is preserved
//!
//! Messages compacted by a range compression stay in the array as prefix
//! and get their parts swapped for the anchored summary here.
//!
//! The placeholder strings are model-visible contracts; changing them
//! changes observable behavior.

use serde_json::Value;

use dcp_core::messages::{Message, Part};
use dcp_core::{MessageId, Role, ToolStatus};

use crate::state::SessionState;

/// Replacement for pruned tool outputs.
pub const PRUNED_OUTPUT_PLACEHOLDER: &str =
    "[Output removed to save context - information superseded or no longer needed]";

/// Replacement for pruned write/edit input strings.
pub const PRUNED_INPUT_PLACEHOLDER: &str =
    "[content removed to save context, this is not what was written to the file, but a placeholder]";

/// Replacement for input strings of purged errored calls.
pub const PRUNED_ERROR_INPUT_PLACEHOLDER: &str =
    "[Input removed to save context - this tool call failed and its input is no longer needed]";

/// Tools redacted through their input rather than their output.
const INPUT_REDACTED_TOOLS: &[&str] = &["write", "edit", "multiedit"];

/// Apply output/input redaction for every pruned call in the transcript.
pub fn redact_messages(messages: &mut [Message], state: &SessionState) {
    for message in messages.iter_mut() {
        if state.prune.message_ids.contains(&message.info.id) {
            // Compacted range; handled by apply_compress_summaries.
            continue;
        }
        for part in &mut message.parts {
            let Part::Tool {
                call_id,
                tool,
                state: tool_state,
                ..
            } = part
            else {
                continue;
            };
            let id = dcp_core::CallId::normalized(call_id);
            if !state.prune.tool_ids.contains(&id) {
                continue;
            }

            match tool_state.status {
                ToolStatus::Pending | ToolStatus::Running => {}
                ToolStatus::Completed => {
                    let lowered = tool.to_ascii_lowercase();
                    if INPUT_REDACTED_TOOLS.contains(&lowered.as_str()) {
                        redact_write_input(&lowered, tool_state);
                    } else {
                        tool_state.output = Some(PRUNED_OUTPUT_PLACEHOLDER.to_owned());
                    }
                }
                ToolStatus::Error => {
                    // Error text stays; only the bulk input goes.
                    redact_all_strings(
                        &mut tool_state.input,
                        PRUNED_ERROR_INPUT_PLACEHOLDER,
                    );
                }
            }
        }
    }
}

/// Redact the content-bearing input strings of a write-family call.
fn redact_write_input(tool: &str, tool_state: &mut dcp_core::ToolState) {
    match tool {
        "write" => {
            if tool_state.input.contains_key("content") {
                let _ = tool_state.input.insert(
                    "content".to_owned(),
                    Value::String(PRUNED_INPUT_PLACEHOLDER.to_owned()),
                );
            }
        }
        "edit" => {
            for key in ["oldString", "newString"] {
                if tool_state.input.contains_key(key) {
                    let _ = tool_state.input.insert(
                        key.to_owned(),
                        Value::String(PRUNED_INPUT_PLACEHOLDER.to_owned()),
                    );
                }
            }
        }
        "multiedit" => {
            if let Some(Value::Array(edits)) = tool_state.input.get_mut("edits") {
                for edit in edits {
                    let Some(obj) = edit.as_object_mut() else {
                        continue;
                    };
                    for key in ["oldString", "newString"] {
                        if obj.contains_key(key) {
                            let _ = obj.insert(
                                key.to_owned(),
                                Value::String(PRUNED_INPUT_PLACEHOLDER.to_owned()),
                            );
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

/// Replace every top-level string value in an input map.
fn redact_all_strings(input: &mut serde_json::Map<String, Value>, placeholder: &str) {
    for value in input.values_mut() {
        if value.is_string() {
            *value = Value::String(placeholder.to_owned());
        }
    }
}

/// Swap compacted messages for their compress summaries.
///
/// The anchor message of each range carries the model-authored summary;
/// every other compacted message is emptied. Messages are never removed
/// from the array, keeping the prefix stable for prompt caching.
pub fn apply_compress_summaries(messages: &mut [Message], state: &SessionState) {
    for message in messages.iter_mut() {
        if !state.prune.message_ids.contains(&message.info.id) {
            continue;
        }
        if let Some(summary) = state.summary_for_anchor(&message.info.id) {
            message.parts = vec![Part::text(summary.summary.clone())];
        } else {
            message.parts.clear();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Synthetic messages
// ─────────────────────────────────────────────────────────────────────────────

/// Mints deterministic ids for engine-injected messages and parts.
///
/// Counters restart every transform; injected content lives at the tail of
/// the transcript where cache stability does not matter.
#[derive(Debug, Default)]
pub struct SyntheticIds {
    counter: u64,
}

impl SyntheticIds {
    /// Create a fresh generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next synthetic message id (`msg_dcp_<n>`).
    pub fn next_message_id(&mut self) -> MessageId {
        self.counter += 1;
        MessageId::from(format!("{}{}", MessageId::SYNTHETIC_PREFIX, self.counter))
    }

    /// Next synthetic part id (`prt_dcp_<n>`).
    pub fn next_part_id(&mut self) -> String {
        self.counter += 1;
        format!("prt_dcp_{}", self.counter)
    }

    /// Next synthetic call id (`call_dcp_<n>`).
    pub fn next_call_id(&mut self) -> String {
        self.counter += 1;
        format!("call_dcp_{}", self.counter)
    }
}

/// Build a synthetic text message inheriting session metadata from
/// `template` (the last real user message).
#[must_use]
pub fn synthetic_message(
    ids: &mut SyntheticIds,
    template: &Message,
    role: Role,
    text: impl Into<String>,
) -> Message {
    let mut info = template.info.clone();
    info.id = ids.next_message_id();
    info.role = role;
    info.summary = None;
    Message {
        info,
        parts: vec![Part::Text {
            id: Some(ids.next_part_id()),
            text: text.into(),
        }],
    }
}

/// Build a synthetic completed tool part carrying injected context.
///
/// Used for providers that refuse to emit reasoning after a trailing
/// assistant text injection.
#[must_use]
pub fn synthetic_tool_part(ids: &mut SyntheticIds, text: impl Into<String>) -> Part {
    Part::Tool {
        id: Some(ids.next_part_id()),
        call_id: ids.next_call_id(),
        tool: "dcp-context".to_owned(),
        state: dcp_core::ToolState::completed(serde_json::Map::new(), text),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
