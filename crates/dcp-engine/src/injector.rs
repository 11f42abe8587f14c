//! Context injection.
//!
//! Once per outgoing transform — after redaction and strategies — up to
//! four text blocks are assembled and appended to the transcript as a
//! single synthetic message:
//!
//! 1. cooldown (right after a successful prune/distill/compress)
//! 2. the `<prunable-tools>` manifest
//! 3. the `<squash-context>` block
//! 4. a nudge when too many unpruned results accumulated
//!
//! Every string here is a model-visible contract; the exact wording must
//! stay stable across releases.

use std::fmt::Write as _;

use dcp_core::messages::{last_real_message, last_real_user_message, Message};
use dcp_core::{Role, ToolStatus};
use dcp_settings::DcpSettings;

use crate::rewriter::{synthetic_message, synthetic_tool_part, SyntheticIds};
use crate::state::SessionState;
use crate::tool_params::param_key;

/// Nudge shown when pruning tools are available.
const NUDGE_PRUNE: &str = "<context-nudge>Several tool results above are stale. Review the <prunable-tools> list and call the pruning tools with the numeric indices of entries you no longer need.</context-nudge>";

/// Nudge shown when only range compression is available.
const NUDGE_COMPRESS: &str = "<context-nudge>The conversation has grown long. Consider using the compress tool to fold a completed phase into a short summary.</context-nudge>";

/// Build the cooldown block.
///
/// `enabled` carries the enabled pruning tool names in canonical order.
#[must_use]
pub fn cooldown_block(enabled: &[&str]) -> String {
    let noun = if enabled.len() == 1 { "tool" } else { "tools" };
    format!(
        "<context-info>Context management was just performed. Do NOT use the {} {noun} again. A fresh list will be available after your next tool use.</context-info>",
        enabled.join("/")
    )
}

/// Build the `<prunable-tools>` manifest.
///
/// One line per live, non-protected, non-pruned tool call, addressed by
/// its index in the tool-id list. Returns `None` when nothing is listable.
#[must_use]
pub fn manifest_block(state: &SessionState, settings: &DcpSettings) -> Option<String> {
    let mut lines = Vec::new();
    for (index, id) in state.tool_id_list.iter().enumerate() {
        let Some(entry) = state.tool_cache.get(id) else {
            continue;
        };
        if settings.is_protected_tool(&entry.tool) || state.prune.tool_ids.contains(id) {
            continue;
        }
        if !matches!(entry.status, ToolStatus::Completed | ToolStatus::Error) {
            continue;
        }
        lines.push(format!(
            "{index}: {}, {}",
            entry.tool,
            param_key(&entry.tool, &entry.parameters)
        ));
    }

    if lines.is_empty() {
        return None;
    }

    let mut block = String::from("<prunable-tools>\n");
    for line in &lines {
        let _ = writeln!(block, "{line}");
    }
    block.push_str("</prunable-tools>");
    Some(block)
}

/// Build the `<squash-context>` block with the live message count.
#[must_use]
pub fn squash_block(state: &SessionState, messages: &[Message]) -> String {
    let live = messages
        .iter()
        .filter(|m| !state.prune.message_ids.contains(&m.info.id))
        .count();
    format!("<squash-context>Live messages in conversation: {live}</squash-context>")
}

/// Pick the nudge text for the enabled tool combination.
#[must_use]
pub fn nudge_text(settings: &DcpSettings) -> &'static str {
    if settings.tools.prune.enabled || settings.tools.distill.enabled {
        NUDGE_PRUNE
    } else {
        NUDGE_COMPRESS
    }
}

/// Assemble the injection payload for this transform.
///
/// Returns `None` when there is nothing to say this turn.
#[must_use]
pub fn build_injection(
    state: &SessionState,
    settings: &DcpSettings,
    messages: &[Message],
) -> Option<String> {
    if !settings.any_tool_enabled() {
        return None;
    }

    let mut blocks: Vec<String> = Vec::new();
    let cooling_down = state.last_tool_prune;

    if cooling_down {
        blocks.push(cooldown_block(&settings.enabled_tool_names()));
    } else if settings.tools.prune.enabled || settings.tools.distill.enabled {
        if let Some(manifest) = manifest_block(state, settings) {
            blocks.push(manifest);
        }
    }

    if settings.tools.compress.enabled {
        blocks.push(squash_block(state, messages));
    }

    if settings.tools.settings.nudge_enabled
        && state.nudge_counter >= settings.tools.settings.nudge_frequency
    {
        blocks.push(nudge_text(settings).to_owned());
    }

    if blocks.is_empty() {
        return None;
    }
    Some(blocks.join("\n\n"))
}

/// Returns `true` for model families that refuse to emit reasoning after a
/// trailing assistant text injection.
#[must_use]
pub fn needs_tool_part_injection(model: &str) -> bool {
    let lowered = model.to_ascii_lowercase();
    lowered.contains("deepseek") || lowered.contains("kimi")
}

/// Append the injection payload to the transcript.
///
/// Role placement:
/// - last real message is a user message → synthetic user message
/// - DeepSeek/Kimi family → synthetic tool part on the last assistant
///   message
/// - otherwise → synthetic assistant message
///
/// Returns `true` when something was appended.
pub fn inject_context(
    messages: &mut Vec<Message>,
    state: &SessionState,
    settings: &DcpSettings,
) -> bool {
    let Some(payload) = build_injection(state, settings, messages) else {
        return false;
    };
    let Some(template) = last_real_user_message(messages).cloned() else {
        return false;
    };

    let mut ids = SyntheticIds::new();

    let last_is_user = last_real_message(messages).is_some_and(Message::is_user);
    if last_is_user {
        let msg = synthetic_message(&mut ids, &template, Role::User, payload);
        messages.push(msg);
        return true;
    }

    let model = state
        .model
        .as_deref()
        .or(template.info.model.as_deref())
        .unwrap_or_default();
    if needs_tool_part_injection(model) {
        if let Some(assistant) = messages.iter_mut().rev().find(|m| m.is_assistant()) {
            let part = synthetic_tool_part(&mut ids, payload);
            assistant.parts.push(part);
            return true;
        }
    }

    let msg = synthetic_message(&mut ids, &template, Role::Assistant, payload);
    messages.push(msg);
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{rebuild_tool_id_list, sync_tool_cache};
    use crate::strategies::test_support::{assistant_msg, completed_tool, user_msg};
    use dcp_core::CallId;
    use serde_json::json;

    fn transcript() -> Vec<Message> {
        vec![
            user_msg("m1", "please read the file"),
            assistant_msg(
                "m2",
                vec![
                    completed_tool("a", "read", &[("filePath", json!("/x"))], "contents"),
                    completed_tool("b", "bash", &[("command", json!("cargo test"))], "ok"),
                ],
            ),
        ]
    }

    fn prepared(messages: &[Message]) -> (SessionState, DcpSettings) {
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        sync_tool_cache(&mut state, messages, &settings);
        rebuild_tool_id_list(&mut state, messages);
        (state, settings)
    }

    // ── cooldown ────────────────────────────────────────────────────────

    #[test]
    fn cooldown_names_enabled_tools() {
        let block = cooldown_block(&["prune", "distill"]);
        assert_eq!(
            block,
            "<context-info>Context management was just performed. Do NOT use the prune/distill tools again. A fresh list will be available after your next tool use.</context-info>"
        );
        let single = cooldown_block(&["prune"]);
        assert!(single.contains("the prune tool again"));
    }

    // ── manifest ────────────────────────────────────────────────────────

    #[test]
    fn manifest_lists_indexed_tools() {
        let messages = transcript();
        let (state, settings) = prepared(&messages);
        let manifest = manifest_block(&state, &settings).unwrap();
        assert_eq!(
            manifest,
            "<prunable-tools>\n0: read, /x\n1: bash, cargo test\n</prunable-tools>"
        );
    }

    #[test]
    fn manifest_keeps_original_indices_when_skipping() {
        let messages = transcript();
        let (mut state, settings) = prepared(&messages);
        let _ = state.prune.tool_ids.insert(CallId::from("a"));
        let manifest = manifest_block(&state, &settings).unwrap();
        assert_eq!(manifest, "<prunable-tools>\n1: bash, cargo test\n</prunable-tools>");
    }

    #[test]
    fn manifest_empty_when_everything_pruned() {
        let messages = transcript();
        let (mut state, settings) = prepared(&messages);
        let _ = state.prune.tool_ids.insert(CallId::from("a"));
        let _ = state.prune.tool_ids.insert(CallId::from("b"));
        assert!(manifest_block(&state, &settings).is_none());
    }

    #[test]
    fn manifest_skips_protected_tools() {
        let messages = vec![assistant_msg(
            "m1",
            vec![completed_tool("t", "todowrite", &[("todos", json!([]))], "ok")],
        )];
        let (state, settings) = prepared(&messages);
        assert!(manifest_block(&state, &settings).is_none());
    }

    // ── squash ──────────────────────────────────────────────────────────

    #[test]
    fn squash_counts_live_messages() {
        let messages = transcript();
        let (mut state, _) = prepared(&messages);
        assert_eq!(
            squash_block(&state, &messages),
            "<squash-context>Live messages in conversation: 2</squash-context>"
        );
        let _ = state
            .prune
            .message_ids
            .insert(dcp_core::MessageId::from("m1"));
        assert!(squash_block(&state, &messages).contains(": 1<"));
    }

    // ── build_injection ─────────────────────────────────────────────────

    #[test]
    fn cooldown_suppresses_manifest() {
        let messages = transcript();
        let (mut state, settings) = prepared(&messages);
        state.last_tool_prune = true;
        let payload = build_injection(&state, &settings, &messages).unwrap();
        assert!(payload.contains("<context-info>"));
        assert!(!payload.contains("<prunable-tools>"));
    }

    #[test]
    fn normal_turn_contains_manifest_and_squash() {
        let messages = transcript();
        let (state, settings) = prepared(&messages);
        let payload = build_injection(&state, &settings, &messages).unwrap();
        assert!(payload.contains("<prunable-tools>"));
        assert!(payload.contains("<squash-context>"));
        assert!(!payload.contains("<context-nudge>"));
    }

    #[test]
    fn nudge_appears_at_threshold() {
        let messages = transcript();
        let (mut state, settings) = prepared(&messages);
        state.nudge_counter = settings.tools.settings.nudge_frequency;
        let payload = build_injection(&state, &settings, &messages).unwrap();
        assert!(payload.contains("<context-nudge>"));
    }

    #[test]
    fn nothing_injected_when_tools_disabled() {
        let messages = transcript();
        let (state, mut settings) = prepared(&messages);
        settings.tools.prune.enabled = false;
        settings.tools.distill.enabled = false;
        settings.tools.compress.enabled = false;
        assert!(build_injection(&state, &settings, &messages).is_none());
    }

    // ── inject_context ──────────────────────────────────────────────────

    #[test]
    fn trailing_user_message_gets_user_injection() {
        let mut messages = vec![user_msg("m1", "hello")];
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        sync_tool_cache(&mut state, &messages, &settings);

        assert!(inject_context(&mut messages, &state, &settings));
        let injected = messages.last().unwrap();
        assert!(injected.is_synthetic());
        assert!(injected.is_user());
        assert!(injected.text().contains("<squash-context>"));
    }

    #[test]
    fn trailing_assistant_gets_assistant_injection() {
        let mut messages = transcript();
        let (state, settings) = prepared(&messages);
        assert!(inject_context(&mut messages, &state, &settings));
        let injected = messages.last().unwrap();
        assert!(injected.is_synthetic());
        assert!(injected.is_assistant());
    }

    #[test]
    fn deepseek_gets_tool_part_on_last_assistant() {
        let mut messages = transcript();
        let (mut state, settings) = prepared(&messages);
        state.model = Some("deepseek/deepseek-chat".into());

        let parts_before = messages[1].parts.len();
        assert!(inject_context(&mut messages, &state, &settings));
        // no new message appended; a tool part was added instead
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].parts.len(), parts_before + 1);
        let (_, tool, tool_state) = messages[1].tool_parts().last().unwrap();
        assert_eq!(tool, "dcp-context");
        assert!(tool_state.output.as_deref().unwrap().contains("<prunable-tools>"));
    }

    #[test]
    fn model_family_detection() {
        assert!(needs_tool_part_injection("deepseek/deepseek-chat"));
        assert!(needs_tool_part_injection("moonshot/Kimi-k2"));
        assert!(!needs_tool_part_injection("anthropic/claude-sonnet-4"));
    }

    #[test]
    fn empty_transcript_injects_nothing() {
        let mut messages = Vec::new();
        let state = SessionState::default();
        let settings = DcpSettings::default();
        assert!(!inject_context(&mut messages, &state, &settings));
    }
}
