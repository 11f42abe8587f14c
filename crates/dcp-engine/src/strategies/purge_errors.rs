//! Errored-input purging.
//!
//! A failed tool call keeps teaching the model what went wrong through its
//! error text, but its (potentially large) input stops being useful after a
//! few turns. Once an errored call is older than the configured turn
//! threshold, its id enters the prune set; the rewriter then replaces the
//! input strings while preserving the error field.

use tracing::debug;

use dcp_core::messages::Message;
use dcp_core::{CallId, ToolStatus};
use dcp_settings::DcpSettings;

use crate::state::SessionState;
use crate::strategies::{input_tokens, StrategyDetail, StrategyReport};

/// Run errored-input purging. Returns a report when something was marked.
pub fn run(
    state: &mut SessionState,
    settings: &DcpSettings,
    messages: &[Message],
) -> Option<StrategyReport> {
    let threshold = settings.strategies.purge_errors.turns;
    let current_turn = state.current_turn;

    let mut marked: Vec<(CallId, String, u64)> = Vec::new();
    for id in &state.tool_id_list {
        if state.prune.tool_ids.contains(id) {
            continue;
        }
        let Some(entry) = state.tool_cache.get(id) else {
            continue;
        };
        if entry.status != ToolStatus::Error || settings.is_protected_tool(&entry.tool) {
            continue;
        }
        let age = current_turn.saturating_sub(entry.turn);
        if age >= threshold {
            marked.push((id.clone(), entry.tool.clone(), age));
        }
    }

    if marked.is_empty() {
        return None;
    }

    let mut details = Vec::new();
    let mut tokens_saved = 0u64;
    for (id, tool, age_turns) in marked {
        tokens_saved += input_tokens(messages, &id);
        let _ = state.prune.tool_ids.insert(id.clone());
        details.push(StrategyDetail::PurgedError {
            tool,
            pruned: id,
            age_turns,
        });
    }

    debug!(count = details.len(), tokens_saved, "stale errored inputs purged");
    state.stats.add(tokens_saved);
    Some(StrategyReport {
        strategy: "purgeErrors",
        details,
        tokens_saved,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{rebuild_tool_id_list, sync_tool_cache};
    use crate::state::ToolEntry;
    use crate::strategies::test_support::{assistant_msg, errored_tool, input_map};
    use serde_json::json;

    fn age_entry(state: &mut SessionState, id: &str, turn: u64) {
        let call = CallId::from(id);
        let old = state.tool_cache.get(&call).unwrap().clone();
        state.tool_cache.insert(call, ToolEntry { turn, ..old });
    }

    #[test]
    fn old_error_is_marked() {
        let messages = vec![assistant_msg(
            "m1",
            vec![errored_tool(
                "e1",
                "bash",
                &[("command", json!("npm test"))],
                "exit 1",
            )],
        )];
        let settings = DcpSettings::default();
        let mut state = SessionState::default();
        sync_tool_cache(&mut state, &messages, &settings);
        rebuild_tool_id_list(&mut state, &messages);
        age_entry(&mut state, "e1", 5);
        state.current_turn = 12;

        let report = run(&mut state, &settings, &messages).unwrap();
        assert!(state.prune.tool_ids.contains(&CallId::from("e1")));
        match &report.details[0] {
            StrategyDetail::PurgedError {
                tool, age_turns, ..
            } => {
                assert_eq!(tool, "bash");
                assert_eq!(*age_turns, 7);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn fresh_error_survives() {
        let messages = vec![assistant_msg(
            "m1",
            vec![errored_tool("e1", "bash", &[("command", json!("x"))], "boom")],
        )];
        let settings = DcpSettings::default();
        let mut state = SessionState::default();
        sync_tool_cache(&mut state, &messages, &settings);
        rebuild_tool_id_list(&mut state, &messages);
        age_entry(&mut state, "e1", 10);
        state.current_turn = 11;

        assert!(run(&mut state, &settings, &messages).is_none());
        assert!(state.prune.tool_ids.is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        let messages = vec![assistant_msg(
            "m1",
            vec![errored_tool("e1", "bash", &[("command", json!("x"))], "boom")],
        )];
        let settings = DcpSettings::default();
        let mut state = SessionState::default();
        sync_tool_cache(&mut state, &messages, &settings);
        rebuild_tool_id_list(&mut state, &messages);
        age_entry(&mut state, "e1", 4);
        state.current_turn = 7; // age 3 == default threshold 3

        assert!(run(&mut state, &settings, &messages).is_some());
    }

    #[test]
    fn completed_calls_never_marked() {
        let mut state = SessionState::default();
        state.tool_cache.insert(
            CallId::from("c1"),
            ToolEntry {
                tool: "bash".into(),
                parameters: input_map(&[("command", json!("ls"))]),
                status: ToolStatus::Completed,
                error: None,
                turn: 0,
                compacted: false,
            },
        );
        state.tool_id_list = vec![CallId::from("c1")];
        state.current_turn = 100;
        let settings = DcpSettings::default();
        assert!(run(&mut state, &settings, &[]).is_none());
    }

    #[test]
    fn custom_turn_threshold_respected() {
        let messages = vec![assistant_msg(
            "m1",
            vec![errored_tool("e1", "bash", &[("command", json!("x"))], "boom")],
        )];
        let mut settings = DcpSettings::default();
        settings.strategies.purge_errors.turns = 10;
        let mut state = SessionState::default();
        sync_tool_cache(&mut state, &messages, &settings);
        rebuild_tool_id_list(&mut state, &messages);
        age_entry(&mut state, "e1", 0);
        state.current_turn = 9;

        assert!(run(&mut state, &settings, &messages).is_none());
        state.current_turn = 10;
        assert!(run(&mut state, &settings, &messages).is_some());
    }
}
