//! Session boundary and compaction detection, plus tool-cache sync.
//!
//! The authoritative session id for a turn is the `sessionID` of the last
//! user message the engine did not inject itself. When it changes, all
//! state is discarded and the persisted sidecar for the new session is
//! loaded by the caller. A host compaction (assistant message flagged
//! `summary`) invalidates every cache derived from the old transcript.

use tracing::{debug, warn};

use dcp_core::messages::{last_real_user_message, Message};
use dcp_core::{CallId, SessionId, ToolStatus};
use dcp_settings::DcpSettings;

use crate::state::{SessionState, ToolEntry};

/// Tools whose successful execution arms the cooldown.
pub const PRUNING_TOOLS: &[&str] = &["prune", "distill", "compress"];

/// Outcome of a session check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCheck {
    /// The authoritative session id for this turn, when one exists.
    pub session_id: Option<SessionId>,
    /// The id differed from the bound one and state was reset.
    pub changed: bool,
}

/// Bind the state to the transcript's session, resetting on change.
///
/// Returns `changed = true` when the caller should load the persisted
/// sidecar for the new session.
pub fn check_session(state: &mut SessionState, messages: &[Message]) -> SessionCheck {
    let Some(current) = last_real_user_message(messages).map(|m| m.info.session_id.clone())
    else {
        return SessionCheck {
            session_id: state.session_id.clone(),
            changed: false,
        };
    };

    if state.session_id.as_ref() == Some(&current) {
        return SessionCheck {
            session_id: Some(current),
            changed: false,
        };
    }

    debug!(
        from = ?state.session_id,
        to = %current,
        "session changed, resetting state"
    );
    state.reset_for_session(current.clone());
    SessionCheck {
        session_id: Some(current),
        changed: true,
    }
}

/// Detect a host-side compaction and clear derived caches.
///
/// Scans newest→oldest for an assistant message flagged `summary` that is
/// newer than the last handled compaction. Returns `true` when one was
/// found and the caches were cleared.
pub fn detect_compaction(state: &mut SessionState, messages: &[Message]) -> bool {
    let newest = messages
        .iter()
        .rev()
        .find(|m| m.is_assistant() && m.is_summary() && m.info.time.created > state.last_compaction);

    let Some(summary_msg) = newest else {
        return false;
    };

    debug!(
        ts = summary_msg.info.time.created,
        "host compaction detected, clearing tool caches and prune sets"
    );
    state.clear_for_compaction(summary_msg.info.time.created);
    true
}

/// Sync the tool cache with the transcript.
///
/// Every tool part not already cached is inserted with its parameters and
/// status. New non-protected results bump the nudge counter; the cooldown
/// flag tracks whether the most recently observed tool was a pruning tool.
pub fn sync_tool_cache(state: &mut SessionState, messages: &[Message], settings: &DcpSettings) {
    state.current_turn = messages.iter().map(Message::step_starts).sum::<usize>() as u64;

    for message in messages {
        for (raw_id, tool, tool_state) in message.tool_parts() {
            let id = CallId::normalized(raw_id);

            let now_finished =
                matches!(tool_state.status, ToolStatus::Completed | ToolStatus::Error);

            let newly_finished = if let Some(entry) = state.tool_cache.get_mut(&id) {
                // Status may progress pending → running → completed/error.
                if entry.status == tool_state.status {
                    continue;
                }
                let was_finished =
                    matches!(entry.status, ToolStatus::Completed | ToolStatus::Error);
                entry.status = tool_state.status;
                entry.error.clone_from(&tool_state.error);
                now_finished && !was_finished
            } else {
                let turn = state.current_turn;
                state.tool_cache.insert(
                    id,
                    ToolEntry {
                        tool: tool.to_owned(),
                        parameters: tool_state.input.clone(),
                        status: tool_state.status,
                        error: tool_state.error.clone(),
                        turn,
                        compacted: false,
                    },
                );
                now_finished
            };

            if newly_finished {
                if !settings.is_protected_tool(tool) {
                    state.nudge_counter += 1;
                }
                state.last_tool_prune = PRUNING_TOOLS.contains(&tool);
            }
        }
    }

    let prune_refs = state.prune.tool_ids.clone();
    state.tool_cache.evict(&prune_refs);
}

/// Rebuild the index → call-id dictionary from the transcript.
///
/// First-seen order; this is the list the model addresses via numeric
/// indices in `<prunable-tools>`.
pub fn rebuild_tool_id_list(state: &mut SessionState, messages: &[Message]) {
    let mut list: Vec<CallId> = Vec::new();
    for message in messages {
        for (raw_id, _, _) in message.tool_parts() {
            let id = CallId::normalized(raw_id);
            if !list.contains(&id) {
                list.push(id);
            }
        }
    }
    state.tool_id_list = list;
}

/// Warn about prune-set ids that no longer resolve anywhere.
///
/// An id in the prune set without cache metadata and outside every
/// compress range is an internal invariant violation: logged, skipped,
/// never fatal.
pub fn audit_prune_set(state: &SessionState) {
    for id in &state.prune.tool_ids {
        if !state.tool_cache.contains(id) && state.compress_summaries.is_empty() {
            warn!(call_id = %id, "pruned id has no metadata and no compress range; skipping");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_core::messages::{MessageInfo, Part, Role, TimeInfo, ToolState};
    use dcp_core::MessageId;
    use serde_json::Map;

    fn msg(id: &str, role: Role, session: &str, parts: Vec<Part>) -> Message {
        Message {
            info: MessageInfo {
                id: MessageId::from(id),
                role,
                session_id: SessionId::from(session),
                time: TimeInfo { created: 1000 },
                agent: None,
                model: None,
                summary: None,
                variant: None,
            },
            parts,
        }
    }

    fn tool_part(call_id: &str, tool: &str, status: ToolStatus) -> Part {
        let state = match status {
            ToolStatus::Error => ToolState::errored(Map::new(), "boom"),
            _ => ToolState {
                status,
                input: Map::new(),
                output: Some("out".into()),
                error: None,
            },
        };
        Part::Tool {
            id: None,
            call_id: call_id.into(),
            tool: tool.into(),
            state,
        }
    }

    // ── check_session ───────────────────────────────────────────────────

    #[test]
    fn first_bind_counts_as_change() {
        let mut state = SessionState::default();
        let messages = vec![msg("m1", Role::User, "ses_1", vec![])];
        let check = check_session(&mut state, &messages);
        assert!(check.changed);
        assert_eq!(state.session_id.as_ref().unwrap().as_str(), "ses_1");
    }

    #[test]
    fn same_session_is_stable() {
        let mut state = SessionState::default();
        let messages = vec![msg("m1", Role::User, "ses_1", vec![])];
        let _ = check_session(&mut state, &messages);
        let check = check_session(&mut state, &messages);
        assert!(!check.changed);
    }

    #[test]
    fn session_switch_resets_state() {
        let mut state = SessionState::default();
        let _ = check_session(&mut state, &[msg("m1", Role::User, "ses_1", vec![])]);
        state.nudge_counter = 9;

        let check = check_session(&mut state, &[msg("m2", Role::User, "ses_2", vec![])]);
        assert!(check.changed);
        assert_eq!(state.session_id.as_ref().unwrap().as_str(), "ses_2");
        assert_eq!(state.nudge_counter, 0);
    }

    #[test]
    fn synthetic_user_messages_not_authoritative() {
        let mut state = SessionState::default();
        let _ = check_session(&mut state, &[msg("m1", Role::User, "ses_1", vec![])]);
        // engine-injected message for another session must not rebind
        let messages = vec![
            msg("m1", Role::User, "ses_1", vec![]),
            msg("msg_dcp_1", Role::User, "ses_2", vec![]),
        ];
        let check = check_session(&mut state, &messages);
        assert!(!check.changed);
        assert_eq!(check.session_id.unwrap().as_str(), "ses_1");
    }

    #[test]
    fn no_user_message_keeps_binding() {
        let mut state = SessionState::default();
        let check = check_session(&mut state, &[]);
        assert!(!check.changed);
        assert!(check.session_id.is_none());
    }

    // ── detect_compaction ───────────────────────────────────────────────

    #[test]
    fn compaction_clears_everything() {
        let mut state = SessionState::default();
        state.tool_cache.insert(
            CallId::from("a"),
            ToolEntry {
                tool: "read".into(),
                parameters: Map::new(),
                status: ToolStatus::Completed,
                error: None,
                turn: 1,
                compacted: false,
            },
        );
        let _ = state.prune.tool_ids.insert(CallId::from("a"));
        state.nudge_counter = 4;

        let mut summary = msg("m2", Role::Assistant, "ses_1", vec![]);
        summary.info.summary = Some(true);
        summary.info.time.created = 5000;
        let messages = vec![msg("m1", Role::User, "ses_1", vec![]), summary];

        assert!(detect_compaction(&mut state, &messages));
        assert!(state.tool_cache.is_empty());
        assert!(state.prune.tool_ids.is_empty());
        assert_eq!(state.nudge_counter, 0);
        assert_eq!(state.last_compaction, 5000);
    }

    #[test]
    fn compaction_not_redetected() {
        let mut state = SessionState::default();
        let mut summary = msg("m2", Role::Assistant, "ses_1", vec![]);
        summary.info.summary = Some(true);
        summary.info.time.created = 5000;
        let messages = vec![summary];

        assert!(detect_compaction(&mut state, &messages));
        assert!(!detect_compaction(&mut state, &messages));
    }

    #[test]
    fn non_summary_assistant_ignored() {
        let mut state = SessionState::default();
        let messages = vec![msg("m1", Role::Assistant, "ses_1", vec![])];
        assert!(!detect_compaction(&mut state, &messages));
    }

    // ── sync_tool_cache ─────────────────────────────────────────────────

    #[test]
    fn sync_caches_new_tools_and_counts_nudge() {
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        let messages = vec![msg(
            "m1",
            Role::Assistant,
            "ses_1",
            vec![
                Part::StepStart,
                tool_part("Call_A", "read", ToolStatus::Completed),
                tool_part("call_b", "bash", ToolStatus::Completed),
            ],
        )];

        sync_tool_cache(&mut state, &messages, &settings);
        assert_eq!(state.tool_cache.len(), 2);
        assert!(state.tool_cache.contains(&CallId::from("call_a")));
        assert_eq!(state.nudge_counter, 2);
        assert!(!state.last_tool_prune);
        assert_eq!(state.current_turn, 1);
    }

    #[test]
    fn sync_is_idempotent_for_nudge() {
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        let messages = vec![msg(
            "m1",
            Role::Assistant,
            "ses_1",
            vec![tool_part("a", "read", ToolStatus::Completed)],
        )];
        sync_tool_cache(&mut state, &messages, &settings);
        sync_tool_cache(&mut state, &messages, &settings);
        assert_eq!(state.nudge_counter, 1);
    }

    #[test]
    fn sync_protected_tools_do_not_nudge() {
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        let messages = vec![msg(
            "m1",
            Role::Assistant,
            "ses_1",
            vec![tool_part("a", "todowrite", ToolStatus::Completed)],
        )];
        sync_tool_cache(&mut state, &messages, &settings);
        assert_eq!(state.nudge_counter, 0);
    }

    #[test]
    fn sync_pruning_tool_sets_cooldown_flag() {
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        let messages = vec![msg(
            "m1",
            Role::Assistant,
            "ses_1",
            vec![tool_part("a", "prune", ToolStatus::Completed)],
        )];
        sync_tool_cache(&mut state, &messages, &settings);
        assert!(state.last_tool_prune);

        // a later non-pruning tool clears the flag
        let messages = vec![msg(
            "m1",
            Role::Assistant,
            "ses_1",
            vec![
                tool_part("a", "prune", ToolStatus::Completed),
                tool_part("b", "read", ToolStatus::Completed),
            ],
        )];
        sync_tool_cache(&mut state, &messages, &settings);
        assert!(!state.last_tool_prune);
    }

    #[test]
    fn sync_updates_status_of_known_calls() {
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        let pending = vec![msg(
            "m1",
            Role::Assistant,
            "ses_1",
            vec![tool_part("a", "bash", ToolStatus::Running)],
        )];
        sync_tool_cache(&mut state, &pending, &settings);
        assert_eq!(
            state.tool_cache.get(&CallId::from("a")).unwrap().status,
            ToolStatus::Running
        );

        let errored = vec![msg(
            "m1",
            Role::Assistant,
            "ses_1",
            vec![tool_part("a", "bash", ToolStatus::Error)],
        )];
        sync_tool_cache(&mut state, &errored, &settings);
        let entry = state.tool_cache.get(&CallId::from("a")).unwrap();
        assert_eq!(entry.status, ToolStatus::Error);
        assert_eq!(entry.error.as_deref(), Some("boom"));
    }

    #[test]
    fn sync_counts_turns_across_messages() {
        let mut state = SessionState::default();
        let settings = DcpSettings::default();
        let messages = vec![
            msg("m1", Role::Assistant, "ses_1", vec![Part::StepStart]),
            msg(
                "m2",
                Role::Assistant,
                "ses_1",
                vec![Part::StepStart, Part::StepStart],
            ),
        ];
        sync_tool_cache(&mut state, &messages, &settings);
        assert_eq!(state.current_turn, 3);
    }

    // ── rebuild_tool_id_list ────────────────────────────────────────────

    #[test]
    fn tool_id_list_first_seen_order() {
        let mut state = SessionState::default();
        let messages = vec![
            msg(
                "m1",
                Role::Assistant,
                "ses_1",
                vec![
                    tool_part("B", "read", ToolStatus::Completed),
                    tool_part("a", "bash", ToolStatus::Completed),
                ],
            ),
            msg(
                "m2",
                Role::Assistant,
                "ses_1",
                vec![tool_part("b", "read", ToolStatus::Completed)],
            ),
        ];
        rebuild_tool_id_list(&mut state, &messages);
        assert_eq!(
            state.tool_id_list,
            vec![CallId::from("b"), CallId::from("a")]
        );
    }
}
