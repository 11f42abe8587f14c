//! The per-turn transform pipeline.
//!
//! Fixed order inside one `messages.transform`:
//! session check → tool-cache sync → strategy pipeline → content rewriter
//! → context injector. The manifest the model sees is therefore always
//! stale by exactly one turn: it reflects state as of the previous turn's
//! end plus whatever the strategies did this turn.
//!
//! The session mutex is never held across an await; sidecar loading and
//! host RPCs happen between lock windows. The host guarantees transforms
//! and tool executions for one session never interleave, so the gap is
//! safe.

use tracing::{debug, error};

use dcp_core::messages::{last_real_user_message, Message};
use dcp_core::{Role, SessionId};
use dcp_host::HostApi;
use dcp_settings::DcpSettings;

use crate::injector::inject_context;
use crate::notification::{dispatch, format_strategy_reports};
use crate::persistence;
use crate::rewriter::{apply_compress_summaries, redact_messages, synthetic_message, SyntheticIds};
use crate::session::{
    audit_prune_set, check_session, detect_compaction, rebuild_tool_id_list, sync_tool_cache,
};
use crate::state::SessionRegistry;
use crate::strategies::{run_pipeline, StrategyReport};

/// What one transform did.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    /// The transform was a pass-through (disabled, sub-agent, no session).
    pub skipped: bool,
    /// First touch of this session (sidecar was loaded).
    pub session_changed: bool,
    /// A host compaction was detected and caches were cleared.
    pub compaction_detected: bool,
    /// Strategy reports from this turn.
    pub reports: Vec<StrategyReport>,
    /// A synthetic context message or part was appended.
    pub injected: bool,
}

/// Run the full transform pipeline over an outgoing transcript.
pub async fn transform_messages(
    registry: &SessionRegistry,
    settings: &DcpSettings,
    host: &dyn HostApi,
    messages: &mut Vec<Message>,
) -> TransformOutcome {
    if !settings.enabled {
        return TransformOutcome {
            skipped: true,
            ..TransformOutcome::default()
        };
    }

    let Some(session_id) = last_real_user_message(messages).map(|m| m.info.session_id.clone())
    else {
        return TransformOutcome {
            skipped: true,
            ..TransformOutcome::default()
        };
    };

    let state_arc = registry.get_or_create(&session_id);

    // ── Session check (lock window 1) ───────────────────────────────────
    let changed = {
        let mut state = state_arc.lock();
        check_session(&mut state, messages).changed
    };

    // ── First touch: sub-agent lookup + sidecar load (no lock held) ─────
    if changed {
        ensure_initialized(registry, settings, host, &session_id).await;
    }

    // ── Main pipeline (lock window 2, fully synchronous) ────────────────
    let (outcome, notification_body, pending_prompt) = {
        let mut state = state_arc.lock();

        if state.is_sub_agent {
            debug!(%session_id, "sub-agent session; transform is a pass-through");
            return TransformOutcome {
                skipped: true,
                session_changed: changed,
                ..TransformOutcome::default()
            };
        }

        let compaction_detected = detect_compaction(&mut state, messages);
        sync_tool_cache(&mut state, messages, settings);
        rebuild_tool_id_list(&mut state, messages);
        audit_prune_set(&state);

        let automatic = if state.manual_mode {
            settings.manual_mode.automatic_strategies
        } else {
            true
        };
        let reports = if automatic {
            run_pipeline(&mut state, settings, messages)
        } else {
            Vec::new()
        };

        redact_messages(messages, &state);
        apply_compress_summaries(messages, &state);

        let pending_prompt = state
            .pending_manual_trigger
            .take()
            .filter(|t| Some(&t.session_id) == state.session_id.as_ref())
            .map(|t| t.prompt);

        let injected = inject_context(messages, &state, settings);

        let body = format_strategy_reports(&reports, settings);
        (
            TransformOutcome {
                skipped: false,
                session_changed: changed,
                compaction_detected,
                reports,
                injected,
            },
            body,
            pending_prompt,
        )
    };

    // ── Manual trigger splice ───────────────────────────────────────────
    if let Some(prompt) = pending_prompt {
        if let Some(template) = last_real_user_message(messages).cloned() {
            let mut ids = SyntheticIds::new();
            ids_offset(&mut ids, messages);
            let msg = synthetic_message(&mut ids, &template, Role::User, prompt);
            messages.push(msg);
        }
    }

    // ── Notification (best effort, no lock held) ────────────────────────
    if let Some(body) = notification_body {
        dispatch(host, settings, &session_id, body).await;
    }

    outcome
}

/// First-touch initialization for a session.
///
/// Resolves sub-agent status via `session.get` and restores the persisted
/// sidecar. Both steps are best effort: a failed lookup assumes a root
/// session, a missing or corrupt sidecar starts fresh.
pub async fn ensure_initialized(
    registry: &SessionRegistry,
    settings: &DcpSettings,
    host: &dyn HostApi,
    session_id: &SessionId,
) {
    let state_arc = registry.get_or_create(session_id);

    match host.session_get(session_id).await {
        Ok(info) => {
            let mut state = state_arc.lock();
            state.is_sub_agent = info.is_sub_agent();
            if state.model.is_none() {
                state.model.clone_from(&info.model);
            }
        }
        Err(err) => error!(%session_id, %err, "session.get failed; assuming root session"),
    }

    let dir = persistence::state_dir(settings);
    if let Some(persisted) = persistence::load(&dir, session_id).await {
        let mut state = state_arc.lock();
        persistence::apply(&mut state, persisted);
    }

    let mut state = state_arc.lock();
    state.manual_mode = settings.manual_mode.enabled;
}

/// Advance a synthetic-id generator past ids already used in this
/// transcript, so a second injection in the same transform stays unique.
fn ids_offset(ids: &mut SyntheticIds, messages: &[Message]) {
    let used = messages.iter().filter(|m| m.is_synthetic()).count() as u64;
    for _ in 0..(used * 2) {
        let _ = ids.next_message_id();
    }
}

/// Persist a session's sidecar in the background.
///
/// Called by the tool dispatcher after every state mutation.
pub fn persist_session(registry: &SessionRegistry, settings: &DcpSettings, session_id: &SessionId) {
    let state_arc = registry.get_or_create(session_id);
    let snapshot = {
        let state = state_arc.lock();
        persistence::snapshot(&state)
    };
    persistence::spawn_save(persistence::state_dir(settings), session_id.clone(), snapshot);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
