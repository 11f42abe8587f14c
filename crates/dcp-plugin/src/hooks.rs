//! Hook handlers.
//!
//! Thin adapters from the host's hook shapes into the engine. Each handler
//! is infallible from the host's point of view: failures are logged and
//! swallowed so a misbehaving engine can never take down a chat turn.

use serde_json::Value;
use tracing::debug;

use dcp_core::messages::Message;
use dcp_core::SessionId;
use dcp_engine::model_selector::{is_analysis_capable, parse_model_ref, select_model};
use dcp_engine::transform::{transform_messages, TransformOutcome};
use dcp_tools::{enabled_tools, prompts, template};

use crate::DcpPlugin;

/// System-prompt signatures of internal host agents the engine must leave
/// alone (title generation, summarization helpers and the like).
const INTERNAL_AGENT_SIGNATURES: &[&str] = &[
    "You are a title generator",
    "You are a summarizer",
    "Generate a short title",
];

/// Input of the `chat.message` hook.
#[derive(Clone, Debug, Default)]
pub struct ChatMessageInput {
    /// Session the message belongs to.
    pub session_id: Option<SessionId>,
    /// Model in `provider/model` form.
    pub model: Option<String>,
    /// Model variant.
    pub variant: Option<String>,
    /// Model context limit in tokens, when the host knows it.
    pub context_limit: Option<u64>,
}

/// Input of the `event` hook.
#[derive(Clone, Debug)]
pub struct EventInput {
    /// Event type, e.g. `session.status`.
    pub event_type: String,
    /// Event properties.
    pub properties: Value,
}

impl DcpPlugin {
    /// `chat.message`: observe model metadata for later synthetic-message
    /// emission and model selection.
    pub fn on_chat_message(&self, input: &ChatMessageInput) {
        let Some(session_id) = &input.session_id else {
            return;
        };
        let state_arc = self.registry.get_or_create(session_id);
        let mut state = state_arc.lock();
        if input.model.is_some() {
            state.model.clone_from(&input.model);
            state.last_chat_params = input.model.as_deref().and_then(parse_model_ref);
        }
        if input.variant.is_some() {
            state.variant.clone_from(&input.variant);
        }
        if input.context_limit.is_some() {
            state.model_context_limit = input.context_limit;
        }
    }

    /// System transform: append the rendered context-management prompt.
    ///
    /// Skipped when no tool is enabled or when the system prompt belongs
    /// to an internal host agent.
    pub fn transform_system(&self, system: &mut Vec<String>) {
        if !self.settings.enabled || !self.settings.any_tool_enabled() {
            return;
        }
        if system.iter().any(|s| {
            INTERNAL_AGENT_SIGNATURES
                .iter()
                .any(|signature| s.contains(signature))
        }) {
            debug!("internal agent detected; system prompt not extended");
            return;
        }
        let rendered = template::render(prompts::SYSTEM_PROMPT, |tool| {
            self.settings.tool_enabled(tool)
        });
        system.push(rendered);
    }

    /// Messages transform: the main per-turn entry point.
    pub async fn transform_messages(&self, messages: &mut Vec<Message>) -> TransformOutcome {
        transform_messages(&self.registry, &self.settings, self.host.as_ref(), messages).await
    }

    /// `config`: register the `/dcp` command family and the enabled tools
    /// with the host.
    pub fn on_config(&self, config: &mut Value) {
        if !self.settings.enabled {
            return;
        }
        let Some(root) = config.as_object_mut() else {
            return;
        };

        if self.settings.commands.enabled {
            let commands = root
                .entry("command")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Some(map) = commands.as_object_mut() {
                let _ = map.insert(
                    "dcp".to_owned(),
                    serde_json::json!({
                        "description": "Dynamic context pruning: context, stats, sweep, manual, prune, distill, compress",
                    }),
                );
            }
        }

        let tool_names: Vec<Value> = enabled_tools(&self.settings)
            .iter()
            .map(|t| Value::String(t.name().to_owned()))
            .collect();
        if !tool_names.is_empty() {
            let experimental = root
                .entry("experimental")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Some(map) = experimental.as_object_mut() {
                let primary = map
                    .entry("primaryTools")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Some(list) = primary.as_array_mut() {
                    for name in tool_names {
                        if !list.contains(&name) {
                            list.push(name);
                        }
                    }
                }
            }
        }
    }

    /// `event`: handle idle sessions.
    ///
    /// Idle root sessions are the trigger surface for background analysis:
    /// the provider/model negotiation runs here so that fallbacks (and
    /// their toasts) surface at idle time rather than mid-analysis.
    /// Sub-agent and unknown sessions are ignored.
    pub async fn on_event(&self, event: &EventInput) {
        if event.event_type != "session.status" {
            return;
        }
        let is_idle = event.properties.get("status").and_then(Value::as_str) == Some("idle");
        let Some(session_id) = event
            .properties
            .get("sessionID")
            .and_then(Value::as_str)
            .map(SessionId::from)
        else {
            return;
        };
        if !is_idle {
            return;
        }

        let state_arc = self.registry.get_or_create(&session_id);
        // Snapshot so the lock is not held across the selection await.
        let snapshot = state_arc.lock().clone();
        if snapshot.is_sub_agent {
            return;
        }

        let session_model = snapshot.model.clone();
        let selected = select_model(
            &self.settings,
            &snapshot,
            session_model.as_deref(),
            is_analysis_capable,
            self.host.as_ref(),
        )
        .await;
        match selected {
            Some(selected) => debug!(
                %session_id,
                provider = %selected.model.provider_id,
                model = %selected.model.model_id,
                "session idle; analysis model selected"
            ),
            None => debug!(%session_id, "session idle; no usable analysis model"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
