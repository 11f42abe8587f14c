//! The `distill` tool.
//!
//! Behaves like `prune`, but every discarded output is paired with a
//! model-authored distillation that survives in the notification. The
//! engine stores and displays distillations; it never parses or verifies
//! them.
//!
//! Two parameter shapes are accepted: the contractual object-array form
//! `targets: [{id, distillation}]`, and a legacy parallel-array form
//! `{ids: [...], distillations: [...]}` normalized at parse time.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use dcp_core::{CallId, DcpError, ValidationError};
use dcp_engine::notification::{
    dispatch, format_tool_notification, PruneReason, ToolNotification,
};
use dcp_engine::strategies::output_tokens;
use dcp_engine::transform::persist_session;
use dcp_settings::DcpSettings;

use crate::executor::{fetch_transcript, mark_prune_success, resolve_ids};
use crate::prompts::DISTILL_DESCRIPTION;
use crate::template::render;
use crate::{DcpTool, ToolContext, ToolDefinition, SUB_AGENT_MESSAGE};

/// One distillation target (contract form).
#[derive(Debug, Deserialize)]
struct DistillTarget {
    /// Numeric index into the `<prunable-tools>` list.
    id: String,
    /// What mattered in that output.
    distillation: String,
}

/// Raw parameters, both accepted shapes.
#[derive(Debug, Deserialize)]
struct DistillParams {
    /// Contract form.
    #[serde(default)]
    targets: Vec<DistillTarget>,
    /// Legacy parallel-array form.
    #[serde(default)]
    ids: Vec<String>,
    /// Legacy parallel-array form.
    #[serde(default)]
    distillations: Vec<String>,
}

impl DistillParams {
    /// Normalize both shapes into `(index, distillation)` pairs.
    fn normalized(self) -> Result<Vec<(String, String)>, ValidationError> {
        if !self.targets.is_empty() {
            return Ok(self
                .targets
                .into_iter()
                .map(|t| (t.id, t.distillation))
                .collect());
        }
        if self.ids.is_empty() {
            return Err(ValidationError::EmptyIds);
        }
        if self.ids.len() != self.distillations.len() {
            return Err(ValidationError::InvalidTargets {
                reason: format!(
                    "{} ids but {} distillations",
                    self.ids.len(),
                    self.distillations.len()
                ),
            });
        }
        Ok(self.ids.into_iter().zip(self.distillations).collect())
    }
}

/// Discards tool outputs while preserving distilled knowledge.
pub struct DistillTool;

#[async_trait]
impl DcpTool for DistillTool {
    fn name(&self) -> &'static str {
        "distill"
    }

    fn definition(&self, settings: &DcpSettings) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: render(DISTILL_DESCRIPTION, |tool| settings.tool_enabled(tool)),
            parameters: json!({
                "type": "object",
                "properties": {
                    "targets": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {
                                    "type": "string",
                                    "description": "Numeric index from the <prunable-tools> list"
                                },
                                "distillation": {
                                    "type": "string",
                                    "description": "One-sentence record of what mattered in the output"
                                }
                            },
                            "required": ["id", "distillation"]
                        }
                    }
                },
                "required": ["targets"]
            }),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String, DcpError> {
        let state_arc = ctx.registry.get_or_create(&ctx.session_id);
        if state_arc.lock().is_sub_agent {
            return Ok(SUB_AGENT_MESSAGE.to_owned());
        }

        let params: DistillParams = serde_json::from_value(params).map_err(|e| {
            DcpError::Validation(ValidationError::InvalidTargets {
                reason: e.to_string(),
            })
        })?;
        let pairs = params.normalized().map_err(DcpError::Validation)?;
        let raw_ids: Vec<String> = pairs.iter().map(|(id, _)| id.clone()).collect();

        let transcript = fetch_transcript(ctx).await;

        let (distilled, tokens_saved, note) = {
            let mut state = state_arc.lock();
            let resolved = resolve_ids(&state, ctx.settings, &raw_ids)?;

            let mut tokens = 0u64;
            let mut kept: Vec<(CallId, String)> = Vec::new();
            for id in &resolved.ids {
                tokens += output_tokens(&transcript, id);
                let _ = state.prune.tool_ids.insert(id.clone());
                // Pair the survivor back with its distillation.
                if let Some(index) = state.tool_id_list.iter().position(|x| x == id) {
                    if let Some((_, distillation)) =
                        pairs.iter().find(|(raw, _)| raw.trim() == index.to_string())
                    {
                        kept.push((id.clone(), distillation.clone()));
                    }
                }
            }
            mark_prune_success(&mut state, tokens);
            (kept, tokens, resolved.skipped_note())
        };

        info!(
            session = %ctx.session_id,
            distilled = distilled.len(),
            tokens_saved,
            "distill tool applied"
        );
        persist_session(ctx.registry, ctx.settings, &ctx.session_id);

        let notification = ToolNotification {
            reason: PruneReason::Distilled,
            pruned_count: distilled.len(),
            tokens_saved,
            distillations: distilled.clone(),
            topic: None,
            summary: None,
        };
        let body = format_tool_notification(&notification, ctx.settings);
        dispatch(ctx.host, ctx.settings, &ctx.session_id, body).await;

        Ok(format!(
            "Distilled {} tool {}.{note}",
            distilled.len(),
            if distilled.len() == 1 {
                "output"
            } else {
                "outputs"
            },
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assistant_msg, completed_tool, user_msg, StubHost};
    use dcp_core::SessionId;
    use dcp_engine::session::{rebuild_tool_id_list, sync_tool_cache};
    use dcp_engine::SessionRegistry;
    use serde_json::json;

    fn transcript() -> Vec<dcp_core::Message> {
        vec![
            user_msg("m1", "investigate"),
            assistant_msg(
                "m2",
                vec![completed_tool(
                    "a",
                    "bash",
                    &[("command", json!("cargo test"))],
                    "all 42 tests pass",
                )],
            ),
        ]
    }

    fn setup<'a>(
        registry: &'a SessionRegistry,
        settings: &'a DcpSettings,
        host: &'a StubHost,
    ) -> ToolContext<'a> {
        let state_arc = registry.get_or_create(&SessionId::from("ses_1"));
        {
            let mut state = state_arc.lock();
            sync_tool_cache(&mut state, &host.messages, settings);
            rebuild_tool_id_list(&mut state, &host.messages);
        }
        ToolContext {
            registry,
            settings,
            host,
            session_id: SessionId::from("ses_1"),
        }
    }

    #[tokio::test]
    async fn object_array_form_distills() {
        let registry = SessionRegistry::new();
        let mut settings = DcpSettings::default();
        settings.state_dir = Some(tempfile::tempdir().unwrap().path().display().to_string());
        let host = StubHost::new(transcript());
        let ctx = setup(&registry, &settings, &host);

        let result = DistillTool
            .execute(
                json!({"targets": [{"id": "0", "distillation": "all 42 tests pass"}]}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result, "Distilled 1 tool output.");

        let state_arc = registry.get_or_create(&SessionId::from("ses_1"));
        assert!(state_arc
            .lock()
            .prune
            .tool_ids
            .contains(&CallId::from("a")));

        let toasts = host.toasts.lock();
        assert!(toasts[0].message.contains("kept: all 42 tests pass"));
    }

    #[tokio::test]
    async fn parallel_array_form_accepted() {
        let registry = SessionRegistry::new();
        let mut settings = DcpSettings::default();
        settings.state_dir = Some(tempfile::tempdir().unwrap().path().display().to_string());
        let host = StubHost::new(transcript());
        let ctx = setup(&registry, &settings, &host);

        let result = DistillTool
            .execute(
                json!({"ids": ["0"], "distillations": ["tests are green"]}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result, "Distilled 1 tool output.");
    }

    #[tokio::test]
    async fn mismatched_parallel_arrays_rejected() {
        let registry = SessionRegistry::new();
        let settings = DcpSettings::default();
        let host = StubHost::new(transcript());
        let ctx = setup(&registry, &settings, &host);

        let err = DistillTool
            .execute(json!({"ids": ["0", "1"], "distillations": ["only one"]}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DcpError::Validation(ValidationError::InvalidTargets { .. })
        ));
    }

    #[tokio::test]
    async fn empty_targets_rejected() {
        let registry = SessionRegistry::new();
        let settings = DcpSettings::default();
        let host = StubHost::new(transcript());
        let ctx = setup(&registry, &settings, &host);

        let err = DistillTool.execute(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            DcpError::Validation(ValidationError::EmptyIds)
        ));
    }

    #[tokio::test]
    async fn sub_agent_short_circuits() {
        let registry = SessionRegistry::new();
        let settings = DcpSettings::default();
        let host = StubHost::new(Vec::new());
        {
            let state_arc = registry.get_or_create(&SessionId::from("ses_1"));
            state_arc.lock().is_sub_agent = true;
        }
        let ctx = ToolContext {
            registry: &registry,
            settings: &settings,
            host: &host,
            session_id: SessionId::from("ses_1"),
        };
        let result = DistillTool
            .execute(json!({"targets": [{"id": "0", "distillation": "x"}]}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, SUB_AGENT_MESSAGE);
    }
}
