//! The `prune` tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use dcp_core::{DcpError, ValidationError};
use dcp_engine::notification::{
    dispatch, format_tool_notification, PruneReason, ToolNotification,
};
use dcp_engine::strategies::output_tokens;
use dcp_engine::transform::persist_session;
use dcp_settings::DcpSettings;

use crate::executor::{fetch_transcript, mark_prune_success, resolve_ids};
use crate::prompts::PRUNE_DESCRIPTION;
use crate::template::render;
use crate::{DcpTool, ToolContext, ToolDefinition, SUB_AGENT_MESSAGE};

/// Parameters for `prune`.
#[derive(Debug, Deserialize)]
struct PruneParams {
    /// Numeric indices into the `<prunable-tools>` list.
    #[serde(default)]
    ids: Vec<String>,
}

/// Discards tool outputs by numeric index.
pub struct PruneTool;

#[async_trait]
impl DcpTool for PruneTool {
    fn name(&self) -> &'static str {
        "prune"
    }

    fn definition(&self, settings: &DcpSettings) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: render(PRUNE_DESCRIPTION, |tool| settings.tool_enabled(tool)),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Numeric indices from the <prunable-tools> list"
                    }
                },
                "required": ["ids"]
            }),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String, DcpError> {
        let state_arc = ctx.registry.get_or_create(&ctx.session_id);
        if state_arc.lock().is_sub_agent {
            return Ok(SUB_AGENT_MESSAGE.to_owned());
        }

        let params: PruneParams = serde_json::from_value(params).map_err(|e| {
            DcpError::Validation(ValidationError::InvalidIds { ids: e.to_string() })
        })?;

        let transcript = fetch_transcript(ctx).await;

        let (pruned_count, tokens_saved, note) = {
            let mut state = state_arc.lock();
            let resolved = resolve_ids(&state, ctx.settings, &params.ids)?;

            let mut tokens = 0u64;
            for id in &resolved.ids {
                tokens += output_tokens(&transcript, id);
                let _ = state.prune.tool_ids.insert(id.clone());
            }
            mark_prune_success(&mut state, tokens);
            (resolved.ids.len(), tokens, resolved.skipped_note())
        };

        info!(session = %ctx.session_id, pruned_count, tokens_saved, "prune tool applied");
        persist_session(ctx.registry, ctx.settings, &ctx.session_id);

        let notification = ToolNotification {
            reason: PruneReason::Noise,
            pruned_count,
            tokens_saved,
            distillations: Vec::new(),
            topic: None,
            summary: None,
        };
        let body = format_tool_notification(&notification, ctx.settings);
        dispatch(ctx.host, ctx.settings, &ctx.session_id, body).await;

        Ok(format!(
            "Pruned {pruned_count} tool {}.{note}",
            if pruned_count == 1 { "output" } else { "outputs" },
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
