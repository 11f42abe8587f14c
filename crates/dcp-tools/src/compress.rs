//! The `compress` tool.
//!
//! Folds a contiguous message range into a model-authored summary. The
//! range is addressed by two exact boundary strings; each must occur
//! exactly once across the searchable conversation — existing compress
//! summaries first (the model may quote text that now only exists in a
//! summary), then every part's text, tool input, and tool output.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use dcp_core::messages::{Message, Part};
use dcp_core::tokens::{estimate_message_tokens, estimate_text_tokens};
use dcp_core::{CallId, DcpError, MessageId, ValidationError};
use dcp_engine::notification::{
    dispatch, format_tool_notification, PruneReason, ToolNotification,
};
use dcp_engine::state::CompressSummary;
use dcp_engine::transform::persist_session;
use dcp_settings::DcpSettings;

use crate::executor::{fetch_transcript, mark_prune_success};
use crate::prompts::COMPRESS_DESCRIPTION;
use crate::template::render;
use crate::{DcpTool, ToolContext, ToolDefinition, SUB_AGENT_MESSAGE};

/// The compressed range description.
#[derive(Debug, Deserialize)]
struct CompressContent {
    /// Exact text beginning the range.
    #[serde(rename = "startString")]
    start_string: String,
    /// Exact text ending the range.
    #[serde(rename = "endString")]
    end_string: String,
    /// Replacement text.
    summary: String,
}

/// Parameters for `compress`.
#[derive(Debug, Deserialize)]
struct CompressParams {
    /// Short label for the compressed phase.
    topic: String,
    /// Range boundaries and summary.
    content: CompressContent,
}

/// Where a boundary string was located.
#[derive(Clone, Debug, PartialEq, Eq)]
struct BoundaryHit {
    message_index: usize,
    message_id: MessageId,
}

/// Folds a message range into a summary.
pub struct CompressTool;

#[async_trait]
impl DcpTool for CompressTool {
    fn name(&self) -> &'static str {
        "compress"
    }

    fn definition(&self, settings: &DcpSettings) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: render(COMPRESS_DESCRIPTION, |tool| settings.tool_enabled(tool)),
            parameters: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Short label for the compressed phase"
                    },
                    "content": {
                        "type": "object",
                        "properties": {
                            "startString": {
                                "type": "string",
                                "description": "Exact text that begins the range; must occur exactly once"
                            },
                            "endString": {
                                "type": "string",
                                "description": "Exact text that ends the range; must occur exactly once"
                            },
                            "summary": {
                                "type": "string",
                                "description": "Replacement text preserving every fact still needed"
                            }
                        },
                        "required": ["startString", "endString", "summary"]
                    }
                },
                "required": ["topic", "content"]
            }),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String, DcpError> {
        let state_arc = ctx.registry.get_or_create(&ctx.session_id);
        if state_arc.lock().is_sub_agent {
            return Ok(SUB_AGENT_MESSAGE.to_owned());
        }

        let params: CompressParams = serde_json::from_value(params).map_err(|e| {
            DcpError::Validation(ValidationError::InvalidTargets {
                reason: e.to_string(),
            })
        })?;

        let transcript = fetch_transcript(ctx).await;

        let (message_count, tool_count, tokens_saved) = {
            let mut state = state_arc.lock();

            let start = find_single(
                &params.content.start_string,
                &state.compress_summaries,
                &transcript,
                "startString",
            )?;
            let end = find_single(
                &params.content.end_string,
                &state.compress_summaries,
                &transcript,
                "endString",
            )?;
            if start.message_index > end.message_index {
                return Err(ValidationError::InvertedRange.into());
            }

            let range = &transcript[start.message_index..=end.message_index];
            let mut range_message_ids: Vec<MessageId> = Vec::new();
            let mut range_tool_ids: Vec<CallId> = Vec::new();
            let mut range_tokens = 0u64;
            for message in range {
                range_message_ids.push(message.info.id.clone());
                range_tokens += estimate_message_tokens(message);
                for (raw_id, _, _) in message.tool_parts() {
                    range_tool_ids.push(CallId::normalized(raw_id));
                }
            }

            let message_count = range_message_ids.len();
            let tool_count = range_tool_ids.len();

            for id in &range_message_ids {
                let _ = state.prune.message_ids.insert(id.clone());
            }
            for id in &range_tool_ids {
                let _ = state.prune.tool_ids.insert(id.clone());
                if let Some(entry) = state.tool_cache.get_mut(id) {
                    entry.compacted = true;
                }
            }

            // A range that swallows an older anchor replaces that summary.
            state
                .compress_summaries
                .retain(|s| !range_message_ids.contains(&s.anchor_message_id));
            state.compress_summaries.push(CompressSummary {
                anchor_message_id: start.message_id.clone(),
                summary: params.content.summary.clone(),
            });

            let tokens =
                range_tokens.saturating_sub(estimate_text_tokens(&params.content.summary));
            mark_prune_success(&mut state, tokens);
            (message_count, tool_count, tokens)
        };

        info!(
            session = %ctx.session_id,
            message_count,
            tool_count,
            tokens_saved,
            topic = %params.topic,
            "compress tool applied"
        );
        persist_session(ctx.registry, ctx.settings, &ctx.session_id);

        let notification = ToolNotification {
            reason: PruneReason::Compressed,
            pruned_count: message_count,
            tokens_saved,
            distillations: Vec::new(),
            topic: Some(params.topic.clone()),
            summary: Some(params.content.summary.clone()),
        };
        let body = format_tool_notification(&notification, ctx.settings);
        dispatch(ctx.host, ctx.settings, &ctx.session_id, body).await;

        Ok(format!(
            "Compressed {message_count} messages and {tool_count} tool calls into a summary ({}).",
            params.topic,
        ))
    }
}

/// Locate a boundary string, requiring exactly one occurrence across the
/// searchable conversation.
fn find_single(
    needle: &str,
    summaries: &[CompressSummary],
    messages: &[Message],
    which: &'static str,
) -> Result<BoundaryHit, ValidationError> {
    if needle.is_empty() {
        return Err(ValidationError::BoundaryNotFound { which });
    }

    let mut occurrences = 0usize;
    let mut hit: Option<BoundaryHit> = None;

    let mut record = |count: usize, index: usize, id: &MessageId| {
        if count == 0 {
            return;
        }
        occurrences += count;
        if hit.is_none() {
            hit = Some(BoundaryHit {
                message_index: index,
                message_id: id.clone(),
            });
        }
    };

    // Existing summaries first: the model may quote compressed text.
    for summary in summaries {
        let count = summary.summary.matches(needle).count();
        if count > 0 {
            if let Some(index) = messages
                .iter()
                .position(|m| m.info.id == summary.anchor_message_id)
            {
                record(count, index, &summary.anchor_message_id);
            }
        }
    }

    // Then every part's text, tool input, and tool output.
    for (index, message) in messages.iter().enumerate() {
        for part in &message.parts {
            let count = match part {
                Part::Text { text, .. } => text.matches(needle).count(),
                Part::Tool { state, .. } => {
                    let input = Value::Object(state.input.clone()).to_string();
                    input.matches(needle).count()
                        + state
                            .output
                            .as_deref()
                            .map_or(0, |o| o.matches(needle).count())
                }
                Part::StepStart | Part::StepFinish | Part::Unknown => 0,
            };
            record(count, index, &message.info.id);
        }
    }

    match occurrences {
        1 => hit.ok_or(ValidationError::BoundaryNotFound { which }),
        0 => Err(ValidationError::BoundaryNotFound { which }),
        _ => Err(ValidationError::BoundaryAmbiguous { which }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
