//! Shared validation and execution shell for the pruning tools.
//!
//! Index resolution is all-or-nothing per entry but not per call: valid
//! indices proceed while invalid ones are collected and reported back in
//! the result string. A call where *nothing* resolves fails with the most
//! specific validation error, and no state is mutated.

use dcp_core::messages::Message;
use dcp_core::paths::matches_any_glob;
use dcp_core::{CallId, ValidationError};
use dcp_engine::state::SessionState;
use dcp_engine::tool_params::extract_file_paths;
use dcp_settings::DcpSettings;

use crate::ToolContext;

/// Outcome of resolving the model-supplied index strings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedTargets {
    /// Call ids that passed every check, in request order.
    pub ids: Vec<CallId>,
    /// Human-readable reasons for every skipped entry.
    pub skipped: Vec<String>,
}

impl ResolvedTargets {
    /// Render the skipped entries for the result string.
    #[must_use]
    pub fn skipped_note(&self) -> String {
        if self.skipped.is_empty() {
            String::new()
        } else {
            format!(" Skipped: {}.", self.skipped.join("; "))
        }
    }
}

/// Resolve numeric index strings against the live tool list.
///
/// Rejects the whole call (`Err`) when the list is empty or when no entry
/// survives validation; otherwise returns the survivors plus skip notes.
pub fn resolve_ids(
    state: &SessionState,
    settings: &DcpSettings,
    raw_ids: &[String],
) -> Result<ResolvedTargets, ValidationError> {
    if raw_ids.is_empty() {
        return Err(ValidationError::EmptyIds);
    }

    let mut resolved = ResolvedTargets::default();
    let mut first_error: Option<ValidationError> = None;
    let remember = |err: ValidationError, first: &mut Option<ValidationError>| {
        if first.is_none() {
            *first = Some(err);
        }
    };

    for raw in raw_ids {
        let trimmed = raw.trim();
        let Ok(index) = trimmed.parse::<usize>() else {
            resolved.skipped.push(format!("'{trimmed}' is not a numeric index"));
            remember(
                ValidationError::InvalidIds {
                    ids: trimmed.to_owned(),
                },
                &mut first_error,
            );
            continue;
        };

        let Some(id) = state.tool_id_list.get(index) else {
            resolved.skipped.push(format!("{index} is out of range"));
            remember(
                ValidationError::OutOfRange {
                    index,
                    len: state.tool_id_list.len(),
                },
                &mut first_error,
            );
            continue;
        };

        let Some(entry) = state.tool_cache.get(id) else {
            resolved.skipped.push(format!("{index} refers to an unknown tool call"));
            remember(ValidationError::UnknownCall { index }, &mut first_error);
            continue;
        };

        if settings.is_protected_tool(&entry.tool) {
            resolved
                .skipped
                .push(format!("{index} is a protected tool ({})", entry.tool));
            remember(
                ValidationError::ProtectedTool {
                    tool: entry.tool.clone(),
                },
                &mut first_error,
            );
            continue;
        }

        let paths = extract_file_paths(&entry.tool, &entry.parameters);
        if let Some(path) = paths
            .iter()
            .find(|p| matches_any_glob(p, &settings.protected_file_patterns))
        {
            resolved
                .skipped
                .push(format!("{index} touches a protected file ({path})"));
            remember(
                ValidationError::ProtectedFile { path: path.clone() },
                &mut first_error,
            );
            continue;
        }

        if state.prune.tool_ids.contains(id) {
            resolved.skipped.push(format!("{index} is already pruned"));
            continue;
        }

        if !resolved.ids.contains(id) {
            resolved.ids.push(id.clone());
        }
    }

    if resolved.ids.is_empty() {
        return Err(first_error.unwrap_or(ValidationError::NothingPrunable));
    }
    Ok(resolved)
}

/// Fetch the session transcript for token accounting and range searches.
///
/// A host failure degrades to an empty transcript: savings estimates drop
/// to zero but the mutation itself still proceeds.
pub async fn fetch_transcript(ctx: &ToolContext<'_>) -> Vec<Message> {
    match ctx.host.session_messages(&ctx.session_id).await {
        Ok(messages) => messages,
        Err(err) => {
            tracing::error!(%err, "session.messages failed; token estimates will be zero");
            Vec::new()
        }
    }
}

/// Post-success bookkeeping shared by all three tools.
///
/// Resets the nudge counter, arms the cooldown, and accumulates savings.
pub fn mark_prune_success(state: &mut SessionState, tokens_saved: u64) {
    state.nudge_counter = 0;
    state.last_tool_prune = true;
    state.stats.add(tokens_saved);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
