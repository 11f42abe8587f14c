//! The automatic pruning pipeline.
//!
//! Strategies run in a fixed order — [`deduplicate`](dedupe), then
//! [`supersede_writes`](supersede), then [`purge_errors`](purge_errors) —
//! and each appends ids to the prune set. The pipeline is strictly
//! additive: a later strategy never removes what an earlier one marked.

pub mod dedupe;
pub mod purge_errors;
pub mod supersede;

use dcp_core::messages::Message;
use dcp_core::tokens::{estimate_input_tokens, estimate_text_tokens};
use dcp_core::{CallId, ToolState};
use dcp_settings::DcpSettings;

use crate::state::SessionState;

/// What a strategy did this turn, for notifications.
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyReport {
    /// Strategy name.
    pub strategy: &'static str,
    /// Per-action detail records.
    pub details: Vec<StrategyDetail>,
    /// Tokens the strategy saved (estimated).
    pub tokens_saved: u64,
}

impl StrategyReport {
    /// Total number of newly pruned calls.
    #[must_use]
    pub fn pruned_count(&self) -> usize {
        self.details
            .iter()
            .map(|d| match d {
                StrategyDetail::Duplicates { pruned, .. } => pruned.len(),
                StrategyDetail::SupersededWrite { .. } | StrategyDetail::PurgedError { .. } => 1,
            })
            .sum()
    }
}

/// One action taken by a strategy.
#[derive(Clone, Debug, PartialEq)]
pub enum StrategyDetail {
    /// A duplicate group was collapsed to its newest occurrence.
    Duplicates {
        /// Tool name.
        tool: String,
        /// Manifest-style discriminator.
        param_key: String,
        /// How many duplicates were pruned.
        duplicate_count: usize,
        /// Pruned call ids, oldest first.
        pruned: Vec<CallId>,
        /// The surviving (newest) call id.
        kept: CallId,
    },
    /// A write was superseded by a later read of the same path.
    SupersededWrite {
        /// Tool name (`write`, `edit`, `multiedit`).
        tool: String,
        /// The path whose state the read now captures.
        path: String,
        /// The pruned write's call id.
        pruned: CallId,
    },
    /// An old errored call had its input purged.
    PurgedError {
        /// Tool name.
        tool: String,
        /// The purged call id.
        pruned: CallId,
        /// How many turns old the error was.
        age_turns: u64,
    },
}

/// Run the enabled strategies in their fixed order.
///
/// Returns one report per strategy that actually pruned something.
#[must_use]
pub fn run_pipeline(
    state: &mut SessionState,
    settings: &DcpSettings,
    messages: &[Message],
) -> Vec<StrategyReport> {
    let mut reports = Vec::new();

    if settings.strategies.deduplication.enabled {
        if let Some(report) = dedupe::run(state, settings, messages) {
            reports.push(report);
        }
    }
    if settings.strategies.supersede_writes.enabled {
        if let Some(report) = supersede::run(state, settings, messages) {
            reports.push(report);
        }
    }
    if settings.strategies.purge_errors.enabled {
        if let Some(report) = purge_errors::run(state, settings, messages) {
            reports.push(report);
        }
    }

    reports
}

/// Locate the live tool state for a call id in the transcript.
#[must_use]
pub fn find_tool_state<'a>(messages: &'a [Message], id: &CallId) -> Option<&'a ToolState> {
    for message in messages {
        for (raw_id, _, tool_state) in message.tool_parts() {
            if CallId::normalized(raw_id) == *id {
                return Some(tool_state);
            }
        }
    }
    None
}

/// Estimate the tokens redaction of a call's output would save.
#[must_use]
pub fn output_tokens(messages: &[Message], id: &CallId) -> u64 {
    find_tool_state(messages, id)
        .and_then(|s| s.output.as_deref())
        .map_or(0, estimate_text_tokens)
}

/// Estimate the tokens redaction of a call's input would save.
#[must_use]
pub fn input_tokens(messages: &[Message], id: &CallId) -> u64 {
    find_tool_state(messages, id).map_or(0, |s| estimate_input_tokens(&s.input))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
