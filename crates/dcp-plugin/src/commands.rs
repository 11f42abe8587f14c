//! The `/dcp` command family.
//!
//! `command.execute.before` hands the raw argument string here. Each
//! subcommand writes its output through `session.prompt` as an ignored
//! (display-only) message, then signals completion by returning the
//! matching `__DCP_*_HANDLED__` sentinel error — the host renders nothing
//! itself.

use std::fmt::Write as _;

use tracing::error;

use dcp_core::text::{format_tokens, progress_bar};
use dcp_core::tokens::estimate_messages_tokens;
use dcp_core::{CallId, DcpError, SessionId, ToolStatus};
use dcp_engine::transform::persist_session;
use dcp_host::PromptRequest;

use crate::DcpPlugin;

/// Sentinel for `/dcp context`.
pub const SENTINEL_CONTEXT: &str = "__DCP_CONTEXT_HANDLED__";
/// Sentinel for `/dcp stats`.
pub const SENTINEL_STATS: &str = "__DCP_STATS_HANDLED__";
/// Sentinel for `/dcp sweep`.
pub const SENTINEL_SWEEP: &str = "__DCP_SWEEP_HANDLED__";
/// Sentinel for `/dcp manual`.
pub const SENTINEL_MANUAL: &str = "__DCP_MANUAL_HANDLED__";
/// Sentinel for `/dcp prune|distill|compress`.
pub const SENTINEL_TRIGGER: &str = "__DCP_TRIGGER_HANDLED__";
/// Sentinel for `/dcp` help.
pub const SENTINEL_HELP: &str = "__DCP_HELP_HANDLED__";

/// Help text shown for `/dcp` with no or unknown arguments.
const HELP_TEXT: &str = "\
DCP — dynamic context pruning

/dcp context              token breakdown of the current conversation
/dcp stats                tokens saved this session and lifetime
/dcp sweep [n]            prune all but the newest n tool outputs
/dcp manual [on|off]      toggle manual mode (automatic strategies off)
/dcp prune [focus]        ask the model to prune now
/dcp distill [focus]      ask the model to distill now
/dcp compress [focus]     ask the model to compress now";

/// A parsed `/dcp` subcommand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DcpCommand {
    /// Context report.
    Context,
    /// Savings counters.
    Stats,
    /// Bulk prune keeping the newest `n` outputs.
    Sweep(usize),
    /// Manual-mode toggle; `None` flips the current value.
    Manual(Option<bool>),
    /// Splice a pruning request into the next turn.
    Trigger {
        /// `prune`, `distill`, or `compress`.
        tool: String,
        /// Optional focus hint.
        focus: Option<String>,
    },
    /// Help text.
    Help,
}

/// Parse the argument string following `/dcp`.
#[must_use]
pub fn parse_command(arguments: &str) -> DcpCommand {
    let mut words = arguments.split_whitespace();
    match words.next() {
        Some("context") => DcpCommand::Context,
        Some("stats") => DcpCommand::Stats,
        Some("sweep") => {
            let keep = words.next().and_then(|w| w.parse().ok()).unwrap_or(0);
            DcpCommand::Sweep(keep)
        }
        Some("manual") => DcpCommand::Manual(match words.next() {
            Some("on") => Some(true),
            Some("off") => Some(false),
            _ => None,
        }),
        Some(tool @ ("prune" | "distill" | "compress")) => {
            let focus: Vec<&str> = words.collect();
            DcpCommand::Trigger {
                tool: tool.to_owned(),
                focus: (!focus.is_empty()).then(|| focus.join(" ")),
            }
        }
        _ => DcpCommand::Help,
    }
}

impl DcpPlugin {
    /// Handle a `/dcp` invocation.
    ///
    /// Always returns `Err`: either the completion sentinel or (never, in
    /// practice) an internal failure. Output reaches the user through
    /// `session.prompt` before the sentinel is raised.
    pub async fn on_command(
        &self,
        session_id: &SessionId,
        arguments: &str,
    ) -> Result<(), DcpError> {
        let command = parse_command(arguments);
        let (body, sentinel) = match command {
            DcpCommand::Context => (self.context_report(session_id).await, SENTINEL_CONTEXT),
            DcpCommand::Stats => (self.stats_report(session_id), SENTINEL_STATS),
            DcpCommand::Sweep(keep) => (self.sweep(session_id, keep).await, SENTINEL_SWEEP),
            DcpCommand::Manual(value) => (self.set_manual(session_id, value), SENTINEL_MANUAL),
            DcpCommand::Trigger { tool, focus } => (
                self.queue_trigger(session_id, &tool, focus.as_deref()),
                SENTINEL_TRIGGER,
            ),
            DcpCommand::Help => (HELP_TEXT.to_owned(), SENTINEL_HELP),
        };

        let request = PromptRequest {
            session_id: session_id.clone(),
            text: body,
            ignored: true,
        };
        if let Err(err) = self.host.session_prompt(request).await {
            error!(%session_id, %err, "failed to deliver /dcp output");
        }
        Err(DcpError::CommandHandled(sentinel))
    }

    /// Build the `/dcp context` report.
    async fn context_report(&self, session_id: &SessionId) -> String {
        let messages = match self.host.session_messages(session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                error!(%session_id, %err, "session.messages failed");
                Vec::new()
            }
        };

        let state_arc = self.registry.get_or_create(session_id);
        let state = state_arc.lock();

        let live_messages = messages
            .iter()
            .filter(|m| !state.prune.message_ids.contains(&m.info.id))
            .count();
        let transcript_tokens = estimate_messages_tokens(&messages);

        let mut report = String::from("DCP context\n");
        let _ = writeln!(report, "Messages: {} ({live_messages} live)", messages.len());
        let _ = writeln!(
            report,
            "Tool calls tracked: {} ({} pruned)",
            state.tool_cache.len(),
            state.prune.tool_ids.len()
        );
        let _ = writeln!(report, "Compress summaries: {}", state.compress_summaries.len());
        let _ = writeln!(
            report,
            "Estimated transcript: ~{} tokens",
            format_tokens(transcript_tokens)
        );
        if let Some(limit) = state.model_context_limit.filter(|l| *l > 0) {
            #[allow(clippy::cast_precision_loss)]
            let ratio = transcript_tokens as f64 / limit as f64;
            let _ = writeln!(report, "Context usage: {}", progress_bar(ratio, 20));
        }
        let _ = write!(
            report,
            "Saved this session: ~{} tokens",
            format_tokens(state.stats.prune_token_counter)
        );
        report
    }

    /// Build the `/dcp stats` report.
    fn stats_report(&self, session_id: &SessionId) -> String {
        let state_arc = self.registry.get_or_create(session_id);
        let state = state_arc.lock();
        format!(
            "DCP stats\nSession tokens saved: ~{}\nLifetime tokens saved: ~{}\nPruned tool calls: {}\nCompressed messages: {}",
            format_tokens(state.stats.prune_token_counter),
            format_tokens(state.stats.total_prune_tokens),
            state.prune.tool_ids.len(),
            state.prune.message_ids.len(),
        )
    }

    /// `/dcp sweep [n]`: prune every non-protected completed tool output
    /// except the newest `n`.
    async fn sweep(&self, session_id: &SessionId, keep: usize) -> String {
        let messages = match self.host.session_messages(session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                error!(%session_id, %err, "session.messages failed");
                Vec::new()
            }
        };

        let state_arc = self.registry.get_or_create(session_id);
        let (swept, tokens) = {
            let mut state = state_arc.lock();
            let candidates: Vec<CallId> = state
                .tool_id_list
                .iter()
                .filter(|id| {
                    if state.prune.tool_ids.contains(*id) {
                        return false;
                    }
                    state.tool_cache.get(id).is_some_and(|entry| {
                        entry.status == ToolStatus::Completed
                            && !self.settings.is_protected_tool(&entry.tool)
                    })
                })
                .cloned()
                .collect();

            let cut = candidates.len().saturating_sub(keep);
            let mut tokens = 0u64;
            for id in &candidates[..cut] {
                tokens += dcp_engine::strategies::output_tokens(&messages, id);
                let _ = state.prune.tool_ids.insert(id.clone());
            }
            state.nudge_counter = 0;
            state.stats.add(tokens);
            (cut, tokens)
        };

        persist_session(&self.registry, &self.settings, session_id);
        format!(
            "Swept {swept} tool {} (~{} tokens), keeping the newest {keep}.",
            if swept == 1 { "output" } else { "outputs" },
            format_tokens(tokens),
        )
    }

    /// `/dcp manual [on|off]`.
    fn set_manual(&self, session_id: &SessionId, value: Option<bool>) -> String {
        let state_arc = self.registry.get_or_create(session_id);
        let mut state = state_arc.lock();
        state.manual_mode = value.unwrap_or(!state.manual_mode);
        if state.manual_mode {
            "Manual mode on: automatic strategies paused; drive pruning via /dcp.".to_owned()
        } else {
            "Manual mode off: automatic strategies resume next turn.".to_owned()
        }
    }

    /// `/dcp prune|distill|compress [focus]`: queue a trigger prompt for
    /// the next turn.
    fn queue_trigger(&self, session_id: &SessionId, tool: &str, focus: Option<&str>) -> String {
        if !self.settings.tool_enabled(tool) {
            return format!("The {tool} tool is disabled in settings.");
        }

        let mut prompt = format!(
            "Context management request: use the {tool} tool now to reduce context."
        );
        if let Some(focus) = focus {
            let _ = write!(prompt, " Focus on: {focus}.");
        }

        let state_arc = self.registry.get_or_create(session_id);
        state_arc.lock().pending_manual_trigger = Some(dcp_engine::state::PendingTrigger {
            session_id: session_id.clone(),
            prompt,
        });
        format!("Queued a {tool} request for the next turn.")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
