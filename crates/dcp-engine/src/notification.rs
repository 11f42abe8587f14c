//! User-facing notifications.
//!
//! Everything here is best effort: a failed toast or prompt is logged at
//! error level and swallowed. The engine never blocks or fails a transform
//! because the UI was unreachable.

use tracing::error;

use dcp_core::paths::shorten_path;
use dcp_core::text::format_tokens;
use dcp_core::{CallId, SessionId};
use dcp_host::{HostApi, PromptRequest, Toast};
use dcp_settings::{DcpSettings, NotificationChannel, PruningSummary};

use crate::strategies::{StrategyDetail, StrategyReport};

/// Why a tool-driven prune happened, shown in the notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PruneReason {
    /// Plain prune: outputs were noise.
    Noise,
    /// Distill: knowledge was preserved in distillations.
    Distilled,
    /// Compress: a message range was folded into a summary.
    Compressed,
}

impl PruneReason {
    fn verb(self) -> &'static str {
        match self {
            Self::Noise => "pruned",
            Self::Distilled => "distilled",
            Self::Compressed => "compressed",
        }
    }
}

/// Payload for a tool-driven prune notification.
#[derive(Clone, Debug)]
pub struct ToolNotification {
    /// Why the prune happened.
    pub reason: PruneReason,
    /// How many calls (or messages, for compress) were affected.
    pub pruned_count: usize,
    /// Estimated tokens saved.
    pub tokens_saved: u64,
    /// Preserved distillations (`distill` only).
    pub distillations: Vec<(CallId, String)>,
    /// Compression topic (`compress` only).
    pub topic: Option<String>,
    /// Compression summary (`compress` only).
    pub summary: Option<String>,
}

/// Format a tool-driven notification body.
#[must_use]
pub fn format_tool_notification(n: &ToolNotification, settings: &DcpSettings) -> String {
    let mut body = format!(
        "DCP {} {} {} (~{} tokens saved)",
        n.reason.verb(),
        n.pruned_count,
        if n.pruned_count == 1 { "entry" } else { "entries" },
        format_tokens(n.tokens_saved),
    );

    if settings.tools.distill.show_distillation && !n.distillations.is_empty() {
        for (_, distillation) in &n.distillations {
            body.push_str("\n  kept: ");
            body.push_str(distillation);
        }
    }
    if settings.tools.compress.show_compression {
        if let Some(topic) = &n.topic {
            body.push_str("\n  topic: ");
            body.push_str(topic);
        }
        if let Some(summary) = &n.summary {
            body.push_str("\n  summary: ");
            body.push_str(summary);
        }
    }
    body
}

/// Format one strategy detail line.
#[must_use]
pub fn format_detail(detail: &StrategyDetail) -> String {
    match detail {
        StrategyDetail::Duplicates {
            tool,
            param_key,
            duplicate_count,
            ..
        } => {
            let noun = if *duplicate_count == 1 {
                "duplicate"
            } else {
                "duplicates"
            };
            format!("{tool} ({duplicate_count} {noun}): {param_key} ({duplicate_count}× duplicate)")
        }
        StrategyDetail::SupersededWrite { tool, path, .. } => {
            format!("{tool} superseded by later read: {}", shorten_path(path, 60))
        }
        StrategyDetail::PurgedError {
            tool, age_turns, ..
        } => format!("{tool} input purged ({age_turns} turns since error)"),
    }
}

/// Format the automatic-strategy summary for this transform.
///
/// Returns `None` when notifications are off or nothing happened.
#[must_use]
pub fn format_strategy_reports(
    reports: &[StrategyReport],
    settings: &DcpSettings,
) -> Option<String> {
    if settings.pruning_summary == PruningSummary::Off || reports.is_empty() {
        return None;
    }

    let pruned: usize = reports.iter().map(StrategyReport::pruned_count).sum();
    let tokens: u64 = reports.iter().map(|r| r.tokens_saved).sum();
    if pruned == 0 {
        return None;
    }

    let mut body = format!(
        "DCP pruned {pruned} tool {} (~{} tokens saved)",
        if pruned == 1 { "result" } else { "results" },
        format_tokens(tokens),
    );

    if settings.pruning_summary == PruningSummary::Detailed {
        for report in reports {
            for detail in &report.details {
                body.push_str("\n  ");
                body.push_str(&format_detail(detail));
            }
        }
    }
    Some(body)
}

/// Deliver a notification through the configured channel. Best effort.
pub async fn dispatch(
    host: &dyn HostApi,
    settings: &DcpSettings,
    session_id: &SessionId,
    body: String,
) {
    match settings.prune_notification_type {
        NotificationChannel::Toast => {
            if let Err(err) = host.show_toast(Toast::info(body)).await {
                error!(%err, "failed to show prune toast");
            }
        }
        NotificationChannel::Message => {
            let request = PromptRequest {
                session_id: session_id.clone(),
                text: body,
                ignored: true,
            };
            if let Err(err) = host.session_prompt(request).await {
                error!(%err, "failed to send prune notification message");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dup_detail() -> StrategyDetail {
        StrategyDetail::Duplicates {
            tool: "read".into(),
            param_key: "/x".into(),
            duplicate_count: 1,
            pruned: vec![CallId::from("a")],
            kept: CallId::from("b"),
        }
    }

    #[test]
    fn duplicate_detail_format() {
        assert_eq!(format_detail(&dup_detail()), "read (1 duplicate): /x (1× duplicate)");
    }

    #[test]
    fn superseded_detail_format() {
        let detail = StrategyDetail::SupersededWrite {
            tool: "write".into(),
            path: "/x".into(),
            pruned: CallId::from("w"),
        };
        assert_eq!(format_detail(&detail), "write superseded by later read: /x");
    }

    #[test]
    fn purged_detail_format() {
        let detail = StrategyDetail::PurgedError {
            tool: "bash".into(),
            pruned: CallId::from("e"),
            age_turns: 7,
        };
        assert_eq!(format_detail(&detail), "bash input purged (7 turns since error)");
    }

    #[test]
    fn minimal_summary_is_single_line() {
        let reports = vec![StrategyReport {
            strategy: "deduplication",
            details: vec![dup_detail()],
            tokens_saved: 120,
        }];
        let settings = DcpSettings::default();
        let body = format_strategy_reports(&reports, &settings).unwrap();
        assert_eq!(body, "DCP pruned 1 tool result (~120 tokens saved)");
    }

    #[test]
    fn detailed_summary_includes_detail_lines() {
        let reports = vec![StrategyReport {
            strategy: "deduplication",
            details: vec![dup_detail()],
            tokens_saved: 120,
        }];
        let mut settings = DcpSettings::default();
        settings.pruning_summary = PruningSummary::Detailed;
        let body = format_strategy_reports(&reports, &settings).unwrap();
        assert!(body.contains("read (1 duplicate): /x (1× duplicate)"));
    }

    #[test]
    fn off_suppresses_summary() {
        let reports = vec![StrategyReport {
            strategy: "deduplication",
            details: vec![dup_detail()],
            tokens_saved: 120,
        }];
        let mut settings = DcpSettings::default();
        settings.pruning_summary = PruningSummary::Off;
        assert!(format_strategy_reports(&reports, &settings).is_none());
    }

    #[test]
    fn empty_reports_suppress_summary() {
        let settings = DcpSettings::default();
        assert!(format_strategy_reports(&[], &settings).is_none());
    }

    #[test]
    fn tool_notification_plain_prune() {
        let n = ToolNotification {
            reason: PruneReason::Noise,
            pruned_count: 2,
            tokens_saved: 4200,
            distillations: vec![],
            topic: None,
            summary: None,
        };
        let settings = DcpSettings::default();
        assert_eq!(
            format_tool_notification(&n, &settings),
            "DCP pruned 2 entries (~4.2k tokens saved)"
        );
    }

    #[test]
    fn tool_notification_shows_distillations() {
        let n = ToolNotification {
            reason: PruneReason::Distilled,
            pruned_count: 1,
            tokens_saved: 100,
            distillations: vec![(CallId::from("a"), "tests pass on main".into())],
            topic: None,
            summary: None,
        };
        let settings = DcpSettings::default();
        let body = format_tool_notification(&n, &settings);
        assert!(body.starts_with("DCP distilled 1 entry"));
        assert!(body.contains("kept: tests pass on main"));
    }

    #[test]
    fn tool_notification_hides_distillations_when_disabled() {
        let n = ToolNotification {
            reason: PruneReason::Distilled,
            pruned_count: 1,
            tokens_saved: 100,
            distillations: vec![(CallId::from("a"), "secret".into())],
            topic: None,
            summary: None,
        };
        let mut settings = DcpSettings::default();
        settings.tools.distill.show_distillation = false;
        assert!(!format_tool_notification(&n, &settings).contains("secret"));
    }

    #[test]
    fn tool_notification_compress_topic() {
        let n = ToolNotification {
            reason: PruneReason::Compressed,
            pruned_count: 8,
            tokens_saved: 900,
            distillations: vec![],
            topic: Some("Phase A".into()),
            summary: Some("All migrations applied".into()),
        };
        let settings = DcpSettings::default();
        let body = format_tool_notification(&n, &settings);
        assert!(body.contains("topic: Phase A"));
        assert!(body.contains("summary: All migrations applied"));
    }
}
