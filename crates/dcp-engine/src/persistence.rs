//! Per-session sidecar persistence.
//!
//! One JSON file per session id under the state directory, holding the
//! prune sets, compress summaries, and savings counters. Writes are fire
//! and forget: the in-memory state stays authoritative for the rest of the
//! process, so a lost write only costs observed statistics, never
//! correctness. Unknown fields are ignored and missing fields default,
//! giving forward/backward compatibility across releases.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dcp_core::{CallId, MessageId, SessionId};
use dcp_settings::DcpSettings;

use crate::state::{CompressSummary, PruneStats, SessionState};

/// Persisted prune sets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedPrune {
    /// Redacted tool-call ids.
    pub tool_ids: Vec<CallId>,
    /// Compacted message ids.
    pub message_ids: Vec<MessageId>,
}

/// The sidecar document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    /// Prune sets.
    pub prune: PersistedPrune,
    /// Active compress summaries.
    pub compress_summaries: Vec<CompressSummary>,
    /// Savings counters.
    pub stats: PruneStats,
}

/// Resolve the sidecar directory.
#[must_use]
pub fn state_dir(settings: &DcpSettings) -> PathBuf {
    if let Some(dir) = &settings.state_dir {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    PathBuf::from(home).join(".dcp").join("state")
}

/// Path of one session's sidecar file.
#[must_use]
pub fn sidecar_path(dir: &Path, session_id: &SessionId) -> PathBuf {
    let safe: String = session_id
        .as_str()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    dir.join(format!("{safe}.json"))
}

/// Capture the persistable slice of a session state.
#[must_use]
pub fn snapshot(state: &SessionState) -> PersistedState {
    let mut tool_ids: Vec<CallId> = state.prune.tool_ids.iter().cloned().collect();
    tool_ids.sort();
    let mut message_ids: Vec<MessageId> = state.prune.message_ids.iter().cloned().collect();
    message_ids.sort();
    PersistedState {
        prune: PersistedPrune {
            tool_ids,
            message_ids,
        },
        compress_summaries: state.compress_summaries.clone(),
        stats: state.stats,
    }
}

/// Restore a persisted snapshot into a session state.
///
/// The per-session counter starts fresh; only the lifetime total carries
/// over.
pub fn apply(state: &mut SessionState, persisted: PersistedState) {
    state.prune.tool_ids = persisted.prune.tool_ids.into_iter().collect();
    state.prune.message_ids = persisted.prune.message_ids.into_iter().collect();
    state.compress_summaries = persisted.compress_summaries;
    state.stats.total_prune_tokens = persisted.stats.total_prune_tokens;
    state.stats.prune_token_counter = 0;
}

/// Load a session's sidecar, if one exists and parses.
///
/// Failures are logged and treated as "no sidecar".
pub async fn load(dir: &Path, session_id: &SessionId) -> Option<PersistedState> {
    let path = sidecar_path(dir, session_id);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(?path, %err, "failed to read session sidecar");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(persisted) => {
            debug!(?path, "loaded session sidecar");
            Some(persisted)
        }
        Err(err) => {
            warn!(?path, %err, "failed to parse session sidecar");
            None
        }
    }
}

/// Write a session's sidecar.
pub async fn save(
    dir: &Path,
    session_id: &SessionId,
    persisted: &PersistedState,
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = sidecar_path(dir, session_id);
    let json = serde_json::to_string_pretty(persisted)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&path, json).await
}

/// Fire-and-forget sidecar write. Failures are logged, never surfaced.
pub fn spawn_save(dir: PathBuf, session_id: SessionId, persisted: PersistedState) {
    let _task = tokio::spawn(async move {
        if let Err(err) = save(&dir, &session_id, &persisted).await {
            warn!(%session_id, %err, "sidecar persistence failed; in-memory state stays authoritative");
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
