//! Per-session engine state.
//!
//! One [`SessionState`] exists per host session, owned by the
//! [`SessionRegistry`]. The host guarantees that hook handlers and tool
//! executions never interleave for a single session, so state sits behind a
//! plain `parking_lot::Mutex`; different sessions run concurrently with
//! fully independent state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dcp_core::{CallId, MessageId, SessionId, ToolStatus};

/// Maximum number of cached tool entries per session.
pub const TOOL_CACHE_CAP: usize = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Tool cache
// ─────────────────────────────────────────────────────────────────────────────

/// Cached metadata for one tool invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolEntry {
    /// Tool name.
    pub tool: String,
    /// Input parameters as supplied by the model.
    pub parameters: Map<String, Value>,
    /// Last observed execution status.
    pub status: ToolStatus,
    /// Error text for failed calls.
    pub error: Option<String>,
    /// Turn at which the call was first observed.
    pub turn: u64,
    /// Set when the entry survived a host compaction.
    pub compacted: bool,
}

/// Bounded FIFO cache of tool invocations, keyed by lowercase call ID.
///
/// Eviction pops the oldest entry, but never one still referenced by the
/// prune set — those ids must stay resolvable so redaction keeps working.
#[derive(Clone, Debug, Default)]
pub struct ToolCache {
    order: VecDeque<CallId>,
    entries: HashMap<CallId, ToolEntry>,
}

impl ToolCache {
    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` when `id` is cached.
    #[must_use]
    pub fn contains(&self, id: &CallId) -> bool {
        self.entries.contains_key(id)
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, id: &CallId) -> Option<&ToolEntry> {
        self.entries.get(id)
    }

    /// Look up an entry mutably.
    pub fn get_mut(&mut self, id: &CallId) -> Option<&mut ToolEntry> {
        self.entries.get_mut(id)
    }

    /// Insert a new entry. Existing entries keep their position.
    pub fn insert(&mut self, id: CallId, entry: ToolEntry) {
        if self.entries.insert(id.clone(), entry).is_none() {
            self.order.push_back(id);
        }
    }

    /// Evict oldest entries until the cache is back under capacity.
    ///
    /// Entries referenced by `protected` (the prune set) are skipped; if
    /// every remaining entry is referenced, eviction stops early.
    pub fn evict(&mut self, protected: &HashSet<CallId>) {
        let mut skipped: VecDeque<CallId> = VecDeque::new();
        while self.entries.len() > TOOL_CACHE_CAP {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if protected.contains(&oldest) {
                skipped.push_back(oldest);
                if skipped.len() >= self.entries.len() {
                    break;
                }
                continue;
            }
            let _ = self.entries.remove(&oldest);
        }
        // Preserve FIFO order for the survivors we skipped over.
        while let Some(id) = skipped.pop_back() {
            self.order.push_front(id);
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prune bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

/// The two redaction sets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruneSets {
    /// Tool calls whose outputs/inputs are redacted on the way out.
    pub tool_ids: HashSet<CallId>,
    /// Messages compacted away by a range compression.
    pub message_ids: HashSet<MessageId>,
}

impl PruneSets {
    /// Remove everything from both sets.
    pub fn clear(&mut self) {
        self.tool_ids.clear();
        self.message_ids.clear();
    }
}

/// A model-authored replacement for a compressed message range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressSummary {
    /// First message of the compressed range.
    pub anchor_message_id: MessageId,
    /// Replacement text shown in place of the range.
    pub summary: String,
}

/// Token-savings counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PruneStats {
    /// Tokens saved since this session started.
    pub prune_token_counter: u64,
    /// Tokens saved across the session's whole lifetime (survives reloads).
    pub total_prune_tokens: u64,
}

impl PruneStats {
    /// Record newly saved tokens.
    pub fn add(&mut self, tokens: u64) {
        self.prune_token_counter += tokens;
        self.total_prune_tokens += tokens;
    }
}

/// A manual `/dcp prune|distill|compress` request waiting to be spliced
/// into the next user turn.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTrigger {
    /// Session the trigger belongs to.
    pub session_id: SessionId,
    /// Prompt text to splice in.
    pub prompt: String,
}

/// Cached `{provider, model}` pair from the last `chat.params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRef {
    /// Provider ID.
    pub provider_id: String,
    /// Model ID.
    pub model_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// All engine state for a single host session.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Bound session, `None` until the first transform.
    pub session_id: Option<SessionId>,
    /// Sub-agent sessions are inert: no injection, no strategies, no tools.
    pub is_sub_agent: bool,
    /// Bounded cache of observed tool invocations.
    pub tool_cache: ToolCache,
    /// Live tool-call ids in chronological order; the model addresses tools
    /// by index into this list.
    pub tool_id_list: Vec<CallId>,
    /// Redaction sets.
    pub prune: PruneSets,
    /// Active range-compression summaries, oldest first.
    pub compress_summaries: Vec<CompressSummary>,
    /// Token-savings counters.
    pub stats: PruneStats,
    /// New non-protected tool results since the last successful prune.
    pub nudge_counter: u32,
    /// The most recently executed tool was a pruning tool.
    pub last_tool_prune: bool,
    /// Epoch-ms of the latest detected host compaction.
    pub last_compaction: u64,
    /// Assistant step-start markers seen.
    pub current_turn: u64,
    /// Last observed model variant.
    pub variant: Option<String>,
    /// Last observed model context limit.
    pub model_context_limit: Option<u64>,
    /// Last observed model in `provider/model` form.
    pub model: Option<String>,
    /// Cached chat params for the background analyser.
    pub last_chat_params: Option<ModelRef>,
    /// Manual mode: automatic strategies disabled, user drives via `/dcp`.
    pub manual_mode: bool,
    /// Manual trigger waiting for the next user turn.
    pub pending_manual_trigger: Option<PendingTrigger>,
}

impl SessionState {
    /// Reset everything and bind to a new session.
    pub fn reset_for_session(&mut self, session_id: SessionId) {
        *self = Self {
            session_id: Some(session_id),
            ..Self::default()
        };
    }

    /// Clear caches after a detected host compaction.
    pub fn clear_for_compaction(&mut self, compaction_ts: u64) {
        self.tool_cache.clear();
        self.tool_id_list.clear();
        self.prune.clear();
        self.compress_summaries.clear();
        self.nudge_counter = 0;
        self.last_tool_prune = false;
        self.last_compaction = compaction_ts;
    }

    /// Returns `true` when `id` is live and resolvable.
    #[must_use]
    pub fn knows_call(&self, id: &CallId) -> bool {
        self.tool_cache.contains(id)
    }

    /// The compress summary anchored at `message_id`, if any.
    #[must_use]
    pub fn summary_for_anchor(&self, message_id: &MessageId) -> Option<&CompressSummary> {
        self.compress_summaries
            .iter()
            .find(|s| &s.anchor_message_id == message_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Cross-session registry of engine state.
///
/// Lookups hand out `Arc<Mutex<SessionState>>` so hook handlers and tool
/// executions for the same session share one state object.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Mutex<SessionState>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the state for `session_id`, creating it on first touch.
    #[must_use]
    pub fn get_or_create(&self, session_id: &SessionId) -> Arc<Mutex<SessionState>> {
        self.sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                let mut state = SessionState::default();
                state.session_id = Some(session_id.clone());
                Arc::new(Mutex::new(state))
            })
            .clone()
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when no session is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tool: &str, turn: u64) -> ToolEntry {
        ToolEntry {
            tool: tool.to_owned(),
            parameters: Map::new(),
            status: ToolStatus::Completed,
            error: None,
            turn,
            compacted: false,
        }
    }

    // ── ToolCache ───────────────────────────────────────────────────────

    #[test]
    fn cache_insert_and_get() {
        let mut cache = ToolCache::default();
        cache.insert(CallId::from("a"), entry("read", 1));
        assert!(cache.contains(&CallId::from("a")));
        assert_eq!(cache.get(&CallId::from("a")).unwrap().tool, "read");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_reinsert_keeps_single_slot() {
        let mut cache = ToolCache::default();
        cache.insert(CallId::from("a"), entry("read", 1));
        cache.insert(CallId::from("a"), entry("read", 2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&CallId::from("a")).unwrap().turn, 2);
    }

    #[test]
    fn cache_evicts_fifo_past_cap() {
        let mut cache = ToolCache::default();
        for i in 0..(TOOL_CACHE_CAP + 10) {
            cache.insert(CallId::from(format!("id{i}")), entry("read", i as u64));
        }
        cache.evict(&HashSet::new());
        assert_eq!(cache.len(), TOOL_CACHE_CAP);
        // oldest entries gone, newest kept
        assert!(!cache.contains(&CallId::from("id0")));
        assert!(cache.contains(&CallId::from(format!("id{}", TOOL_CACHE_CAP + 9))));
    }

    #[test]
    fn cache_eviction_skips_prune_referenced() {
        let mut cache = ToolCache::default();
        for i in 0..(TOOL_CACHE_CAP + 1) {
            cache.insert(CallId::from(format!("id{i}")), entry("read", i as u64));
        }
        let mut protected = HashSet::new();
        let _ = protected.insert(CallId::from("id0"));
        cache.evict(&protected);
        assert_eq!(cache.len(), TOOL_CACHE_CAP);
        // id0 is referenced by the prune set and survives; id1 was evicted
        assert!(cache.contains(&CallId::from("id0")));
        assert!(!cache.contains(&CallId::from("id1")));
    }

    #[test]
    fn cache_under_cap_never_evicts() {
        let mut cache = ToolCache::default();
        cache.insert(CallId::from("a"), entry("read", 1));
        cache.evict(&HashSet::new());
        assert_eq!(cache.len(), 1);
    }

    // ── SessionState ────────────────────────────────────────────────────

    #[test]
    fn reset_for_session_drops_everything() {
        let mut state = SessionState::default();
        state.tool_cache.insert(CallId::from("a"), entry("read", 1));
        state.nudge_counter = 7;
        state.stats.add(100);
        state.reset_for_session(SessionId::from("ses_2"));
        assert_eq!(state.session_id.as_ref().unwrap().as_str(), "ses_2");
        assert!(state.tool_cache.is_empty());
        assert_eq!(state.nudge_counter, 0);
        assert_eq!(state.stats.total_prune_tokens, 0);
    }

    #[test]
    fn clear_for_compaction_preserves_stats_and_session() {
        let mut state = SessionState::default();
        state.session_id = Some(SessionId::from("ses_1"));
        state.tool_cache.insert(CallId::from("a"), entry("read", 1));
        let _ = state.prune.tool_ids.insert(CallId::from("a"));
        let _ = state.prune.message_ids.insert(MessageId::from("m1"));
        state.compress_summaries.push(CompressSummary {
            anchor_message_id: MessageId::from("m1"),
            summary: "s".into(),
        });
        state.nudge_counter = 3;
        state.last_tool_prune = true;
        state.stats.add(50);

        state.clear_for_compaction(12345);

        assert!(state.tool_cache.is_empty());
        assert!(state.prune.tool_ids.is_empty());
        assert!(state.prune.message_ids.is_empty());
        assert!(state.compress_summaries.is_empty());
        assert_eq!(state.nudge_counter, 0);
        assert!(!state.last_tool_prune);
        assert_eq!(state.last_compaction, 12345);
        // survives
        assert_eq!(state.session_id.as_ref().unwrap().as_str(), "ses_1");
        assert_eq!(state.stats.total_prune_tokens, 50);
    }

    #[test]
    fn summary_for_anchor_lookup() {
        let mut state = SessionState::default();
        state.compress_summaries.push(CompressSummary {
            anchor_message_id: MessageId::from("m1"),
            summary: "phase A".into(),
        });
        assert_eq!(
            state
                .summary_for_anchor(&MessageId::from("m1"))
                .unwrap()
                .summary,
            "phase A"
        );
        assert!(state.summary_for_anchor(&MessageId::from("m2")).is_none());
    }

    // ── PruneStats ──────────────────────────────────────────────────────

    #[test]
    fn stats_accumulate_both_counters() {
        let mut stats = PruneStats::default();
        stats.add(10);
        stats.add(5);
        assert_eq!(stats.prune_token_counter, 15);
        assert_eq!(stats.total_prune_tokens, 15);
    }

    // ── SessionRegistry ─────────────────────────────────────────────────

    #[test]
    fn registry_returns_same_state_for_same_session() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create(&SessionId::from("ses_1"));
        let b = registry.get_or_create(&SessionId::from("ses_1"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_isolates_sessions() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create(&SessionId::from("ses_a"));
        let b = registry.get_or_create(&SessionId::from("ses_b"));
        let _ = a.lock().prune.tool_ids.insert(CallId::from("x"));
        assert!(b.lock().prune.tool_ids.is_empty());
        assert_eq!(registry.len(), 2);
    }
}
