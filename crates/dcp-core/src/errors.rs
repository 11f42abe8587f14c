//! Error hierarchy for the DCP engine.
//!
//! Two audiences, two shapes:
//!
//! - [`ValidationError`] is model-facing. Tool `execute` returns these so
//!   the host surfaces them back to the model as tool errors. Every message
//!   carries remediation guidance, because the model has to act on it.
//! - [`DcpError`] is engine-facing: host RPC failures, persistence failures,
//!   internal invariant violations, and the `/dcp` command sentinel.
//!
//! Nothing here crosses a hook boundary except [`DcpError::CommandHandled`],
//! which the host interprets as "command consumed, render nothing".

use thiserror::Error;

/// Model-facing validation failures from the pruning tools.
///
/// No state is mutated when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The tool was called without any IDs.
    #[error("No tool call IDs provided. Pass at least one numeric index from the <prunable-tools> list.")]
    EmptyIds,

    /// An ID was not a numeric index.
    #[error("Invalid IDs provided: {ids}. IDs must be numeric indices taken from the <prunable-tools> list.")]
    InvalidIds {
        /// The offending values, comma-joined.
        ids: String,
    },

    /// A numeric index fell outside the live tool list.
    #[error("ID {index} is out of range. The <prunable-tools> list currently has {len} entries; use an index from that list.")]
    OutOfRange {
        /// The index as supplied.
        index: usize,
        /// Current list length.
        len: usize,
    },

    /// The referenced tool call is unknown (hallucinated or already rotated
    /// out of the cache).
    #[error("ID {index} does not refer to a known tool call. It may have been pruned already; consult the current <prunable-tools> list.")]
    UnknownCall {
        /// The index as supplied.
        index: usize,
    },

    /// The tool is on the protected list.
    #[error("Tool '{tool}' is protected and cannot be pruned. Choose a different entry from the <prunable-tools> list.")]
    ProtectedTool {
        /// Protected tool name.
        tool: String,
    },

    /// A file path in the tool's parameters matches a protected glob.
    #[error("Tool call touches protected file '{path}' and cannot be pruned. Choose a different entry from the <prunable-tools> list.")]
    ProtectedFile {
        /// The protected path.
        path: String,
    },

    /// Nothing was prunable at all.
    #[error("No prunable tool outputs. Wait until more tool results accumulate before pruning again.")]
    NothingPrunable,

    /// `distill` targets were malformed.
    #[error("Invalid distill targets: {reason}. Provide an array of {{id, distillation}} objects.")]
    InvalidTargets {
        /// What was wrong.
        reason: String,
    },

    /// A compress boundary string was not found.
    #[error("{which} not found in conversation. Copy the boundary text exactly as it appears in the transcript.")]
    BoundaryNotFound {
        /// `startString` or `endString`.
        which: &'static str,
    },

    /// A compress boundary string matched more than once.
    #[error("Found multiple matches for {which}. Extend the boundary text until it is unique in the transcript.")]
    BoundaryAmbiguous {
        /// `startString` or `endString`.
        which: &'static str,
    },

    /// The compress range was inverted.
    #[error("startString occurs after endString. Swap the boundaries so the range reads forward.")]
    InvertedRange,
}

/// Engine-facing error type.
#[derive(Debug, Error)]
pub enum DcpError {
    /// Model-facing tool validation failure.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A host RPC failed. Logged and swallowed by callers; notifications
    /// are best effort.
    #[error("host call failed: {0}")]
    Host(String),

    /// Sidecar persistence failed. The in-memory state stays authoritative.
    #[error("persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// JSON encode/decode failure.
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// Internal invariant violation. Logged as a warning and skipped,
    /// never fatal.
    #[error("[{code}] {message}")]
    Internal {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Sentinel thrown after a `/dcp` command has fully handled its own
    /// output. The host treats the sentinel string as "nothing to render".
    #[error("{0}")]
    CommandHandled(&'static str),
}

impl DcpError {
    /// Create an internal error.
    #[must_use]
    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` for the `/dcp` command sentinel.
    #[must_use]
    pub fn is_command_sentinel(&self) -> bool {
        matches!(self, Self::CommandHandled(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
