//! # dcp-host
//!
//! The seam between the DCP engine and its host process.
//!
//! The engine never talks to the host directly; it goes through the
//! [`HostApi`] trait so the host adapter (and the test suite) can provide
//! concrete implementations. All calls are fallible and best-effort from
//! the engine's point of view: a failed toast or prompt is logged and
//! swallowed, never propagated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dcp_core::{Message, SessionId};

/// Failures from host RPCs.
#[derive(Debug, Error)]
pub enum HostError {
    /// The RPC failed or timed out host-side.
    #[error("host rpc failed: {0}")]
    Rpc(String),

    /// The host is shutting down or the session is gone.
    #[error("host unavailable")]
    Unavailable,
}

/// Severity of a toast notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    /// Informational.
    Info,
    /// Operation succeeded.
    Success,
    /// Something degraded.
    Warning,
    /// Something failed.
    Error,
}

/// A toast notification shown by the host UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    /// Optional title line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    pub message: String,
    /// Severity.
    pub level: ToastLevel,
}

impl Toast {
    /// Create an info toast with no title.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
            level: ToastLevel::Info,
        }
    }
}

/// A prompt sent into a session's transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Target session.
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    /// Message text.
    pub text: String,
    /// When `true`, the message is display-only: the host renders it but
    /// excludes it from the conversation sent upstream.
    pub ignored: bool,
}

/// Session metadata from `session.get`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSessionInfo {
    /// Session ID.
    pub id: SessionId,
    /// Parent session, set for sub-agent sessions.
    #[serde(rename = "parentID", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SessionId>,
    /// Model identifier in `provider/model` form, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl HostSessionInfo {
    /// Returns `true` for sub-agent sessions.
    #[must_use]
    pub fn is_sub_agent(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Host RPC surface consumed by the engine.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Fetch the full transcript of a session.
    async fn session_messages(&self, session_id: &SessionId) -> Result<Vec<Message>, HostError>;

    /// Fetch session metadata.
    async fn session_get(&self, session_id: &SessionId) -> Result<HostSessionInfo, HostError>;

    /// Send a message into a session (possibly display-only).
    async fn session_prompt(&self, request: PromptRequest) -> Result<(), HostError>;

    /// Show a toast in the host UI.
    async fn show_toast(&self, toast: Toast) -> Result<(), HostError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
