//! The host transcript model.
//!
//! Messages arrive from the host as `{info, parts}` records. The engine
//! treats the transcript as read-only input except through the explicit
//! rewriter operations in `dcp-engine`; everything here is plain data with
//! camelCase wire names matching the host protocol (`sessionID`, `callID`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{CallId, MessageId, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// Message info
// ─────────────────────────────────────────────────────────────────────────────

/// Message role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

/// Creation timestamps attached to a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInfo {
    /// Epoch milliseconds at creation.
    pub created: u64,
}

/// Metadata envelope for a transcript message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Message ID (opaque, host-minted — or `msg_dcp_*` for synthetic ones).
    pub id: MessageId,
    /// Role of the author.
    pub role: Role,
    /// Owning session.
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    /// Creation time.
    #[serde(default)]
    pub time: TimeInfo,
    /// Agent name, when the host attributes the message to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Model identifier in `provider/model` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Set by the host on compaction summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<bool>,
    /// Model variant (e.g. a reasoning-effort tag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parts
// ─────────────────────────────────────────────────────────────────────────────

/// Execution status of a tool part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// Queued, not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
}

/// State payload of a tool part.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    /// Execution status.
    pub status: ToolStatus,
    /// Tool input parameters as supplied by the model.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Tool output, present once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error text, present when status is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolState {
    /// A completed state with the given input and output.
    #[must_use]
    pub fn completed(input: Map<String, Value>, output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Completed,
            input,
            output: Some(output.into()),
            error: None,
        }
    }

    /// An errored state with the given input and error text.
    #[must_use]
    pub fn errored(input: Map<String, Value>, error: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            input,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// A content part within a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Part {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// Part ID (`prt_dcp_*` for synthetic parts).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// The text content.
        text: String,
    },
    /// A tool invocation and its result state.
    #[serde(rename = "tool")]
    Tool {
        /// Part ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Tool call ID (case-preserved as the host sent it).
        #[serde(rename = "callID")]
        call_id: String,
        /// Tool name.
        tool: String,
        /// Execution state.
        state: ToolState,
    },
    /// Marker: the assistant began a step.
    #[serde(rename = "step-start")]
    StepStart,
    /// Marker: the assistant finished a step.
    #[serde(rename = "step-finish")]
    StepFinish,
    /// Any part type the engine does not understand. Preserved untouched.
    #[serde(other)]
    Unknown,
}

impl Part {
    /// Create a text part with no ID.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            id: None,
            text: text.into(),
        }
    }

    /// The normalized (lowercase) call ID, for tool parts.
    #[must_use]
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            Self::Tool { call_id, .. } => Some(CallId::normalized(call_id)),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// A transcript message: metadata plus ordered content parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Metadata envelope.
    pub info: MessageInfo,
    /// Ordered content parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    /// Returns `true` for user messages.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.info.role == Role::User
    }

    /// Returns `true` for assistant messages.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.info.role == Role::Assistant
    }

    /// Returns `true` when the host flagged this message as a compaction
    /// summary.
    #[must_use]
    pub fn is_summary(&self) -> bool {
        self.info.summary == Some(true)
    }

    /// Returns `true` for messages the engine injected itself.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.info.id.is_synthetic()
    }

    /// Concatenated text of all text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Iterate over tool parts.
    pub fn tool_parts(&self) -> impl Iterator<Item = (&str, &str, &ToolState)> {
        self.parts.iter().filter_map(|p| match p {
            Part::Tool {
                call_id,
                tool,
                state,
                ..
            } => Some((call_id.as_str(), tool.as_str(), state)),
            _ => None,
        })
    }

    /// Count of step-start markers in this message.
    #[must_use]
    pub fn step_starts(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::StepStart))
            .count()
    }
}

/// Find the last non-synthetic user message in a transcript.
#[must_use]
pub fn last_real_user_message(messages: &[Message]) -> Option<&Message> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_user() && !m.is_synthetic())
}

/// Find the last non-synthetic message of any role.
#[must_use]
pub fn last_real_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| !m.is_synthetic())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(id: &str, role: Role) -> MessageInfo {
        MessageInfo {
            id: MessageId::from(id),
            role,
            session_id: SessionId::from("ses_1"),
            time: TimeInfo { created: 1000 },
            agent: None,
            model: None,
            summary: None,
            variant: None,
        }
    }

    // -- serde wire format --

    #[test]
    fn message_deserializes_host_shape() {
        let raw = json!({
            "info": {
                "id": "msg_1",
                "role": "assistant",
                "sessionID": "ses_9",
                "time": {"created": 42},
                "model": "anthropic/claude-sonnet-4"
            },
            "parts": [
                {"type": "step-start"},
                {
                    "type": "tool",
                    "callID": "Call_A",
                    "tool": "read",
                    "state": {
                        "status": "completed",
                        "input": {"filePath": "/x"},
                        "output": "contents"
                    }
                },
                {"type": "text", "text": "done"}
            ]
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert!(msg.is_assistant());
        assert_eq!(msg.info.session_id.as_str(), "ses_9");
        assert_eq!(msg.parts.len(), 3);
        let (call_id, tool, state) = msg.tool_parts().next().unwrap();
        assert_eq!(call_id, "Call_A");
        assert_eq!(tool, "read");
        assert_eq!(state.status, ToolStatus::Completed);
        assert_eq!(state.output.as_deref(), Some("contents"));
    }

    #[test]
    fn unknown_part_type_tolerated() {
        let raw = json!({
            "info": {"id": "m", "role": "user", "sessionID": "s"},
            "parts": [{"type": "snapshot", "payload": {"a": 1}}, {"type": "text", "text": "hi"}]
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.parts.len(), 2);
        assert!(matches!(msg.parts[0], Part::Unknown));
        assert_eq!(msg.text(), "hi");
    }

    #[test]
    fn message_serde_roundtrip() {
        let msg = Message {
            info: info("msg_1", Role::User),
            parts: vec![Part::text("hello")],
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn tool_part_call_id_normalized() {
        let part = Part::Tool {
            id: None,
            call_id: "Toolu_XYZ".into(),
            tool: "bash".into(),
            state: ToolState::completed(Map::new(), "ok"),
        };
        assert_eq!(part.call_id().unwrap().as_str(), "toolu_xyz");
        assert!(Part::text("x").call_id().is_none());
    }

    // -- helpers --

    #[test]
    fn summary_flag_detected() {
        let mut m = Message {
            info: info("msg_1", Role::Assistant),
            parts: vec![],
        };
        assert!(!m.is_summary());
        m.info.summary = Some(true);
        assert!(m.is_summary());
    }

    #[test]
    fn synthetic_detection_via_id_prefix() {
        let real = Message {
            info: info("msg_1", Role::User),
            parts: vec![],
        };
        let synthetic = Message {
            info: info("msg_dcp_1", Role::User),
            parts: vec![],
        };
        assert!(!real.is_synthetic());
        assert!(synthetic.is_synthetic());
    }

    #[test]
    fn last_real_user_message_skips_synthetic() {
        let messages = vec![
            Message {
                info: info("msg_1", Role::User),
                parts: vec![],
            },
            Message {
                info: info("msg_2", Role::Assistant),
                parts: vec![],
            },
            Message {
                info: info("msg_dcp_1", Role::User),
                parts: vec![],
            },
        ];
        let last = last_real_user_message(&messages).unwrap();
        assert_eq!(last.info.id.as_str(), "msg_1");
    }

    #[test]
    fn last_real_user_message_none_when_empty() {
        assert!(last_real_user_message(&[]).is_none());
    }

    #[test]
    fn step_starts_counted() {
        let msg = Message {
            info: info("msg_1", Role::Assistant),
            parts: vec![Part::StepStart, Part::text("a"), Part::StepStart],
        };
        assert_eq!(msg.step_starts(), 2);
    }

    #[test]
    fn text_joins_text_parts() {
        let msg = Message {
            info: info("msg_1", Role::Assistant),
            parts: vec![Part::text("a"), Part::StepFinish, Part::text("b")],
        };
        assert_eq!(msg.text(), "a\nb");
    }
}
