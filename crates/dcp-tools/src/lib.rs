//! # dcp-tools
//!
//! The three model-callable tools at the heart of the pruning protocol:
//!
//! - `prune` — redact tool outputs by numeric index
//! - `distill` — redact while preserving model-authored distillations
//! - `compress` — fold a contiguous message range into a summary
//!
//! All three share one validator and one execution shell. Validation
//! failures are returned as errors so the host surfaces them to the model;
//! on success the tools mutate session state, reset the nudge counter, arm
//! the cooldown, notify the user, and persist the sidecar.

pub mod compress;
pub mod distill;
pub mod executor;
pub mod prompts;
pub mod prune;
pub mod template;

use async_trait::async_trait;
use serde_json::Value;

use dcp_core::{DcpError, SessionId};
use dcp_engine::SessionRegistry;
use dcp_host::HostApi;
use dcp_settings::DcpSettings;

/// Terminal reply for tools invoked from a sub-agent session.
pub const SUB_AGENT_MESSAGE: &str = "This session is a sub-agent. Context management is handled by the parent session. Provide your final answer now and do not call this tool again.";

/// A tool definition sent to the LLM.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: &'static str,
    /// Markdown description (already template-rendered).
    pub description: String,
    /// JSON Schema for the parameters.
    pub parameters: Value,
}

/// Execution context handed to every tool invocation.
pub struct ToolContext<'a> {
    /// Cross-session state registry.
    pub registry: &'a SessionRegistry,
    /// Engine configuration.
    pub settings: &'a DcpSettings,
    /// Host RPC surface.
    pub host: &'a dyn HostApi,
    /// Session the call belongs to.
    pub session_id: SessionId,
}

/// The trait each pruning tool implements.
#[async_trait]
pub trait DcpTool: Send + Sync {
    /// Tool name — the exact string registered with the host.
    fn name(&self) -> &'static str;

    /// Build the schema + rendered description for the LLM.
    fn definition(&self, settings: &DcpSettings) -> ToolDefinition;

    /// Execute with JSON parameters; the returned string goes back to the
    /// model as the tool result.
    async fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String, DcpError>;
}

/// The enabled tools in canonical order.
#[must_use]
pub fn enabled_tools(settings: &DcpSettings) -> Vec<Box<dyn DcpTool>> {
    let mut tools: Vec<Box<dyn DcpTool>> = Vec::new();
    if settings.tools.prune.enabled {
        tools.push(Box::new(prune::PruneTool));
    }
    if settings.tools.distill.enabled {
        tools.push(Box::new(distill::DistillTool));
    }
    if settings.tools.compress.enabled {
        tools.push(Box::new(compress::CompressTool));
    }
    tools
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
