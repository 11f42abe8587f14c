//! # dcp-plugin
//!
//! The host-facing surface of the DCP engine. One [`DcpPlugin`] instance
//! lives for the whole host process and fans hook calls out to the engine:
//!
//! - `chat.message` → model/variant observation
//! - system transform → append the rendered context-management prompt
//! - messages transform → the per-turn pruning pipeline
//! - `command.execute.before` → the `/dcp` command family
//! - `config` → `/dcp` command and primary-tool registration
//! - `event` → idle-session observation
//!
//! No error crosses a hook boundary except the `__DCP_*_HANDLED__`
//! sentinel a `/dcp` command uses to tell the host "output already sent".

pub mod commands;
pub mod hooks;

use std::sync::Arc;

use dcp_engine::SessionRegistry;
use dcp_host::HostApi;
use dcp_settings::DcpSettings;

pub use hooks::{ChatMessageInput, EventInput};

/// The process-wide plugin instance.
pub struct DcpPlugin {
    /// Cross-session engine state.
    pub registry: Arc<SessionRegistry>,
    /// Loaded configuration.
    pub settings: DcpSettings,
    /// Host RPC surface.
    pub host: Arc<dyn HostApi>,
}

impl DcpPlugin {
    /// Create the plugin and initialize logging.
    ///
    /// With `debug` on, a JSON-lines transport is attached writing to
    /// `<state-dir>/dcp.log`.
    #[must_use]
    pub fn new(settings: DcpSettings, host: Arc<dyn HostApi>) -> Self {
        if settings.debug {
            let path = dcp_engine::persistence::state_dir(&settings).join("dcp.log");
            let _handle = dcp_logging::init_with_debug_file("debug", &path);
        } else {
            dcp_logging::init_subscriber("warn");
        }

        Self {
            registry: Arc::new(SessionRegistry::new()),
            settings,
            host,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
