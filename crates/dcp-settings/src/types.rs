//! Configuration types for the DCP engine.
//!
//! Every struct derives `Default` behavior via `#[serde(default)]` so a
//! partial user document always yields a complete configuration.

use serde::{Deserialize, Serialize};

/// Tools that may never be pruned regardless of configuration.
///
/// The pruning tools themselves are on this list so the engine can never be
/// asked to prune its own calls; task/todo tools carry live coordination
/// state whose removal breaks the host UI.
pub const BUILTIN_PROTECTED_TOOLS: &[&str] =
    &["prune", "distill", "compress", "task", "todowrite", "todoread"];

// ─────────────────────────────────────────────────────────────────────────────
// Root settings
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DcpSettings {
    /// Master switch. When off, every hook is a pass-through.
    pub enabled: bool,
    /// Enable debug file logging.
    pub debug: bool,
    /// Notification verbosity.
    pub pruning_summary: PruningSummary,
    /// Notification channel.
    pub prune_notification_type: NotificationChannel,
    /// Globs for files whose tool calls must never be pruned.
    pub protected_file_patterns: Vec<String>,
    /// Override for the sidecar state directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
    /// Per-tool knobs.
    pub tools: ToolsSettings,
    /// Strategy pipeline toggles.
    pub strategies: StrategiesSettings,
    /// Manual-mode behavior.
    pub manual_mode: ManualModeSettings,
    /// `/dcp` command registration.
    pub commands: CommandsSettings,
    /// Background-analysis model selection.
    pub model: ModelSelectionSettings,
}

impl Default for DcpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            pruning_summary: PruningSummary::Minimal,
            prune_notification_type: NotificationChannel::Toast,
            protected_file_patterns: Vec::new(),
            state_dir: None,
            tools: ToolsSettings::default(),
            strategies: StrategiesSettings::default(),
            manual_mode: ManualModeSettings::default(),
            commands: CommandsSettings::default(),
            model: ModelSelectionSettings::default(),
        }
    }
}

impl DcpSettings {
    /// Returns `true` when the named pruning tool is enabled.
    #[must_use]
    pub fn tool_enabled(&self, name: &str) -> bool {
        match name {
            "prune" => self.tools.prune.enabled,
            "distill" => self.tools.distill.enabled,
            "compress" => self.tools.compress.enabled,
            _ => false,
        }
    }

    /// Returns `true` when at least one pruning tool is enabled.
    #[must_use]
    pub fn any_tool_enabled(&self) -> bool {
        self.tools.prune.enabled || self.tools.distill.enabled || self.tools.compress.enabled
    }

    /// Names of the enabled pruning tools, in canonical order.
    #[must_use]
    pub fn enabled_tool_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.tools.prune.enabled {
            names.push("prune");
        }
        if self.tools.distill.enabled {
            names.push("distill");
        }
        if self.tools.compress.enabled {
            names.push("compress");
        }
        names
    }

    /// Returns `true` when `tool` may never be pruned.
    ///
    /// Union of the built-in deny-list and the configured augmentation,
    /// compared case-insensitively.
    #[must_use]
    pub fn is_protected_tool(&self, tool: &str) -> bool {
        let lowered = tool.to_ascii_lowercase();
        BUILTIN_PROTECTED_TOOLS.contains(&lowered.as_str())
            || self
                .tools
                .settings
                .protected_tools
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&lowered))
    }

    /// Returns `true` when automatic strategies should run this turn.
    #[must_use]
    pub fn automatic_strategies_active(&self) -> bool {
        if self.manual_mode.enabled {
            self.manual_mode.automatic_strategies
        } else {
            true
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Notification verbosity for prune summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruningSummary {
    /// No notifications.
    Off,
    /// One-line summaries.
    #[default]
    Minimal,
    /// Per-entry detail lines.
    Detailed,
}

/// Where prune notifications are delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    /// Transient toast in the host UI.
    #[default]
    Toast,
    /// Ignored chat message (persisted in the transcript UI).
    Message,
}

/// Host permission mode for a tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPermission {
    /// Run without prompting.
    #[default]
    Allow,
    /// Prompt the user each time.
    Ask,
    /// Never run.
    Deny,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool settings
// ─────────────────────────────────────────────────────────────────────────────

/// Per-tool and shared tool configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsSettings {
    /// `prune` tool knobs.
    pub prune: ToolSettings,
    /// `distill` tool knobs.
    pub distill: ToolSettings,
    /// `compress` tool knobs.
    pub compress: ToolSettings,
    /// Knobs shared by all three tools.
    pub settings: SharedToolSettings,
}

impl Default for ToolsSettings {
    fn default() -> Self {
        Self {
            prune: ToolSettings::default(),
            distill: ToolSettings {
                show_distillation: true,
                ..ToolSettings::default()
            },
            compress: ToolSettings {
                show_compression: true,
                ..ToolSettings::default()
            },
            settings: SharedToolSettings::default(),
        }
    }
}

/// Knobs for a single pruning tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolSettings {
    /// Whether the tool is registered at all.
    pub enabled: bool,
    /// Host permission mode.
    pub permission: ToolPermission,
    /// Show preserved distillations in notifications (`distill` only).
    pub show_distillation: bool,
    /// Show summaries in notifications (`compress` only).
    pub show_compression: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            permission: ToolPermission::Allow,
            show_distillation: false,
            show_compression: false,
        }
    }
}

/// Knobs shared across the pruning tools.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedToolSettings {
    /// Additional tool names that may never be pruned.
    pub protected_tools: Vec<String>,
    /// Whether nudge messages are emitted.
    pub nudge_enabled: bool,
    /// Unpruned tool results needed before a nudge fires.
    pub nudge_frequency: u32,
}

impl Default for SharedToolSettings {
    fn default() -> Self {
        Self {
            protected_tools: Vec::new(),
            nudge_enabled: true,
            nudge_frequency: 5,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategy settings
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy pipeline toggles.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategiesSettings {
    /// Duplicate tool-call detection.
    pub deduplication: StrategyToggle,
    /// Superseded-write detection.
    pub supersede_writes: StrategyToggle,
    /// Errored-input purging.
    pub purge_errors: PurgeErrorsSettings,
}

/// Enable flag for a single strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyToggle {
    /// Whether the strategy runs.
    pub enabled: bool,
}

impl Default for StrategyToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Errored-input purging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurgeErrorsSettings {
    /// Whether the strategy runs.
    pub enabled: bool,
    /// Turns an errored call must age before its input is purged.
    pub turns: u64,
}

impl Default for PurgeErrorsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            turns: 3,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manual mode / commands / model
// ─────────────────────────────────────────────────────────────────────────────

/// Manual-mode behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualModeSettings {
    /// When on, the user drives pruning via `/dcp` commands.
    pub enabled: bool,
    /// Keep automatic strategies running even in manual mode.
    pub automatic_strategies: bool,
}

impl Default for ManualModeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            automatic_strategies: true,
        }
    }
}

/// `/dcp` command registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandsSettings {
    /// Whether the command family is registered with the host.
    pub enabled: bool,
}

impl Default for CommandsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Background-analysis model selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSelectionSettings {
    /// Config override in `provider/model` form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_model: Option<String>,
    /// Fail instead of falling back when the chosen model is unusable.
    pub strict_model_selection: bool,
    /// Surface a toast when model selection falls back.
    pub show_model_error_toasts: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
