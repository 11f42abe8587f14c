//! # dcp-settings
//!
//! Configuration for the DCP engine.
//!
//! Settings are plain serde types with camelCase wire names and
//! per-struct defaults, so a partial settings document always deserializes
//! into a fully populated configuration. Loading deep-merges the user file
//! over compiled defaults and then applies `DCP_*` environment overrides.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{
    CommandsSettings, DcpSettings, ManualModeSettings, ModelSelectionSettings,
    NotificationChannel, PruningSummary, PurgeErrorsSettings, SharedToolSettings,
    StrategiesSettings, StrategyToggle, ToolPermission, ToolSettings, ToolsSettings,
};
