//! Settings loading with deep merge and environment overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`DcpSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `DCP_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)
//!
//! Keys in the user document that do not exist in the defaults are logged
//! at `warn` and otherwise ignored.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::DcpSettings;

/// Resolve the path to the settings file (`~/.dcp/settings.json`).
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    PathBuf::from(home).join(".dcp").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DcpSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<DcpSettings> {
    let defaults = serde_json::to_value(DcpSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        warn_unknown_keys(&defaults, &user, "");
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: DcpSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
#[must_use]
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Log a warning for every user key with no counterpart in the defaults.
fn warn_unknown_keys(defaults: &Value, user: &Value, prefix: &str) {
    let (Value::Object(default_map), Value::Object(user_map)) = (defaults, user) else {
        return;
    };
    for (key, user_val) in user_map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match default_map.get(key) {
            None => warn!(key = %path, "unknown settings key ignored"),
            Some(default_val) => warn_unknown_keys(default_val, user_val, &path),
        }
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are silently ignored (the file/default value wins).
pub fn apply_env_overrides(settings: &mut DcpSettings) {
    if let Some(v) = read_env_bool("DCP_ENABLED") {
        settings.enabled = v;
    }
    if let Some(v) = read_env_bool("DCP_DEBUG") {
        settings.debug = v;
    }
    if let Some(v) = read_env_string("DCP_STATE_DIR") {
        settings.state_dir = Some(v);
    }
    if let Some(v) = read_env_bool("DCP_NUDGE_ENABLED") {
        settings.tools.settings.nudge_enabled = v;
    }
    if let Some(v) = read_env_u32("DCP_NUDGE_FREQUENCY", 1, 1000) {
        settings.tools.settings.nudge_frequency = v;
    }
    if let Some(v) = read_env_string("DCP_ANALYSIS_MODEL") {
        settings.model.analysis_model = Some(v);
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let raw = std::env::var(name).ok()?;
    let parsed: u32 = raw.parse().ok()?;
    (min..=max).contains(&parsed).then_some(parsed)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
