//! TOML-based application configuration.
//!
//! Stores user preferences for the snooze flow and trigger arming.
//! Configuration lives at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

use super::data_dir;

/// Snooze preset shown to the user when postponing an occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnoozePreset {
    pub label: String,
    pub minutes: u32,
}

/// Snooze configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnoozeConfig {
    #[serde(default = "default_snooze_minutes")]
    pub default_minutes: u32,
    #[serde(default = "default_snooze_presets")]
    pub presets: Vec<SnoozePreset>,
}

impl Default for SnoozeConfig {
    fn default() -> Self {
        Self {
            default_minutes: default_snooze_minutes(),
            presets: default_snooze_presets(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub snooze: SnoozeConfig,
    /// When false the engine computes and persists next-fire instants but
    /// never arms platform triggers.
    #[serde(default = "default_true")]
    pub arm_alarms: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snooze: SnoozeConfig::default(),
            arm_alarms: true,
        }
    }
}

fn default_snooze_minutes() -> u32 {
    10
}

fn default_snooze_presets() -> Vec<SnoozePreset> {
    [5u32, 10, 15, 20, 25]
        .iter()
        .map(|&minutes| SnoozePreset {
            label: format!("{minutes}m"),
            minutes,
        })
        .collect()
}

fn default_true() -> bool {
    true
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("<data dir>"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file
    /// does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Save the configuration to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }
}
