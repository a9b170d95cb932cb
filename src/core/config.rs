//! Engine configuration
//!
//! Handles configuration of the settings engine itself (where the reference
//! repository keeps its files, backup retention, reported app version). Loaded
//! from an optional file plus `LEAVN_SETTINGS__*` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{SettingsError, SettingsResult};
use crate::logging::LoggingConfig;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "LEAVN_SETTINGS";

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the settings file, audit log and backups
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum number of automatic backups to keep
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Application version stamped on exports and backups
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Overrides the detected device name in snapshot metadata
    #[serde(default)]
    pub device_name: Option<String>,

    /// Upper bound for a single history page
    #[serde(default = "default_history_page_limit")]
    pub history_page_limit: usize,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leavn")
        .join("settings")
}

fn default_max_backups() -> usize {
    10
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_history_page_limit() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_backups: default_max_backups(),
            app_version: default_app_version(),
            device_name: None,
            history_page_limit: default_history_page_limit(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize::<EngineConfig>())
            .map_err(|e| SettingsError::Configuration(e.to_string()))
    }

    /// Configuration rooted at a specific data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn values_path(&self) -> PathBuf {
        self.data_dir.join("values.json")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit.jsonl")
    }

    pub fn sync_state_path(&self) -> PathBuf {
        self.data_dir.join("sync_state.json")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}
