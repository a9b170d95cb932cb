//! Audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::SettingValue;
use crate::core::error::SettingsResult;
use crate::core::utils::generate_uuid;

/// Who or what caused a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeSource {
    User,
    System,
    Sync,
    Migration,
    Reset,
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeSource::User => write!(f, "user"),
            ChangeSource::System => write!(f, "system"),
            ChangeSource::Sync => write!(f, "sync"),
            ChangeSource::Migration => write!(f, "migration"),
            ChangeSource::Reset => write!(f, "reset"),
        }
    }
}

/// Immutable audit record of one accepted mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsChangeEvent {
    pub id: Uuid,
    /// Section name, individual key, or a workflow key such as `settings_reset`
    pub setting_key: String,
    pub old_value: Option<SettingValue>,
    pub new_value: SettingValue,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source: ChangeSource,
}

impl SettingsChangeEvent {
    pub fn new(
        setting_key: impl Into<String>,
        old_value: Option<SettingValue>,
        new_value: SettingValue,
        source: ChangeSource,
    ) -> Self {
        Self {
            id: generate_uuid(),
            setting_key: setting_key.into(),
            old_value,
            new_value,
            user_id: None,
            timestamp: Utc::now(),
            source,
        }
    }

    /// Attribute the change to a user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Both values must survive a JSON round trip
    pub fn ensure_encodable(&self) -> SettingsResult<()> {
        if let Some(old) = &self.old_value {
            old.ensure_encodable()?;
        }
        self.new_value.ensure_encodable()
    }
}

/// Audit keys for workflow-level events
pub mod keys {
    pub const SETTINGS_RESET: &str = "settings_reset";
    pub const SETTINGS_BACKUP: &str = "settings_backup";
    pub const SETTINGS_RESTORE: &str = "settings_restore";
    pub const SETTINGS_MIGRATION: &str = "settings_migration";
}
