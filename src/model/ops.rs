//! Use-case selectors and sync state

use serde::{Deserialize, Serialize};

use super::settings::SettingsSection;

/// What a reset affects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SettingsResetType {
    All,
    Section(SettingsSection),
    /// Individual keys; currently leaves the tree untouched
    Specific(Vec<String>),
}

/// What a validation run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SettingsValidationType {
    All,
    Section(SettingsSection),
}

/// State of the remote synchronization, as reported by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Conflict,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Conflict => write!(f, "conflict"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}
