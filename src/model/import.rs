//! Import reconciliation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::SettingValue;
use crate::core::utils::generate_uuid;
use crate::validation::ValidationError;

/// How an imported snapshot is reconciled with local state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStrategy {
    /// Overwrite local state wholesale
    Replace,
    /// Section-wise reconciliation; resolves like `PreserveImported`
    Merge,
    PreserveLocal,
    PreserveImported,
}

/// Outcome chosen for a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ConflictResolution {
    UseLocal,
    UseImported,
    /// Field-level merge; currently takes the imported section
    Merge,
    /// Explicit replacement value chosen by the caller
    Custom(SettingValue),
}

/// Divergence between local and imported values of one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsConflict {
    pub id: Uuid,
    pub key: String,
    pub local_value: SettingValue,
    pub imported_value: SettingValue,
    pub resolution: Option<ConflictResolution>,
    pub timestamp: DateTime<Utc>,
}

impl SettingsConflict {
    pub fn new(key: impl Into<String>, local_value: SettingValue, imported_value: SettingValue) -> Self {
        Self {
            id: generate_uuid(),
            key: key.into(),
            local_value,
            imported_value,
            resolution: None,
            timestamp: Utc::now(),
        }
    }

    pub fn resolved(mut self, resolution: ConflictResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// Result of an import use case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsImportResult {
    pub success: bool,
    /// Section keys whose imported value was applied
    pub imported_settings: Vec<String>,
    /// Section keys left at their local value
    pub skipped_settings: Vec<String>,
    pub conflicts: Vec<SettingsConflict>,
    pub errors: Vec<String>,
    pub import_date: DateTime<Utc>,
}

impl SettingsImportResult {
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            imported_settings: Vec::new(),
            skipped_settings: Vec::new(),
            conflicts: Vec::new(),
            errors,
            import_date: Utc::now(),
        }
    }
}

/// Compatibility verdict for an import candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportValidation {
    pub is_valid: bool,
    pub requires_migration: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}
