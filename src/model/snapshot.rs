//! Portable snapshots: exports and backups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::settings::AppSettings;
use crate::core::error::SettingsResult;
use crate::core::utils::{device_name, generate_uuid};

/// Anonymous description of the device a snapshot was taken on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: String,
    /// Operating system (e.g., "ios", "macos", "linux")
    pub platform: String,
    pub architecture: String,
    pub os_version: Option<String>,
}

impl DeviceInfo {
    /// Describe the current device
    pub fn current() -> Self {
        let name = device_name();
        Self {
            device_id: crate::core::utils::hash_content(name.as_bytes())[..16].to_string(),
            device_name: name,
            platform: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            os_version: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::current()
    }
}

/// Portable snapshot produced by an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsExport {
    pub settings: AppSettings,
    pub export_date: DateTime<Utc>,
    pub app_version: String,
    pub device_info: DeviceInfo,
    pub export_id: Uuid,
}

impl SettingsExport {
    pub fn new(settings: AppSettings, app_version: impl Into<String>, device_info: DeviceInfo) -> Self {
        Self {
            settings,
            export_date: Utc::now(),
            app_version: app_version.into(),
            device_info,
            export_id: generate_uuid(),
        }
    }

    /// Pretty JSON document for writing to disk or sharing
    pub fn to_json(&self) -> SettingsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> SettingsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Full snapshot kept for restore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBackup {
    pub id: Uuid,
    pub settings: AppSettings,
    pub created_at: DateTime<Utc>,
    pub app_version: String,
    pub device_info: DeviceInfo,
    pub is_automatic: bool,
    pub name: Option<String>,
    /// Byte length of the serialized settings
    pub size: u64,
}

impl SettingsBackup {
    pub fn new(
        settings: AppSettings,
        app_version: impl Into<String>,
        device_info: DeviceInfo,
        name: Option<String>,
        is_automatic: bool,
    ) -> SettingsResult<Self> {
        let size = serde_json::to_vec(&settings)?.len() as u64;
        Ok(Self {
            id: generate_uuid(),
            settings,
            created_at: Utc::now(),
            app_version: app_version.into(),
            device_info,
            is_automatic,
            name,
            size,
        })
    }
}
