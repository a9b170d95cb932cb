//! Analytics port
//!
//! Fire-and-forget reporting of settings workflows. Events carry a name and
//! flat string parameters only: section names, strategies, counts and error
//! codes, never setting values.

mod collector;


pub use collector::{AnalyticsBatch, AnalyticsCollector, CollectorConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event names emitted by the use cases
pub mod names {
    pub const SETTINGS_UPDATED: &str = "settings_updated";
    pub const SETTING_CHANGED: &str = "setting_changed";
    pub const SETTINGS_RESET: &str = "settings_reset";
    pub const SETTINGS_EXPORTED: &str = "settings_exported";
    pub const SETTINGS_IMPORTED: &str = "settings_imported";
    pub const SETTINGS_IMPORT_FAILED: &str = "settings_import_failed";
    pub const SETTINGS_SYNC_STARTED: &str = "settings_sync_started";
    pub const SETTINGS_SYNC_COMPLETED: &str = "settings_sync_completed";
    pub const SETTINGS_SYNC_FAILED: &str = "settings_sync_failed";
    pub const SETTINGS_BACKUP_CREATED: &str = "settings_backup_created";
    pub const SETTINGS_BACKUP_RESTORED: &str = "settings_backup_restored";
    pub const SETTINGS_VALIDATION_FAILED: &str = "settings_validation_failed";
}

/// Analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(key.into(), value.to_string());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Destination for analytics events. Implementations must not block and
/// must not fail the caller.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: AnalyticsEvent);
}

/// Sink that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalyticsSink;

impl AnalyticsSink for TracingAnalyticsSink {
    fn track(&self, event: AnalyticsEvent) {
        tracing::info!(
            target: "leavn_settings::analytics",
            event = %event.name,
            parameters = ?event.parameters,
            "Analytics event"
        );
    }
}
