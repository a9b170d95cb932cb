//! Migration Engine
//!
//! Handles settings schema migrations between versions:
//! - Version detection
//! - Stepwise upgrade along a registered chain
//! - Downgrade by composing rollbacks in reverse
//! - All-or-nothing application: a failing step leaves the tree untouched
//!
//! Steps operate on the raw JSON tree so fields that no longer exist in the
//! current model are still visible to the step that renames or removes them.

mod engine;
mod prepare;
mod steps;


pub use engine::{MigrationEngine, MigrationOutcome, INITIAL_SCHEMA_VERSION};
pub use prepare::{prepare_settings, PreparedSettings};
pub use steps::{AddAnalyticsSection, StorageBytesAndHighlightPalette};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Migration error types
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Unknown settings version: {0}")]
    UnknownVersion(String),

    #[error("Migration failed from {from} to {to}: {reason}")]
    StepFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Rollback not supported from {to} to {from}")]
    RollbackUnsupported { from: String, to: String },

    #[error("Invalid settings tree: {0}")]
    InvalidTree(String),
}

/// One schema step: `from_version` to its immediate successor `to_version`
pub trait MigrationStep: Send + Sync {
    /// Source version
    fn from_version(&self) -> &'static str;

    /// Target version
    fn to_version(&self) -> &'static str;

    /// Short human readable name
    fn name(&self) -> &'static str;

    /// Dotted paths introduced by this step
    fn added(&self) -> Vec<String> {
        Vec::new()
    }

    /// Dotted paths dropped by this step
    fn removed(&self) -> Vec<String> {
        Vec::new()
    }

    /// Dotted paths whose representation changes
    fn transformed(&self) -> Vec<String> {
        Vec::new()
    }

    /// Perform migration
    fn migrate(&self, tree: Value) -> Result<Value, MigrationError>;

    /// Rollback migration
    fn rollback(&self, _tree: Value) -> Result<Value, MigrationError> {
        Err(MigrationError::RollbackUnsupported {
            from: self.from_version().to_string(),
            to: self.to_version().to_string(),
        })
    }
}

/// Report of one migration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub from_version: String,
    pub to_version: String,
    pub migrated_settings: Vec<String>,
    pub removed_settings: Vec<String>,
    pub added_settings: Vec<String>,
    pub errors: Vec<String>,
    pub migration_date: DateTime<Utc>,
}

impl MigrationResult {
    /// A run that had nothing to do
    pub fn up_to_date(version: &str) -> Self {
        Self {
            success: true,
            from_version: version.to_string(),
            to_version: version.to_string(),
            migrated_settings: Vec::new(),
            removed_settings: Vec::new(),
            added_settings: Vec::new(),
            errors: Vec::new(),
            migration_date: Utc::now(),
        }
    }
}

/// Parse a `major.minor.patch` version for ordering
pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    let patch = parts.next().unwrap_or("0").parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}
