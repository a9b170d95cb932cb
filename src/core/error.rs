//! Error types for the settings engine
//!
//! Validation problems are returned as data (`ValidationError` lists) by the
//! validators; they only become a hard error when a mutating use case rejects
//! its input with [`SettingsError::ValidationFailed`].

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias for settings operations
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Main error type for the settings engine
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings validation failed: {}", summarize(.0))]
    ValidationFailed(Vec<ValidationError>),

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Settings storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Import incompatible: {0}")]
    ImportIncompatible(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SettingsError {
    /// Create a not-found error for the given subject
    pub fn not_found(what: impl Into<String>) -> Self {
        SettingsError::NotFound { what: what.into() }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettingsError::StorageUnavailable(_))
    }

    /// Stable, PII-free code used for analytics parameters
    pub fn code(&self) -> &'static str {
        match self {
            SettingsError::ValidationFailed(_) => "validation_failed",
            SettingsError::NotFound { .. } => "not_found",
            SettingsError::StorageUnavailable(_) => "storage_unavailable",
            SettingsError::ImportIncompatible(_) => "import_incompatible",
            SettingsError::MigrationFailed(_) => "migration_failed",
            SettingsError::Serialization(_) => "serialization",
            SettingsError::Unsupported(_) => "unsupported",
            SettingsError::Configuration(_) => "configuration",
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        SettingsError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Serialization(err.to_string())
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
