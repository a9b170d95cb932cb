//! Leavn Settings - settings management and synchronization engine
//!
//! This crate provides the configuration core of the Leavn Bible app:
//! - A versioned, section-partitioned settings tree with validation
//! - Section-level change auditing with compensation on audit failure
//! - Export/import with conflict reconciliation and schema migration
//! - Backups, remote sync delegation and sensitive-field sealing
//! - A JSON-file reference repository with change observation streams

pub mod analytics;
pub mod audit;
pub mod core;
pub mod logging;
pub mod migration;
pub mod model;
pub mod repository;
pub mod usecase;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use core::config::EngineConfig;
pub use core::error::{SettingsError, SettingsResult};
pub use model::{AppSettings, SettingValue, SettingsSection};
pub use repository::{FileSettingsRepository, SettingsRepository};
pub use usecase::SettingsUseCases;
pub use validation::{SettingsValidator, ValidationError};
