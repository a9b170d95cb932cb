//! Use-Case Orchestrator
//!
//! Each public method on [`SettingsUseCases`] is one atomic settings workflow:
//! validate, persist through the repository, then record the audit trail. A
//! workflow whose audit record cannot be written after persisting puts the
//! previous state back and fails. Analytics are reported on the side and
//! never affect the outcome.

mod backup;
mod reset;
mod sync;
mod transfer;
mod update;


use std::sync::Arc;
use tracing::{error, warn};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::audit::ChangeTracker;
use crate::core::{EngineConfig, SettingsError, SettingsResult};
use crate::migration::MigrationEngine;
use crate::model::{AppSettings, DeviceInfo, SettingsChangeEvent, SettingsValidationType};
use crate::repository::SettingsRepository;
use crate::validation::{SettingsValidator, ValidationError};

const DEFAULT_HISTORY_PAGE_LIMIT: usize = 500;

/// Orchestrates settings workflows over a repository
pub struct SettingsUseCases {
    repository: Arc<dyn SettingsRepository>,
    tracker: ChangeTracker,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    validator: SettingsValidator,
    migrations: MigrationEngine,
    app_version: String,
    device_info: DeviceInfo,
    history_page_limit: usize,
}

impl SettingsUseCases {
    pub fn new(repository: Arc<dyn SettingsRepository>) -> Self {
        Self {
            tracker: ChangeTracker::new(repository.clone()),
            repository,
            analytics: None,
            validator: SettingsValidator::default(),
            migrations: MigrationEngine::new(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            device_info: DeviceInfo::current(),
            history_page_limit: DEFAULT_HISTORY_PAGE_LIMIT,
        }
    }

    /// Orchestrator using the app version, device name and paging limit of
    /// an engine configuration
    pub fn from_config(repository: Arc<dyn SettingsRepository>, config: &EngineConfig) -> Self {
        let mut device_info = DeviceInfo::current();
        if let Some(name) = &config.device_name {
            device_info = device_info.with_name(name.clone());
        }

        Self {
            app_version: config.app_version.clone(),
            device_info,
            history_page_limit: config.history_page_limit.max(1),
            ..Self::new(repository)
        }
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn with_validator(mut self, validator: SettingsValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_migrations(mut self, migrations: MigrationEngine) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn with_device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = device_info;
        self
    }

    pub fn repository(&self) -> &Arc<dyn SettingsRepository> {
        &self.repository
    }

    /// Newest-first audit history, optionally filtered by key
    pub async fn get_settings_history(
        &self,
        key: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> SettingsResult<Vec<SettingsChangeEvent>> {
        self.tracker
            .history(key, limit.min(self.history_page_limit), offset)
            .await
    }

    /// Validate the stored tree without persisting anything
    pub async fn validate_settings(
        &self,
        validation_type: SettingsValidationType,
    ) -> SettingsResult<Vec<ValidationError>> {
        let settings = self.repository.get_settings().await?;
        let errors = self.validator.validate_type(&settings, validation_type);
        if !errors.is_empty() {
            self.report_validation_failure("validate_settings", &errors);
        }
        Ok(errors)
    }

    fn emit(&self, event: AnalyticsEvent) {
        if let Some(sink) = &self.analytics {
            sink.track(event);
        }
    }

    fn report_validation_failure(&self, operation: &str, errors: &[ValidationError]) {
        let fields = errors
            .iter()
            .map(|e| e.field.as_str())
            .collect::<Vec<_>>()
            .join(",");
        self.emit(
            AnalyticsEvent::new(crate::analytics::names::SETTINGS_VALIDATION_FAILED)
                .with("operation", operation)
                .with("error_count", errors.len())
                .with("fields", fields),
        );
    }

    /// Put `previous` back after a failure that followed a successful persist
    async fn compensate(&self, previous: &AppSettings, cause: &SettingsError) {
        match self.repository.save_settings(previous).await {
            Ok(()) => warn!(error = %cause, "Audit failed, previous settings restored"),
            Err(e) => error!(
                error = %cause,
                restore_error = %e,
                "Audit failed and previous settings could not be restored"
            ),
        }
    }

    /// Validate a tree before a mutating workflow accepts it
    fn ensure_valid(&self, operation: &str, settings: &AppSettings) -> SettingsResult<()> {
        let errors = self.validator.validate(settings);
        if errors.is_empty() {
            return Ok(());
        }
        self.report_validation_failure(operation, &errors);
        Err(SettingsError::ValidationFailed(errors))
    }
}

impl std::fmt::Debug for SettingsUseCases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsUseCases")
            .field("app_version", &self.app_version)
            .field("analytics", &self.analytics.is_some())
            .field("migrations", &self.migrations)
            .finish_non_exhaustive()
    }
}
