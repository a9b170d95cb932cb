//! Backup and restore

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::SettingsUseCases;
use crate::analytics::{names, AnalyticsEvent};
use crate::core::{SettingsError, SettingsResult};
use crate::migration::{parse_version, prepare_settings, MigrationEngine};
use crate::model::{
    keys, AppSettings, ChangeSource, SettingValue, SettingsBackup, SettingsChangeEvent,
};

impl SettingsUseCases {
    /// Snapshot the stored tree and record the backup
    pub async fn create_backup(
        &self,
        name: Option<String>,
        is_automatic: bool,
    ) -> SettingsResult<SettingsBackup> {
        let backup = self.repository.create_backup(name, is_automatic).await?;

        let event = SettingsChangeEvent::new(
            keys::SETTINGS_BACKUP,
            None,
            SettingValue::String(backup.id.to_string()),
            ChangeSource::System,
        );
        if let Err(e) = self.tracker.record(event).await {
            if let Err(delete_error) = self.repository.delete_backup(backup.id).await {
                warn!(backup_id = %backup.id, error = %delete_error, "Unrecorded backup left behind");
            }
            return Err(e);
        }

        info!(backup_id = %backup.id, automatic = is_automatic, "Backup created");
        self.emit(
            AnalyticsEvent::new(names::SETTINGS_BACKUP_CREATED)
                .with("automatic", is_automatic)
                .with("size", backup.size),
        );

        Ok(backup)
    }

    /// Restore a backup after migrating and validating its tree.
    ///
    /// A backup from an older schema is migrated first and the migrated tree
    /// is what gets stored. Missing backups fail with `NotFound`; a backup
    /// from a newer or unrecognised schema fails with `ImportIncompatible`.
    pub async fn restore_from_backup(&self, id: Uuid) -> SettingsResult<AppSettings> {
        let backup = self
            .repository
            .get_backup(id)
            .await?
            .ok_or_else(|| SettingsError::not_found(format!("backup {}", id)))?;

        let raw: Value = serde_json::to_value(&backup.settings)?;
        let version = MigrationEngine::detect_version(&raw);
        if !is_known_schema(&self.migrations, &version) {
            warn!(backup_id = %id, version = %version, "Backup schema not restorable");
            return Err(SettingsError::ImportIncompatible(format!(
                "backup schema {} is not supported (current {})",
                version,
                self.migrations.current_version()
            )));
        }

        let prepared = prepare_settings(&self.migrations, &self.validator, raw);

        let restored = match prepared.accepted() {
            Some(settings) => settings.clone(),
            None => {
                if let Some(migration) = prepared.migration.as_ref().filter(|m| !m.success) {
                    return Err(SettingsError::MigrationFailed(migration.errors.join("; ")));
                }
                self.report_validation_failure("restore_from_backup", &prepared.validation.errors);
                return Err(SettingsError::ValidationFailed(prepared.validation.errors));
            }
        };

        let previous = match self.repository.get_settings().await {
            Ok(previous) => Some(previous),
            Err(e) => {
                warn!(error = %e, "Previous settings unavailable before restore");
                None
            }
        };

        let restored = if prepared.migration.is_some() {
            self.repository.save_settings(&restored).await?;
            restored
        } else {
            self.repository.restore_from_backup(id).await?
        };

        let recorded = match restore_event(previous.as_ref(), &restored) {
            Ok(event) => self.tracker.record(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            if let Some(previous) = &previous {
                self.compensate(previous, &e).await;
            }
            return Err(e);
        }

        info!(backup_id = %id, migrated = prepared.migration.is_some(), "Backup restored");
        self.emit(
            AnalyticsEvent::new(names::SETTINGS_BACKUP_RESTORED)
                .with("automatic", backup.is_automatic)
                .with("migrated", prepared.migration.is_some()),
        );

        Ok(restored)
    }

    /// Stored backups, newest first
    pub async fn list_backups(&self) -> SettingsResult<Vec<SettingsBackup>> {
        self.repository.get_backups().await
    }

    pub async fn delete_backup(&self, id: Uuid) -> SettingsResult<()> {
        self.repository.delete_backup(id).await?;
        info!(backup_id = %id, "Backup deleted");
        Ok(())
    }
}

/// Versions at or below the current schema can be restored
fn is_known_schema(engine: &MigrationEngine, version: &str) -> bool {
    match (parse_version(version), parse_version(engine.current_version())) {
        (Some(version), Some(current)) => version <= current,
        _ => false,
    }
}

fn restore_event(
    previous: Option<&AppSettings>,
    restored: &AppSettings,
) -> SettingsResult<SettingsChangeEvent> {
    Ok(SettingsChangeEvent::new(
        keys::SETTINGS_RESTORE,
        previous.map(SettingValue::encode).transpose()?,
        SettingValue::encode(restored)?,
        ChangeSource::System,
    ))
}
