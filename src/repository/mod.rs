//! Settings Repository
//!
//! The storage-facing contract consumed by the use cases, the collaborator
//! ports a repository may rely on, and a JSON-file reference implementation.

mod file;

#[cfg(test)]
mod tests;

pub use file::{FileSettingsRepository, SEALED_PRIVACY_KEY};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::core::{SettingsError, SettingsResult};
use crate::migration::MigrationResult;
use crate::model::{
    AppSettings, ConflictResolution, ImportValidation, SectionValue, SettingValue,
    SettingsBackup, SettingsChangeEvent, SettingsExport, SettingsSection, SyncStatus,
};

/// Push-based stream of accepted changes. Dropping it ends the subscription.
pub type SettingsChangeStream = BoxStream<'static, SettingsChangeEvent>;

/// Storage contract for the settings tree, individual keys, audit log,
/// backups and sync.
///
/// Implementations must serialize writes (at most one writer at a time).
/// Optional capabilities default to [`SettingsError::Unsupported`].
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    // ---- tree ----

    async fn get_settings(&self) -> SettingsResult<AppSettings>;

    async fn save_settings(&self, settings: &AppSettings) -> SettingsResult<()>;

    /// Persist the default tree and return it
    async fn reset_settings(&self) -> SettingsResult<AppSettings>;

    fn default_settings(&self) -> AppSettings {
        AppSettings::default()
    }

    // ---- sections ----

    async fn get_section(&self, section: SettingsSection) -> SettingsResult<SectionValue> {
        Ok(self.get_settings().await?.section(section))
    }

    async fn save_section(&self, value: SectionValue) -> SettingsResult<()> {
        let mut settings = self.get_settings().await?;
        settings.set_section(value);
        settings.touch();
        self.save_settings(&settings).await
    }

    /// Replace one section with its default and return the resulting tree
    async fn reset_section(&self, section: SettingsSection) -> SettingsResult<AppSettings> {
        let current = self.get_settings().await?;
        let mut settings = current.with_section_from(section, &self.default_settings());
        settings.touch();
        self.save_settings(&settings).await?;
        Ok(settings)
    }

    // ---- individual keys ----

    async fn get_value(&self, key: &str) -> SettingsResult<Option<SettingValue>>;

    async fn set_value(&self, key: &str, value: SettingValue) -> SettingsResult<()>;

    async fn remove_value(&self, key: &str) -> SettingsResult<()>;

    // ---- sync ----

    async fn sync_settings(&self) -> SettingsResult<SyncStatus> {
        Err(SettingsError::Unsupported("sync".to_string()))
    }

    async fn force_sync_settings(&self) -> SettingsResult<SyncStatus> {
        Err(SettingsError::Unsupported("sync".to_string()))
    }

    async fn get_sync_status(&self) -> SettingsResult<SyncStatus> {
        Ok(SyncStatus::Idle)
    }

    async fn resolve_sync_conflicts(&self, _resolution: ConflictResolution) -> SettingsResult<()> {
        Err(SettingsError::Unsupported("sync".to_string()))
    }

    // ---- audit ----

    async fn track_setting_change(&self, event: SettingsChangeEvent) -> SettingsResult<()>;

    /// Append a batch of events. Implementations that can write the batch in
    /// one step should override this so a failure leaves none of it behind.
    async fn track_setting_changes(&self, events: Vec<SettingsChangeEvent>) -> SettingsResult<()> {
        for event in events {
            self.track_setting_change(event).await?;
        }
        Ok(())
    }

    /// Newest-first, optionally filtered by key
    async fn get_settings_history(
        &self,
        key: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> SettingsResult<Vec<SettingsChangeEvent>>;

    /// Every event recorded at or after `since`, oldest first
    async fn get_setting_changes(
        &self,
        since: DateTime<Utc>,
    ) -> SettingsResult<Vec<SettingsChangeEvent>>;

    // ---- export / import ----

    async fn export_settings(&self) -> SettingsResult<SettingsExport>;

    /// Persist the exported tree as-is
    async fn import_settings(&self, export: &SettingsExport) -> SettingsResult<()> {
        self.save_settings(&export.settings).await
    }

    async fn validate_import(&self, export: &SettingsExport) -> SettingsResult<ImportValidation>;

    // ---- backups ----

    async fn create_backup(
        &self,
        name: Option<String>,
        is_automatic: bool,
    ) -> SettingsResult<SettingsBackup>;

    /// Restore a stored backup verbatim and return the restored tree
    async fn restore_from_backup(&self, id: Uuid) -> SettingsResult<AppSettings>;

    async fn get_backup(&self, id: Uuid) -> SettingsResult<Option<SettingsBackup>>;

    /// Newest first
    async fn get_backups(&self) -> SettingsResult<Vec<SettingsBackup>>;

    async fn delete_backup(&self, id: Uuid) -> SettingsResult<()>;

    // ---- cache ----

    async fn clear_settings_cache(&self) -> SettingsResult<()> {
        Ok(())
    }

    async fn refresh_settings_cache(&self) -> SettingsResult<()> {
        Ok(())
    }

    async fn preload_settings(&self) -> SettingsResult<()> {
        Ok(())
    }

    // ---- observation ----

    fn observe_setting_changes(&self, _key: &str) -> SettingsChangeStream {
        Box::pin(futures::stream::empty())
    }

    fn observe_all_setting_changes(&self) -> SettingsChangeStream {
        Box::pin(futures::stream::empty())
    }

    // ---- migration ----

    /// Bring the stored tree to the current schema version
    async fn migrate_settings(&self) -> SettingsResult<MigrationResult> {
        Err(SettingsError::Unsupported("migration".to_string()))
    }

    async fn get_current_settings_version(&self) -> SettingsResult<String> {
        Ok(self.get_settings().await?.version)
    }

    async fn needs_migration(&self) -> SettingsResult<bool> {
        Ok(self.get_current_settings_version().await? != crate::model::CURRENT_SCHEMA_VERSION)
    }

    // ---- security ----

    async fn encrypt_sensitive_settings(&self) -> SettingsResult<()> {
        Err(SettingsError::Unsupported("sensitive settings vault".to_string()))
    }

    async fn decrypt_sensitive_settings(&self) -> SettingsResult<()> {
        Err(SettingsError::Unsupported("sensitive settings vault".to_string()))
    }

    async fn rotate_sensitive_settings_key(&self) -> SettingsResult<()> {
        Err(SettingsError::Unsupported("sensitive settings vault".to_string()))
    }

    /// Check the stored tree against its checksum
    async fn validate_settings_integrity(&self) -> SettingsResult<bool> {
        Ok(true)
    }
}

/// Remote store contract used by the file repository's sync
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Push a tree. `fingerprint` identifies its content; pushing the same
    /// fingerprint twice must be harmless.
    async fn push(&self, settings: &AppSettings, fingerprint: &str) -> SettingsResult<()>;

    /// Latest remote tree with its fingerprint, if any
    async fn fetch(&self) -> SettingsResult<Option<(AppSettings, String)>>;
}

/// Secure vault contract for sensitive values
#[async_trait]
pub trait SettingsVault: Send + Sync {
    async fn seal(&self, plaintext: &[u8]) -> SettingsResult<Vec<u8>>;

    async fn open(&self, sealed: &[u8]) -> SettingsResult<Vec<u8>>;

    /// Switch to a new key; data sealed before must be re-sealed by the caller
    async fn rotate_key(&self) -> SettingsResult<()>;
}
