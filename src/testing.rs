//! In-memory repository with failure switches for orchestrator tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use crate::core::{SettingsError, SettingsResult};
use crate::model::{
    AppSettings, ConflictResolution, DeviceInfo, ImportValidation, SettingValue, SettingsBackup,
    SettingsChangeEvent, SettingsExport, SyncStatus,
};
use crate::repository::SettingsRepository;

fn unavailable(what: &str) -> SettingsError {
    SettingsError::StorageUnavailable(format!("{} switched off", what))
}

#[derive(Default)]
pub struct MockRepository {
    pub settings: Mutex<AppSettings>,
    pub values: Mutex<BTreeMap<String, SettingValue>>,
    pub events: Mutex<Vec<SettingsChangeEvent>>,
    pub backups: Mutex<Vec<SettingsBackup>>,
    pub sync_status: Mutex<SyncStatus>,
    pub resolutions: Mutex<Vec<ConflictResolution>>,

    pub fail_get: AtomicBool,
    pub fail_save: AtomicBool,
    pub fail_track: AtomicBool,
    pub fail_values: AtomicBool,
    pub fail_sync: AtomicBool,
    /// Accept this many more audit events, then fail every append
    pub track_budget: Mutex<Option<usize>>,

    pub saves: AtomicUsize,
    pub syncs: AtomicUsize,
    pub forced_syncs: AtomicUsize,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: AppSettings) -> Self {
        let repo = Self::default();
        *repo.settings.lock() = settings;
        repo
    }

    pub fn stored(&self) -> AppSettings {
        self.settings.lock().clone()
    }

    pub fn recorded(&self) -> Vec<SettingsChangeEvent> {
        self.events.lock().clone()
    }

    pub fn switch(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    pub fn fail_track_after(&self, accepted: usize) {
        *self.track_budget.lock() = Some(accepted);
    }

    /// Charge `count` events against the budget, all or nothing
    fn charge_track(&self, count: usize) -> SettingsResult<()> {
        Self::check(&self.fail_track, "track")?;
        let mut budget = self.track_budget.lock();
        match budget.as_mut() {
            Some(left) if *left < count => Err(unavailable("track")),
            Some(left) => {
                *left -= count;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> SettingsResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(unavailable(what))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SettingsRepository for MockRepository {
    async fn get_settings(&self) -> SettingsResult<AppSettings> {
        Self::check(&self.fail_get, "get")?;
        Ok(self.stored())
    }

    async fn save_settings(&self, settings: &AppSettings) -> SettingsResult<()> {
        Self::check(&self.fail_save, "save")?;
        *self.settings.lock() = settings.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset_settings(&self) -> SettingsResult<AppSettings> {
        Self::check(&self.fail_save, "save")?;
        let defaults = self.default_settings();
        *self.settings.lock() = defaults.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(defaults)
    }

    async fn get_value(&self, key: &str) -> SettingsResult<Option<SettingValue>> {
        Self::check(&self.fail_get, "get")?;
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: SettingValue) -> SettingsResult<()> {
        Self::check(&self.fail_values, "values")?;
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> SettingsResult<()> {
        Self::check(&self.fail_values, "values")?;
        self.values.lock().remove(key);
        Ok(())
    }

    async fn sync_settings(&self) -> SettingsResult<SyncStatus> {
        Self::check(&self.fail_sync, "sync")?;
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(*self.sync_status.lock())
    }

    async fn force_sync_settings(&self) -> SettingsResult<SyncStatus> {
        Self::check(&self.fail_sync, "sync")?;
        self.forced_syncs.fetch_add(1, Ordering::SeqCst);
        Ok(*self.sync_status.lock())
    }

    async fn get_sync_status(&self) -> SettingsResult<SyncStatus> {
        Ok(*self.sync_status.lock())
    }

    async fn resolve_sync_conflicts(&self, resolution: ConflictResolution) -> SettingsResult<()> {
        Self::check(&self.fail_sync, "sync")?;
        self.resolutions.lock().push(resolution);
        *self.sync_status.lock() = SyncStatus::Success;
        Ok(())
    }

    async fn track_setting_change(&self, event: SettingsChangeEvent) -> SettingsResult<()> {
        self.charge_track(1)?;
        self.events.lock().push(event);
        Ok(())
    }

    async fn track_setting_changes(&self, events: Vec<SettingsChangeEvent>) -> SettingsResult<()> {
        self.charge_track(events.len())?;
        self.events.lock().extend(events);
        Ok(())
    }

    async fn get_settings_history(
        &self,
        key: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> SettingsResult<Vec<SettingsChangeEvent>> {
        Ok(self
            .events
            .lock()
            .iter()
            .rev()
            .filter(|e| key.map_or(true, |k| e.setting_key == k))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_setting_changes(
        &self,
        since: DateTime<Utc>,
    ) -> SettingsResult<Vec<SettingsChangeEvent>> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn export_settings(&self) -> SettingsResult<SettingsExport> {
        Ok(SettingsExport::new(
            self.get_settings().await?,
            "test",
            DeviceInfo::current(),
        ))
    }

    async fn validate_import(&self, _export: &SettingsExport) -> SettingsResult<ImportValidation> {
        Ok(ImportValidation {
            is_valid: true,
            requires_migration: false,
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }

    async fn create_backup(
        &self,
        name: Option<String>,
        is_automatic: bool,
    ) -> SettingsResult<SettingsBackup> {
        let backup = SettingsBackup::new(
            self.get_settings().await?,
            "test",
            DeviceInfo::current(),
            name,
            is_automatic,
        )?;
        self.backups.lock().push(backup.clone());
        Ok(backup)
    }

    async fn restore_from_backup(&self, id: Uuid) -> SettingsResult<AppSettings> {
        let backup = self
            .get_backup(id)
            .await?
            .ok_or_else(|| SettingsError::not_found(format!("backup {}", id)))?;
        self.save_settings(&backup.settings).await?;
        Ok(backup.settings)
    }

    async fn get_backup(&self, id: Uuid) -> SettingsResult<Option<SettingsBackup>> {
        Ok(self.backups.lock().iter().find(|b| b.id == id).cloned())
    }

    async fn get_backups(&self) -> SettingsResult<Vec<SettingsBackup>> {
        let mut backups = self.backups.lock().clone();
        backups.reverse();
        Ok(backups)
    }

    async fn delete_backup(&self, id: Uuid) -> SettingsResult<()> {
        let mut backups = self.backups.lock();
        let before = backups.len();
        backups.retain(|b| b.id != id);
        if backups.len() == before {
            return Err(SettingsError::not_found(format!("backup {}", id)));
        }
        Ok(())
    }
}
