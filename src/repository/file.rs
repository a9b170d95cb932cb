//! JSON file settings repository
//!
//! Provides file-based settings storage with:
//! - Atomic writes using temp file + rename
//! - A blake3 checksum envelope around the stored tree
//! - An append-only JSON-lines audit log
//! - One JSON file per backup with retention of automatic backups
//! - Single-writer access via an async mutex, cached reads via RwLock
//! - Broadcast observation of recorded changes
//! - Fingerprint-based idempotent sync through an optional transport
//!
//! Trees written by sync or by the vault are audited here, since no use case
//! sees them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{SettingsChangeStream, SettingsRepository, SettingsVault, SyncTransport};
use crate::audit;
use crate::core::utils::{fingerprint, format_bytes, hash_content};
use crate::core::{EngineConfig, SettingsError, SettingsResult};
use crate::migration::{prepare_settings, MigrationEngine, MigrationResult};
use crate::model::{
    AppSettings, ChangeSource, ConflictResolution, DeviceInfo, ImportValidation, SectionValue, SettingValue,
    SettingsBackup, SettingsChangeEvent, SettingsExport, SettingsSection, SyncStatus,
    CURRENT_SCHEMA_VERSION,
};
use crate::validation::SettingsValidator;

/// Individual key holding the vault-sealed sensitive privacy fields
pub const SEALED_PRIVACY_KEY: &str = "privacy.sealed";

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// On-disk wrapper around the settings tree
#[derive(Debug, Serialize, Deserialize)]
struct StoredSettings {
    checksum: String,
    settings: Value,
}

impl StoredSettings {
    fn wrap(settings: Value) -> SettingsResult<Self> {
        let checksum = hash_content(&serde_json::to_vec(&settings)?);
        Ok(Self { checksum, settings })
    }

    fn is_intact(&self) -> SettingsResult<bool> {
        Ok(hash_content(&serde_json::to_vec(&self.settings)?) == self.checksum)
    }
}

/// Persisted sync bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SyncState {
    status: SyncStatus,
    last_synced_fingerprint: Option<String>,
    last_sync: Option<DateTime<Utc>>,
    /// Remote tree parked until a conflict is resolved
    pending_remote: Option<AppSettings>,
}

/// Sensitive privacy fields as sealed by the vault
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensitivePrivacy {
    biometric_auth_enabled: bool,
    passcode_required: bool,
}

/// Settings repository backed by JSON files under one data directory
pub struct FileSettingsRepository {
    config: EngineConfig,
    device_info: DeviceInfo,
    cache: RwLock<Option<AppSettings>>,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<SettingsChangeEvent>,
    key_channels: DashMap<String, broadcast::Sender<SettingsChangeEvent>>,
    migrations: MigrationEngine,
    validator: SettingsValidator,
    transport: Option<Arc<dyn SyncTransport>>,
    vault: Option<Arc<dyn SettingsVault>>,
}

impl FileSettingsRepository {
    /// Open the repository, creating the directory layout and a default tree
    /// when none exists yet.
    pub async fn new(config: EngineConfig) -> SettingsResult<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        tokio::fs::create_dir_all(config.backup_dir()).await?;

        let settings_path = config.settings_path();
        if !tokio::fs::try_exists(&settings_path).await? {
            let defaults = serde_json::to_value(AppSettings::default())?;
            write_json_atomic(&settings_path, &StoredSettings::wrap(defaults)?).await?;
            info!(path = %settings_path.display(), "Created default settings");
        }

        let device_info = match &config.device_name {
            Some(name) => DeviceInfo::current().with_name(name.clone()),
            None => DeviceInfo::current(),
        };
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            device_info,
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
            changes,
            key_channels: DashMap::new(),
            migrations: MigrationEngine::new(),
            validator: SettingsValidator::new(),
            transport: None,
            vault: None,
        })
    }

    /// Attach a remote store for sync
    pub fn with_sync_transport(mut self, transport: Arc<dyn SyncTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Attach a vault for sensitive fields
    pub fn with_vault(mut self, vault: Arc<dyn SettingsVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    async fn read_envelope(&self) -> SettingsResult<StoredSettings> {
        let path = self.config.settings_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SettingsError::not_found(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read the tree from disk, migrating an older schema in memory
    async fn load_settings(&self) -> SettingsResult<AppSettings> {
        let envelope = self.read_envelope().await?;
        if !envelope.is_intact()? {
            warn!("Settings checksum mismatch");
        }

        let version = MigrationEngine::detect_version(&envelope.settings);
        let tree = if self.migrations.needs_migration(&version) {
            let outcome = self.migrations.migrate_to_current(envelope.settings);
            if !outcome.result.success {
                return Err(SettingsError::MigrationFailed(outcome.result.errors.join("; ")));
            }
            outcome.tree
        } else {
            envelope.settings
        };

        Ok(serde_json::from_value(tree)?)
    }

    /// Write the tree and refresh the cache. Caller holds the write lock.
    async fn write_settings(&self, settings: &AppSettings) -> SettingsResult<()> {
        let envelope = StoredSettings::wrap(serde_json::to_value(settings)?)?;
        write_json_atomic(&self.config.settings_path(), &envelope).await?;
        *self.cache.write().await = Some(settings.clone());
        debug!(version = %settings.version, "Settings written");
        Ok(())
    }

    async fn read_values(&self) -> SettingsResult<BTreeMap<String, SettingValue>> {
        match tokio::fs::read_to_string(self.config.values_path()).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_audit_log(&self) -> SettingsResult<Vec<SettingsChangeEvent>> {
        let content = match tokio::fs::read_to_string(self.config.audit_log_path()).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping unreadable audit entry"),
            }
        }
        Ok(events)
    }

    async fn read_sync_state(&self) -> SettingsResult<SyncState> {
        match tokio::fs::read_to_string(self.config.sync_state_path()).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SyncState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_sync_state(&self, state: &SyncState) -> SettingsResult<()> {
        write_json_atomic(&self.config.sync_state_path(), state).await
    }

    fn backup_path(&self, id: Uuid) -> PathBuf {
        self.config.backup_dir().join(format!("{}.json", id))
    }

    async fn read_backup(path: &Path) -> SettingsResult<SettingsBackup> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Remove automatic backups exceeding the retention limit, oldest first
    async fn cleanup_old_backups(&self) -> SettingsResult<()> {
        let mut automatic: Vec<SettingsBackup> = self
            .get_backups()
            .await?
            .into_iter()
            .filter(|b| b.is_automatic)
            .collect();

        // get_backups is newest first
        while automatic.len() > self.config.max_backups {
            if let Some(oldest) = automatic.pop() {
                tokio::fs::remove_file(self.backup_path(oldest.id)).await?;
                debug!(id = %oldest.id, "Removed old automatic backup");
            }
        }
        Ok(())
    }

    async fn set_value_locked(&self, key: &str, value: SettingValue) -> SettingsResult<()> {
        value.ensure_encodable()?;
        let mut values = self.read_values().await?;
        values.insert(key.to_string(), value);
        write_json_atomic(&self.config.values_path(), &values).await
    }

    async fn remove_value_locked(&self, key: &str) -> SettingsResult<()> {
        let mut values = self.read_values().await?;
        if values.remove(key).is_some() {
            write_json_atomic(&self.config.values_path(), &values).await?;
        }
        Ok(())
    }

    fn transport(&self) -> SettingsResult<&Arc<dyn SyncTransport>> {
        self.transport
            .as_ref()
            .ok_or_else(|| SettingsError::Unsupported("no sync transport configured".to_string()))
    }

    fn vault(&self) -> SettingsResult<&Arc<dyn SettingsVault>> {
        self.vault
            .as_ref()
            .ok_or_else(|| SettingsError::Unsupported("no settings vault configured".to_string()))
    }

    async fn push_local(
        &self,
        transport: &Arc<dyn SyncTransport>,
        state: &mut SyncState,
        local: &AppSettings,
        local_fp: String,
    ) -> SettingsResult<()> {
        transport.push(local, &local_fp).await?;
        state.last_synced_fingerprint = Some(local_fp);
        state.pending_remote = None;
        Ok(())
    }

    async fn adopt_remote(
        &self,
        state: &mut SyncState,
        local: &AppSettings,
        remote: AppSettings,
        remote_fp: String,
    ) -> SettingsResult<()> {
        self.ensure_valid(&remote)?;
        self.commit_tree_locked(local, &remote, ChangeSource::Sync)
            .await?;
        state.last_synced_fingerprint = Some(remote_fp);
        state.pending_remote = None;
        Ok(())
    }

    fn ensure_valid(&self, settings: &AppSettings) -> SettingsResult<()> {
        let errors = self.validator.validate(settings);
        if errors.is_empty() {
            Ok(())
        } else {
            warn!(errors = errors.len(), "Rejected incoming settings tree");
            Err(SettingsError::ValidationFailed(errors))
        }
    }

    /// Append events to the audit log in a single write. Caller holds the
    /// write lock.
    async fn append_events_locked(&self, events: &[SettingsChangeEvent]) -> SettingsResult<()> {
        let mut batch = Vec::new();
        for event in events {
            event.ensure_encodable()?;
            serde_json::to_writer(&mut batch, event)?;
            batch.push(b'\n');
        }
        if batch.is_empty() {
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.audit_log_path())
            .await?;
        file.write_all(&batch).await?;
        file.flush().await?;
        Ok(())
    }

    /// Write a tree the repository produced itself and audit it. On an audit
    /// failure the previous tree is written back. Caller holds the write lock.
    async fn commit_tree_locked(
        &self,
        previous: &AppSettings,
        next: &AppSettings,
        source: ChangeSource,
    ) -> SettingsResult<()> {
        let events = audit::diff(previous, next, source)?;
        self.write_settings(next).await?;

        if let Err(e) = self.append_events_locked(&events).await {
            if let Err(restore_error) = self.write_settings(previous).await {
                warn!(error = %restore_error, "Could not restore settings after audit failure");
            }
            return Err(e);
        }

        for event in &events {
            self.broadcast(event);
        }
        Ok(())
    }

    /// Core of `sync_settings`. Caller holds the write lock.
    async fn sync_locked(&self, state: &mut SyncState) -> SettingsResult<SyncStatus> {
        let transport = self.transport()?.clone();
        let local = self.get_settings().await?;
        let local_fp = fingerprint(&local)?;

        let status = match transport.fetch().await? {
            Some((_, remote_fp)) if remote_fp == local_fp => {
                state.last_synced_fingerprint = Some(local_fp);
                SyncStatus::Success
            }
            Some((remote, remote_fp)) => {
                let last = state.last_synced_fingerprint.as_deref();
                if last == Some(remote_fp.as_str()) {
                    // remote unchanged since last sync
                    self.push_local(&transport, state, &local, local_fp).await?;
                    SyncStatus::Success
                } else if last == Some(local_fp.as_str()) {
                    // local unchanged since last sync
                    self.adopt_remote(state, &local, remote, remote_fp).await?;
                    SyncStatus::Success
                } else {
                    info!("Sync conflict: local and remote both changed");
                    state.pending_remote = Some(remote);
                    SyncStatus::Conflict
                }
            }
            None => {
                if state.last_synced_fingerprint.as_deref() != Some(local_fp.as_str()) {
                    self.push_local(&transport, state, &local, local_fp).await?;
                }
                SyncStatus::Success
            }
        };

        Ok(status)
    }

    /// Record the outcome of a sync attempt and hand it back
    async fn finish_sync(
        &self,
        mut state: SyncState,
        outcome: SettingsResult<SyncStatus>,
    ) -> SettingsResult<SyncStatus> {
        state.status = match &outcome {
            Ok(status) => *status,
            Err(_) => SyncStatus::Error,
        };
        if matches!(outcome, Ok(SyncStatus::Success)) {
            state.last_sync = Some(Utc::now());
        }
        self.write_sync_state(&state).await?;
        outcome
    }

    fn broadcast(&self, event: &SettingsChangeEvent) {
        // no receivers is not an error
        let _ = self.changes.send(event.clone());
        if let Some(sender) = self.key_channels.get(&event.setting_key) {
            let _ = sender.send(event.clone());
        }
    }
}

/// Serialize to pretty JSON and replace `path` atomically
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> SettingsResult<()> {
    let content = serde_json::to_vec_pretty(value)?;

    // Write to temp file first
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &content).await?;

    // Atomic rename
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

fn receiver_stream(receiver: broadcast::Receiver<SettingsChangeEvent>) -> SettingsChangeStream {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((event, receiver)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Settings change subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl SettingsRepository for FileSettingsRepository {
    async fn get_settings(&self) -> SettingsResult<AppSettings> {
        if let Some(settings) = self.cache.read().await.as_ref() {
            return Ok(settings.clone());
        }

        // Load under the cache guard so a tree cached by a concurrent write
        // is never replaced by an older read.
        let mut cache = self.cache.write().await;
        if let Some(settings) = cache.as_ref() {
            return Ok(settings.clone());
        }
        let settings = self.load_settings().await?;
        *cache = Some(settings.clone());
        Ok(settings)
    }

    async fn save_settings(&self, settings: &AppSettings) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_settings(settings).await
    }

    async fn reset_settings(&self) -> SettingsResult<AppSettings> {
        let _guard = self.write_lock.lock().await;
        let defaults = self.default_settings();
        self.write_settings(&defaults).await?;
        info!("Settings reset to defaults");
        Ok(defaults)
    }

    async fn save_section(&self, value: SectionValue) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.get_settings().await?;
        settings.set_section(value);
        settings.touch();
        self.write_settings(&settings).await
    }

    async fn reset_section(&self, section: SettingsSection) -> SettingsResult<AppSettings> {
        let _guard = self.write_lock.lock().await;
        let current = self.get_settings().await?;
        let mut settings = current.with_section_from(section, &self.default_settings());
        settings.touch();
        self.write_settings(&settings).await?;
        Ok(settings)
    }

    async fn get_value(&self, key: &str) -> SettingsResult<Option<SettingValue>> {
        Ok(self.read_values().await?.remove(key))
    }

    async fn set_value(&self, key: &str, value: SettingValue) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;
        self.set_value_locked(key, value).await
    }

    async fn remove_value(&self, key: &str) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;
        self.remove_value_locked(key).await
    }

    async fn sync_settings(&self) -> SettingsResult<SyncStatus> {
        self.transport()?;
        let _guard = self.write_lock.lock().await;
        let mut state = self.read_sync_state().await?;
        let outcome = self.sync_locked(&mut state).await;
        self.finish_sync(state, outcome).await
    }

    async fn force_sync_settings(&self) -> SettingsResult<SyncStatus> {
        let transport = self.transport()?.clone();
        let _guard = self.write_lock.lock().await;
        let mut state = self.read_sync_state().await?;

        let outcome = async {
            let local = self.get_settings().await?;
            let local_fp = fingerprint(&local)?;
            self.push_local(&transport, &mut state, &local, local_fp)
                .await?;
            Ok::<_, SettingsError>(SyncStatus::Success)
        }
        .await;

        self.finish_sync(state, outcome).await
    }

    async fn get_sync_status(&self) -> SettingsResult<SyncStatus> {
        Ok(self.read_sync_state().await?.status)
    }

    async fn resolve_sync_conflicts(&self, resolution: ConflictResolution) -> SettingsResult<()> {
        let transport = self.transport()?.clone();
        let _guard = self.write_lock.lock().await;
        let mut state = self.read_sync_state().await?;
        let remote = state
            .pending_remote
            .take()
            .ok_or_else(|| SettingsError::not_found("pending sync conflict"))?;
        let parked = remote.clone();

        let outcome = async {
            match resolution {
                ConflictResolution::UseLocal => {
                    let local = self.get_settings().await?;
                    let fp = fingerprint(&local)?;
                    self.push_local(&transport, &mut state, &local, fp).await?;
                }
                ConflictResolution::UseImported | ConflictResolution::Merge => {
                    let local = self.get_settings().await?;
                    let fp = fingerprint(&remote)?;
                    self.adopt_remote(&mut state, &local, remote, fp).await?;
                }
                ConflictResolution::Custom(value) => {
                    let chosen: AppSettings = value.decode()?;
                    self.ensure_valid(&chosen)?;
                    let local = self.get_settings().await?;
                    self.commit_tree_locked(&local, &chosen, ChangeSource::Sync)
                        .await?;
                    let fp = fingerprint(&chosen)?;
                    self.push_local(&transport, &mut state, &chosen, fp).await?;
                }
            }
            Ok::<_, SettingsError>(SyncStatus::Success)
        }
        .await;

        // a failed resolution keeps the conflict open
        if outcome.is_err() {
            state.pending_remote = Some(parked);
        }
        self.finish_sync(state, outcome).await.map(|_| ())
    }

    async fn track_setting_change(&self, event: SettingsChangeEvent) -> SettingsResult<()> {
        self.track_setting_changes(vec![event]).await
    }

    async fn track_setting_changes(&self, events: Vec<SettingsChangeEvent>) -> SettingsResult<()> {
        {
            let _guard = self.write_lock.lock().await;
            self.append_events_locked(&events).await?;
        }

        for event in &events {
            self.broadcast(event);
        }
        Ok(())
    }

    async fn get_settings_history(
        &self,
        key: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> SettingsResult<Vec<SettingsChangeEvent>> {
        let limit = limit.min(self.config.history_page_limit);
        let events = self.read_audit_log().await?;

        Ok(events
            .into_iter()
            .rev()
            .filter(|e| key.map_or(true, |k| e.setting_key == k))
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn get_setting_changes(
        &self,
        since: DateTime<Utc>,
    ) -> SettingsResult<Vec<SettingsChangeEvent>> {
        Ok(self
            .read_audit_log()
            .await?
            .into_iter()
            .filter(|e| e.timestamp >= since)
            .collect())
    }

    async fn export_settings(&self) -> SettingsResult<SettingsExport> {
        let settings = self.get_settings().await?;
        Ok(SettingsExport::new(
            settings,
            self.config.app_version.clone(),
            self.device_info.clone(),
        ))
    }

    async fn validate_import(&self, export: &SettingsExport) -> SettingsResult<ImportValidation> {
        let raw = serde_json::to_value(&export.settings)?;
        let mut validation = prepare_settings(&self.migrations, &self.validator, raw).validation;
        if export.app_version != self.config.app_version {
            validation.warnings.push(format!(
                "exported by app version {}, running {}",
                export.app_version, self.config.app_version
            ));
        }
        Ok(validation)
    }

    async fn create_backup(
        &self,
        name: Option<String>,
        is_automatic: bool,
    ) -> SettingsResult<SettingsBackup> {
        let settings = self.get_settings().await?;
        let backup = SettingsBackup::new(
            settings,
            self.config.app_version.clone(),
            self.device_info.clone(),
            name,
            is_automatic,
        )?;

        {
            let _guard = self.write_lock.lock().await;
            write_json_atomic(&self.backup_path(backup.id), &backup).await?;
            if is_automatic {
                self.cleanup_old_backups().await?;
            }
        }

        info!(id = %backup.id, size = %format_bytes(backup.size), "Settings backup created");
        Ok(backup)
    }

    async fn restore_from_backup(&self, id: Uuid) -> SettingsResult<AppSettings> {
        let backup = self
            .get_backup(id)
            .await?
            .ok_or_else(|| SettingsError::not_found(format!("backup {}", id)))?;

        let _guard = self.write_lock.lock().await;
        self.write_settings(&backup.settings).await?;
        info!(id = %id, "Settings restored from backup");
        Ok(backup.settings)
    }

    async fn get_backup(&self, id: Uuid) -> SettingsResult<Option<SettingsBackup>> {
        let path = self.backup_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(Self::read_backup(&path).await?))
    }

    async fn get_backups(&self) -> SettingsResult<Vec<SettingsBackup>> {
        let mut entries = tokio::fs::read_dir(self.config.backup_dir()).await?;
        let mut backups = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match Self::read_backup(&path).await {
                    Ok(backup) => backups.push(backup),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable backup"),
                }
            }
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(backups)
    }

    async fn delete_backup(&self, id: Uuid) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.backup_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SettingsError::not_found(format!("backup {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_settings_cache(&self) -> SettingsResult<()> {
        *self.cache.write().await = None;
        Ok(())
    }

    async fn refresh_settings_cache(&self) -> SettingsResult<()> {
        let mut cache = self.cache.write().await;
        *cache = Some(self.load_settings().await?);
        Ok(())
    }

    async fn preload_settings(&self) -> SettingsResult<()> {
        self.get_settings().await.map(|_| ())
    }

    fn observe_setting_changes(&self, key: &str) -> SettingsChangeStream {
        let receiver = self
            .key_channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0)
            .subscribe();
        receiver_stream(receiver)
    }

    fn observe_all_setting_changes(&self) -> SettingsChangeStream {
        receiver_stream(self.changes.subscribe())
    }

    async fn migrate_settings(&self) -> SettingsResult<MigrationResult> {
        let _guard = self.write_lock.lock().await;
        let envelope = self.read_envelope().await?;
        let from = MigrationEngine::detect_version(&envelope.settings);

        if !self.migrations.needs_migration(&from) {
            return Ok(MigrationResult::up_to_date(&from));
        }

        let outcome = self.migrations.migrate_to_current(envelope.settings);
        if outcome.result.success {
            let settings: AppSettings = serde_json::from_value(outcome.tree)?;
            self.write_settings(&settings).await?;
            info!(from = %from, to = CURRENT_SCHEMA_VERSION, "Stored settings migrated");
        }
        Ok(outcome.result)
    }

    async fn get_current_settings_version(&self) -> SettingsResult<String> {
        let envelope = self.read_envelope().await?;
        Ok(MigrationEngine::detect_version(&envelope.settings))
    }

    async fn encrypt_sensitive_settings(&self) -> SettingsResult<()> {
        let vault = self.vault()?.clone();
        let _guard = self.write_lock.lock().await;

        let current = self.get_settings().await?;
        let sensitive = SensitivePrivacy {
            biometric_auth_enabled: current.privacy.biometric_auth_enabled,
            passcode_required: current.privacy.passcode_required,
        };
        let sealed = vault.seal(&serde_json::to_vec(&sensitive)?).await?;
        self.set_value_locked(SEALED_PRIVACY_KEY, SettingValue::Blob(sealed))
            .await?;

        let mut settings = current.clone();
        settings.privacy = settings.privacy.redacted();
        if let Err(e) = self
            .commit_tree_locked(&current, &settings, ChangeSource::System)
            .await
        {
            self.remove_value_locked(SEALED_PRIVACY_KEY).await?;
            return Err(e);
        }
        info!("Sensitive settings sealed");
        Ok(())
    }

    async fn decrypt_sensitive_settings(&self) -> SettingsResult<()> {
        let vault = self.vault()?.clone();
        let _guard = self.write_lock.lock().await;

        let sealed = match self.read_values().await?.remove(SEALED_PRIVACY_KEY) {
            Some(SettingValue::Blob(bytes)) => bytes,
            Some(other) => {
                return Err(SettingsError::Serialization(format!(
                    "sealed settings stored as {}",
                    other.kind()
                )))
            }
            None => return Err(SettingsError::not_found(SEALED_PRIVACY_KEY)),
        };
        let sensitive: SensitivePrivacy = serde_json::from_slice(&vault.open(&sealed).await?)?;

        let current = self.get_settings().await?;
        let mut settings = current.clone();
        settings.privacy.biometric_auth_enabled = sensitive.biometric_auth_enabled;
        settings.privacy.passcode_required = sensitive.passcode_required;
        self.commit_tree_locked(&current, &settings, ChangeSource::System)
            .await?;
        self.remove_value_locked(SEALED_PRIVACY_KEY).await?;
        info!("Sensitive settings unsealed");
        Ok(())
    }

    async fn rotate_sensitive_settings_key(&self) -> SettingsResult<()> {
        let vault = self.vault()?.clone();
        let _guard = self.write_lock.lock().await;

        let sealed = self.read_values().await?.remove(SEALED_PRIVACY_KEY);
        let plaintext = match &sealed {
            Some(SettingValue::Blob(bytes)) => Some(vault.open(bytes).await?),
            _ => None,
        };

        vault.rotate_key().await?;

        if let Some(plaintext) = plaintext {
            let resealed = vault.seal(&plaintext).await?;
            self.set_value_locked(SEALED_PRIVACY_KEY, SettingValue::Blob(resealed))
                .await?;
        }
        info!("Sensitive settings key rotated");
        Ok(())
    }

    async fn validate_settings_integrity(&self) -> SettingsResult<bool> {
        let envelope = self.read_envelope().await?;
        let intact = envelope.is_intact()?;
        if !intact {
            warn!("Settings integrity check failed");
        }
        Ok(intact)
    }
}
