//! Tests for the settings repository

use super::*;
use crate::core::utils::fingerprint;
use crate::core::EngineConfig;
use crate::model::{ChangeSource, Theme, CURRENT_SCHEMA_VERSION};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a test repository with temporary directory
async fn create_test_repo() -> (FileSettingsRepository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::with_data_dir(temp_dir.path())
        .with_max_backups(2)
        .with_app_version("3.1.0")
        .with_device_name("test-device");
    let repo = FileSettingsRepository::new(config).await.unwrap();
    (repo, temp_dir)
}

/// In-memory remote store counting pushes
#[derive(Default)]
struct MemoryTransport {
    remote: Mutex<Option<(AppSettings, String)>>,
    pushes: AtomicUsize,
}

impl MemoryTransport {
    fn set_remote(&self, settings: AppSettings) {
        let fp = fingerprint(&settings).unwrap();
        *self.remote.lock() = Some((settings, fp));
    }
}

#[async_trait]
impl SyncTransport for MemoryTransport {
    async fn push(&self, settings: &AppSettings, fingerprint: &str) -> SettingsResult<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        *self.remote.lock() = Some((settings.clone(), fingerprint.to_string()));
        Ok(())
    }

    async fn fetch(&self) -> SettingsResult<Option<(AppSettings, String)>> {
        Ok(self.remote.lock().clone())
    }
}

/// Vault that xors with a rotating key byte
struct XorVault {
    key: Mutex<u8>,
}

#[async_trait]
impl SettingsVault for XorVault {
    async fn seal(&self, plaintext: &[u8]) -> SettingsResult<Vec<u8>> {
        let key = *self.key.lock();
        Ok(plaintext.iter().map(|b| b ^ key).collect())
    }

    async fn open(&self, sealed: &[u8]) -> SettingsResult<Vec<u8>> {
        let key = *self.key.lock();
        Ok(sealed.iter().map(|b| b ^ key).collect())
    }

    async fn rotate_key(&self) -> SettingsResult<()> {
        let mut key = self.key.lock();
        *key = key.wrapping_add(31);
        Ok(())
    }
}

#[tokio::test]
async fn test_creates_default_tree() {
    let (repo, temp) = create_test_repo().await;

    assert!(temp.path().join("settings.json").exists());
    assert!(temp.path().join("backups").is_dir());

    let settings = repo.get_settings().await.unwrap();
    assert_eq!(settings.version, CURRENT_SCHEMA_VERSION);
    assert!(repo.validate_settings_integrity().await.unwrap());
    assert!(!repo.needs_migration().await.unwrap());
}

#[tokio::test]
async fn test_save_persists_across_instances() {
    let (repo, temp) = create_test_repo().await;

    let mut settings = repo.get_settings().await.unwrap();
    settings.display.theme = Theme::Dark;
    repo.save_settings(&settings).await.unwrap();

    let reopened = FileSettingsRepository::new(EngineConfig::with_data_dir(temp.path()))
        .await
        .unwrap();
    assert_eq!(reopened.get_settings().await.unwrap(), settings);
}

#[tokio::test]
async fn test_section_operations() {
    let (repo, _temp) = create_test_repo().await;

    let mut display = crate::model::DisplaySettings::default();
    display.font_size = 24.0;
    repo.save_section(SectionValue::Display(display.clone()))
        .await
        .unwrap();
    assert_eq!(
        repo.get_section(SettingsSection::Display).await.unwrap(),
        SectionValue::Display(display)
    );

    let reset = repo.reset_section(SettingsSection::Display).await.unwrap();
    assert_eq!(reset.display, crate::model::DisplaySettings::default());
    assert_eq!(repo.get_settings().await.unwrap(), reset);
}

#[tokio::test]
async fn test_reset_settings_restores_defaults() {
    let (repo, _temp) = create_test_repo().await;

    let mut settings = repo.get_settings().await.unwrap();
    settings.general.language = "fr".to_string();
    repo.save_settings(&settings).await.unwrap();

    let reset = repo.reset_settings().await.unwrap();
    assert_eq!(reset.general.language, "en");
    assert_eq!(repo.get_settings().await.unwrap().general.language, "en");
}

#[tokio::test]
async fn test_individual_values() {
    let (repo, _temp) = create_test_repo().await;

    assert_eq!(repo.get_value("display.theme").await.unwrap(), None);
    repo.set_value("display.theme", SettingValue::from("dark"))
        .await
        .unwrap();
    assert_eq!(
        repo.get_value("display.theme").await.unwrap(),
        Some(SettingValue::from("dark"))
    );

    repo.remove_value("display.theme").await.unwrap();
    assert_eq!(repo.get_value("display.theme").await.unwrap(), None);
    // removing a missing key is fine
    repo.remove_value("display.theme").await.unwrap();
}

#[tokio::test]
async fn test_non_finite_value_is_rejected_before_writing() {
    let (repo, _temp) = create_test_repo().await;
    repo.set_value("display.theme", SettingValue::from("dark"))
        .await
        .unwrap();

    let result = repo.set_value("reader.speed", SettingValue::Double(f64::NAN)).await;
    assert!(matches!(result, Err(SettingsError::Serialization(_))));
    let result = repo
        .set_value("reader.speed", SettingValue::Double(f64::INFINITY))
        .await;
    assert!(matches!(result, Err(SettingsError::Serialization(_))));

    // the store is still readable and writable
    assert_eq!(
        repo.get_value("display.theme").await.unwrap(),
        Some(SettingValue::from("dark"))
    );
    assert_eq!(repo.get_value("reader.speed").await.unwrap(), None);
    repo.set_value("display.theme", SettingValue::from("sepia"))
        .await
        .unwrap();

    let event = SettingsChangeEvent::new(
        "reader.speed",
        None,
        SettingValue::Double(f64::NAN),
        ChangeSource::User,
    );
    assert!(matches!(
        repo.track_setting_change(event).await,
        Err(SettingsError::Serialization(_))
    ));
    assert!(repo.get_settings_history(None, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_event_batch_is_all_or_nothing() {
    let (repo, _temp) = create_test_repo().await;
    let mut all = repo.observe_all_setting_changes();

    let display = SettingsChangeEvent::new("display", None, SettingValue::Int(1), ChangeSource::User);
    let broken = SettingsChangeEvent::new(
        "storage",
        None,
        SettingValue::Double(f64::NEG_INFINITY),
        ChangeSource::User,
    );
    let result = repo
        .track_setting_changes(vec![display.clone(), broken])
        .await;
    assert!(matches!(result, Err(SettingsError::Serialization(_))));
    assert!(repo.get_settings_history(None, 10, 0).await.unwrap().is_empty());

    let storage = SettingsChangeEvent::new("storage", None, SettingValue::Int(2), ChangeSource::User);
    repo.track_setting_changes(vec![display.clone(), storage.clone()])
        .await
        .unwrap();
    let history = repo.get_settings_history(None, 10, 0).await.unwrap();
    assert_eq!(history, vec![storage.clone(), display.clone()]);

    // only the accepted batch was broadcast
    assert_eq!(all.next().await.unwrap(), display);
    assert_eq!(all.next().await.unwrap(), storage);
}

#[tokio::test]
async fn test_audit_log_history() {
    let (repo, _temp) = create_test_repo().await;

    for i in 0..5_i64 {
        let key = if i % 2 == 0 { "display" } else { "bible" };
        let event = SettingsChangeEvent::new(key, None, SettingValue::Int(i), ChangeSource::User);
        repo.track_setting_change(event).await.unwrap();
    }

    let all = repo.get_settings_history(None, 10, 0).await.unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].new_value, SettingValue::Int(4));
    assert_eq!(all[4].new_value, SettingValue::Int(0));

    let display = repo.get_settings_history(Some("display"), 10, 0).await.unwrap();
    assert_eq!(display.len(), 3);
    assert!(display.iter().all(|e| e.setting_key == "display"));

    let page = repo.get_settings_history(None, 2, 1).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].new_value, SettingValue::Int(3));

    let since = all[1].timestamp;
    let changes = repo.get_setting_changes(since).await.unwrap();
    assert!(changes.len() >= 2);
    assert!(changes.iter().all(|e| e.timestamp >= since));
}

#[tokio::test]
async fn test_observation_streams() {
    let (repo, _temp) = create_test_repo().await;

    let mut all = repo.observe_all_setting_changes();
    let mut display = repo.observe_setting_changes("display");

    let bible = SettingsChangeEvent::new("bible", None, SettingValue::Bool(true), ChangeSource::User);
    let shown = SettingsChangeEvent::new("display", None, SettingValue::Bool(false), ChangeSource::User);
    repo.track_setting_change(bible.clone()).await.unwrap();
    repo.track_setting_change(shown.clone()).await.unwrap();

    assert_eq!(all.next().await.unwrap(), bible);
    assert_eq!(all.next().await.unwrap(), shown);
    assert_eq!(display.next().await.unwrap(), shown);

    // dropping one subscription leaves the others working
    drop(display);
    let again = SettingsChangeEvent::new("display", None, SettingValue::Int(1), ChangeSource::Sync);
    repo.track_setting_change(again.clone()).await.unwrap();
    assert_eq!(all.next().await.unwrap(), again);
}

#[tokio::test]
async fn test_backups_and_retention() {
    let (repo, _temp) = create_test_repo().await;

    let manual = repo
        .create_backup(Some("before trip".to_string()), false)
        .await
        .unwrap();
    for _ in 0..3 {
        repo.create_backup(None, true).await.unwrap();
    }

    let backups = repo.get_backups().await.unwrap();
    assert_eq!(backups.iter().filter(|b| b.is_automatic).count(), 2);
    assert!(backups.iter().any(|b| b.id == manual.id));
    assert_eq!(manual.app_version, "3.1.0");
    assert_eq!(manual.device_info.device_name, "test-device");

    let fetched = repo.get_backup(manual.id).await.unwrap().unwrap();
    assert_eq!(fetched, manual);

    repo.delete_backup(manual.id).await.unwrap();
    assert!(repo.get_backup(manual.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete_backup(manual.id).await,
        Err(SettingsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_restore_from_backup() {
    let (repo, _temp) = create_test_repo().await;

    let backup = repo.create_backup(None, false).await.unwrap();
    let mut settings = repo.get_settings().await.unwrap();
    settings.bible.default_translation = "KJV".to_string();
    repo.save_settings(&settings).await.unwrap();

    let restored = repo.restore_from_backup(backup.id).await.unwrap();
    assert_eq!(restored.bible.default_translation, "ESV");
    assert_eq!(repo.get_settings().await.unwrap(), backup.settings);

    let missing = repo.restore_from_backup(Uuid::now_v7()).await;
    assert!(matches!(missing, Err(SettingsError::NotFound { .. })));
}

#[tokio::test]
async fn test_export_and_validate_import() {
    let (repo, _temp) = create_test_repo().await;

    let export = repo.export_settings().await.unwrap();
    assert_eq!(export.app_version, "3.1.0");

    let validation = repo.validate_import(&export).await.unwrap();
    assert!(validation.is_valid);
    assert!(validation.warnings.is_empty());

    let mut foreign = export.clone();
    foreign.app_version = "2.0.0".to_string();
    foreign.settings.display.font_size = 1.0;
    let validation = repo.validate_import(&foreign).await.unwrap();
    assert!(!validation.is_valid);
    assert_eq!(validation.warnings.len(), 1);

    let mut imported = export.clone();
    imported.settings.general.region = "DE".to_string();
    repo.import_settings(&imported).await.unwrap();
    assert_eq!(repo.get_settings().await.unwrap().general.region, "DE");
}

#[tokio::test]
async fn test_cache_tracks_external_edits() {
    let (repo, temp) = create_test_repo().await;
    repo.preload_settings().await.unwrap();

    let other = FileSettingsRepository::new(EngineConfig::with_data_dir(temp.path()))
        .await
        .unwrap();
    let mut settings = other.get_settings().await.unwrap();
    settings.general.region = "CA".to_string();
    other.save_settings(&settings).await.unwrap();

    // stale until refreshed
    assert_eq!(repo.get_settings().await.unwrap().general.region, "US");
    repo.refresh_settings_cache().await.unwrap();
    assert_eq!(repo.get_settings().await.unwrap().general.region, "CA");

    repo.clear_settings_cache().await.unwrap();
    assert_eq!(repo.get_settings().await.unwrap().general.region, "CA");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cache_fill_never_replaces_a_newer_write() {
    let (repo, _temp) = create_test_repo().await;
    let repo = Arc::new(repo);

    for round in 0..25_u32 {
        repo.clear_settings_cache().await.unwrap();
        let mut next = repo.default_settings();
        next.general.region = format!("R{}", round);

        let reader = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.get_settings().await })
        };
        let writer = {
            let repo = repo.clone();
            let next = next.clone();
            tokio::spawn(async move { repo.save_settings(&next).await })
        };
        reader.await.unwrap().unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(repo.get_settings().await.unwrap().general.region, next.general.region);
    }
}

#[tokio::test]
async fn test_integrity_detects_tampering() {
    let (repo, temp) = create_test_repo().await;
    let path = temp.path().join("settings.json");

    let content = std::fs::read_to_string(&path).unwrap();
    let mut envelope: serde_json::Value = serde_json::from_str(&content).unwrap();
    envelope["settings"]["general"]["language"] = serde_json::json!("xx");
    std::fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();

    assert!(!repo.validate_settings_integrity().await.unwrap());
}

#[tokio::test]
async fn test_migrate_stored_legacy_tree() {
    let (repo, temp) = create_test_repo().await;
    let legacy = serde_json::json!({
        "version": "1.0.0",
        "privacy": { "dataCollectionLevel": "full" },
        "storage": { "cacheSizeMB": 64 }
    });
    let checksum = crate::core::utils::hash_content(&serde_json::to_vec(&legacy).unwrap());
    let envelope = serde_json::json!({ "checksum": checksum, "settings": legacy });
    std::fs::write(temp.path().join("settings.json"), envelope.to_string()).unwrap();
    repo.clear_settings_cache().await.unwrap();

    assert_eq!(repo.get_current_settings_version().await.unwrap(), "1.0.0");
    assert!(repo.needs_migration().await.unwrap());

    let result = repo.migrate_settings().await.unwrap();
    assert!(result.success);
    assert_eq!(result.to_version, CURRENT_SCHEMA_VERSION);

    let settings = repo.get_settings().await.unwrap();
    assert_eq!(settings.storage.cache_size_bytes, 64 * 1024 * 1024);
    assert!(settings.analytics.personalized_recommendations);
    assert_eq!(repo.get_current_settings_version().await.unwrap(), CURRENT_SCHEMA_VERSION);

    let again = repo.migrate_settings().await.unwrap();
    assert!(again.success);
    assert_eq!(again.from_version, again.to_version);
}

#[tokio::test]
async fn test_sync_without_transport_is_unsupported() {
    let (repo, _temp) = create_test_repo().await;
    assert!(matches!(
        repo.sync_settings().await,
        Err(SettingsError::Unsupported(_))
    ));
    assert_eq!(repo.get_sync_status().await.unwrap(), SyncStatus::Idle);
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let (repo, _temp) = create_test_repo().await;
    let transport = Arc::new(MemoryTransport::default());
    let repo = repo.with_sync_transport(transport.clone());

    assert_eq!(repo.sync_settings().await.unwrap(), SyncStatus::Success);
    assert_eq!(transport.pushes.load(Ordering::SeqCst), 1);

    // nothing changed: no second push
    assert_eq!(repo.sync_settings().await.unwrap(), SyncStatus::Success);
    assert_eq!(repo.sync_settings().await.unwrap(), SyncStatus::Success);
    assert_eq!(transport.pushes.load(Ordering::SeqCst), 1);

    // forced sync always pushes
    assert_eq!(repo.force_sync_settings().await.unwrap(), SyncStatus::Success);
    assert_eq!(transport.pushes.load(Ordering::SeqCst), 2);
    assert_eq!(repo.get_sync_status().await.unwrap(), SyncStatus::Success);
}

#[tokio::test]
async fn test_sync_pulls_remote_when_local_unchanged() {
    let (repo, _temp) = create_test_repo().await;
    let transport = Arc::new(MemoryTransport::default());
    let repo = repo.with_sync_transport(transport.clone());
    repo.sync_settings().await.unwrap();

    let mut remote = repo.get_settings().await.unwrap();
    remote.display.theme = Theme::Sepia;
    remote.touch();
    transport.set_remote(remote.clone());

    let mut observed = repo.observe_setting_changes("display");
    assert_eq!(repo.sync_settings().await.unwrap(), SyncStatus::Success);
    assert_eq!(repo.get_settings().await.unwrap(), remote);
    assert_eq!(transport.pushes.load(Ordering::SeqCst), 1);

    let events = repo.get_settings_history(None, 10, 0).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].setting_key, "display");
    assert_eq!(events[0].source, ChangeSource::Sync);
    let adopted: crate::model::DisplaySettings = events[0].new_value.decode().unwrap();
    assert_eq!(adopted.theme, Theme::Sepia);
    assert_eq!(observed.next().await.unwrap(), events[0]);
}

#[tokio::test]
async fn test_sync_rejects_invalid_remote_tree() {
    let (repo, _temp) = create_test_repo().await;
    let transport = Arc::new(MemoryTransport::default());
    let repo = repo.with_sync_transport(transport.clone());
    repo.sync_settings().await.unwrap();
    let before = repo.get_settings().await.unwrap();

    let mut remote = before.clone();
    remote.display.font_size = 99.0;
    transport.set_remote(remote);

    assert!(matches!(
        repo.sync_settings().await,
        Err(SettingsError::ValidationFailed(_))
    ));
    assert_eq!(repo.get_sync_status().await.unwrap(), SyncStatus::Error);
    assert_eq!(repo.get_settings().await.unwrap(), before);
    assert!(repo.get_settings_history(None, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_conflict_parks_remote_until_resolved() {
    let (repo, _temp) = create_test_repo().await;
    let transport = Arc::new(MemoryTransport::default());
    let repo = repo.with_sync_transport(transport.clone());
    repo.sync_settings().await.unwrap();

    let mut local = repo.get_settings().await.unwrap();
    local.display.theme = Theme::Dark;
    local.touch();
    repo.save_settings(&local).await.unwrap();

    let mut remote = local.clone();
    remote.display.theme = Theme::Light;
    remote.general.region = "AU".to_string();
    transport.set_remote(remote.clone());

    assert_eq!(repo.sync_settings().await.unwrap(), SyncStatus::Conflict);
    assert_eq!(repo.get_sync_status().await.unwrap(), SyncStatus::Conflict);
    assert_eq!(repo.get_settings().await.unwrap(), local);

    repo.resolve_sync_conflicts(ConflictResolution::UseImported)
        .await
        .unwrap();
    assert_eq!(repo.get_settings().await.unwrap(), remote);
    assert_eq!(repo.get_sync_status().await.unwrap(), SyncStatus::Success);

    let events = repo.get_settings_history(None, 10, 0).await.unwrap();
    let mut keys: Vec<_> = events.iter().map(|e| e.setting_key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["display", "general"]);
    assert!(events.iter().all(|e| e.source == ChangeSource::Sync));

    // nothing left to resolve
    assert!(matches!(
        repo.resolve_sync_conflicts(ConflictResolution::UseLocal).await,
        Err(SettingsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_invalid_custom_resolution_keeps_conflict_open() {
    let (repo, _temp) = create_test_repo().await;
    let transport = Arc::new(MemoryTransport::default());
    let repo = repo.with_sync_transport(transport.clone());
    repo.sync_settings().await.unwrap();

    let mut local = repo.get_settings().await.unwrap();
    local.display.theme = Theme::Dark;
    repo.save_settings(&local).await.unwrap();
    let mut remote = local.clone();
    remote.general.region = "NZ".to_string();
    remote.display.theme = Theme::Light;
    transport.set_remote(remote);
    assert_eq!(repo.sync_settings().await.unwrap(), SyncStatus::Conflict);

    let mut custom = local.clone();
    custom.display.font_size = 99.0;
    let result = repo
        .resolve_sync_conflicts(ConflictResolution::Custom(SettingValue::encode(&custom).unwrap()))
        .await;
    assert!(matches!(result, Err(SettingsError::ValidationFailed(_))));
    assert_eq!(repo.get_settings().await.unwrap(), local);
    assert!(repo.get_settings_history(None, 10, 0).await.unwrap().is_empty());

    repo.resolve_sync_conflicts(ConflictResolution::UseLocal)
        .await
        .unwrap();
    assert_eq!(repo.get_sync_status().await.unwrap(), SyncStatus::Success);
}

#[tokio::test]
async fn test_sensitive_fields_seal_and_unseal() {
    let (repo, _temp) = create_test_repo().await;
    assert!(matches!(
        repo.encrypt_sensitive_settings().await,
        Err(SettingsError::Unsupported(_))
    ));

    let repo = repo.with_vault(Arc::new(XorVault { key: Mutex::new(0x5a) }));
    let mut settings = repo.get_settings().await.unwrap();
    settings.privacy.biometric_auth_enabled = true;
    settings.privacy.passcode_required = true;
    repo.save_settings(&settings).await.unwrap();

    let mut privacy = repo.observe_setting_changes("privacy");
    repo.encrypt_sensitive_settings().await.unwrap();
    let sealing = privacy.next().await.unwrap();
    assert_eq!(sealing.source, ChangeSource::System);
    let sealed = repo.get_settings().await.unwrap();
    assert!(!sealed.privacy.biometric_auth_enabled);
    assert!(!sealed.privacy.passcode_required);
    assert!(matches!(
        repo.get_value(SEALED_PRIVACY_KEY).await.unwrap(),
        Some(SettingValue::Blob(_))
    ));

    repo.rotate_sensitive_settings_key().await.unwrap();
    repo.decrypt_sensitive_settings().await.unwrap();

    let unsealed = repo.get_settings().await.unwrap();
    assert!(unsealed.privacy.biometric_auth_enabled);
    assert!(unsealed.privacy.passcode_required);
    assert_eq!(repo.get_value(SEALED_PRIVACY_KEY).await.unwrap(), None);

    let history = repo.get_settings_history(Some("privacy"), 10, 0).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.source == ChangeSource::System));
}
