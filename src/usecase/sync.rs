//! Remote synchronization pass-throughs

use tracing::{info, warn};

use super::SettingsUseCases;
use crate::analytics::{names, AnalyticsEvent};
use crate::core::SettingsResult;
use crate::model::{ConflictResolution, SyncStatus};

impl SettingsUseCases {
    /// Run one sync through the repository and return its status verbatim.
    ///
    /// Safe to call again after a failure or a success; the repository is
    /// responsible for not applying the same local change twice.
    pub async fn sync_settings(&self, force_sync: bool) -> SettingsResult<SyncStatus> {
        self.emit(AnalyticsEvent::new(names::SETTINGS_SYNC_STARTED).with("forced", force_sync));

        let result = if force_sync {
            self.repository.force_sync_settings().await
        } else {
            self.repository.sync_settings().await
        };

        match result {
            Ok(status) => {
                info!(forced = force_sync, status = %status, "Settings sync finished");
                self.emit(
                    AnalyticsEvent::new(names::SETTINGS_SYNC_COMPLETED)
                        .with("forced", force_sync)
                        .with("status", status),
                );
                Ok(status)
            }
            Err(e) => {
                warn!(forced = force_sync, error = %e, "Settings sync failed");
                self.emit(
                    AnalyticsEvent::new(names::SETTINGS_SYNC_FAILED)
                        .with("forced", force_sync)
                        .with("error", e.code()),
                );
                Err(e)
            }
        }
    }

    pub async fn get_sync_status(&self) -> SettingsResult<SyncStatus> {
        self.repository.get_sync_status().await
    }

    pub async fn resolve_sync_conflicts(&self, resolution: ConflictResolution) -> SettingsResult<()> {
        self.repository.resolve_sync_conflicts(resolution).await?;
        info!("Sync conflict resolved");
        Ok(())
    }
}
