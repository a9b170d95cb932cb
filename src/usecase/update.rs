//! Tree and individual-key updates

use tracing::{info, warn};

use super::SettingsUseCases;
use crate::analytics::{names, AnalyticsEvent};
use crate::audit;
use crate::core::SettingsResult;
use crate::model::{AppSettings, ChangeSource, SettingValue, SettingsChangeEvent, SettingsSection};

impl SettingsUseCases {
    /// Validate and persist a whole tree, recording one event per changed
    /// section.
    ///
    /// The previous tree is fetched best-effort: when it cannot be read the
    /// write still happens but no events are recorded. `updated_sections`
    /// only labels the analytics report; the audit always covers every
    /// section that differs.
    pub async fn update_app_settings(
        &self,
        settings: AppSettings,
        updated_sections: Option<&[SettingsSection]>,
    ) -> SettingsResult<AppSettings> {
        self.ensure_valid("update_app_settings", &settings)?;

        let previous = match self.repository.get_settings().await {
            Ok(previous) => Some(previous),
            Err(e) => {
                warn!(error = %e, "Previous settings unavailable, skipping diff");
                None
            }
        };

        self.repository.save_settings(&settings).await?;

        let mut changed = Vec::new();
        if let Some(previous) = &previous {
            changed = previous.differing_sections(&settings);
            let recorded = match audit::diff(previous, &settings, ChangeSource::User) {
                Ok(events) => self.tracker.record_all(events).await,
                Err(e) => Err(e),
            };
            if let Err(e) = recorded {
                self.compensate(previous, &e).await;
                return Err(e);
            }
        }

        let labelled = updated_sections.map(<[SettingsSection]>::to_vec).unwrap_or(changed);
        info!(sections = labelled.len(), "Settings updated");
        self.emit(
            AnalyticsEvent::new(names::SETTINGS_UPDATED)
                .with("sections", join_sections(&labelled))
                .with("diffed", previous.is_some()),
        );

        Ok(settings)
    }

    /// Set one individual key and record the change. The value is not
    /// validated against the tree, but it must be storable as JSON.
    pub async fn update_individual_setting(
        &self,
        key: &str,
        value: SettingValue,
        source: ChangeSource,
    ) -> SettingsResult<()> {
        value.ensure_encodable()?;

        let old = match self.repository.get_value(key).await {
            Ok(old) => old,
            Err(e) => {
                warn!(key, error = %e, "Previous value unavailable");
                None
            }
        };

        self.repository.set_value(key, value.clone()).await?;

        let event = SettingsChangeEvent::new(key, old.clone(), value.clone(), source);
        if let Err(e) = self.tracker.record(event).await {
            let restored = match old {
                Some(old) => self.repository.set_value(key, old).await,
                None => self.repository.remove_value(key).await,
            };
            if let Err(restore_error) = restored {
                warn!(key, error = %restore_error, "Could not restore previous value");
            }
            return Err(e);
        }

        info!(key, source = %source, "Setting changed");
        self.emit(
            AnalyticsEvent::new(names::SETTING_CHANGED)
                .with("key", key)
                .with("kind", value.kind())
                .with("source", source),
        );

        Ok(())
    }
}

pub(super) fn join_sections(sections: &[SettingsSection]) -> String {
    sections
        .iter()
        .map(SettingsSection::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
