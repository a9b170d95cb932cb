//! Resetting to defaults

use tracing::{info, warn};

use super::SettingsUseCases;
use crate::analytics::{names, AnalyticsEvent};
use crate::core::SettingsResult;
use crate::model::{keys, AppSettings, ChangeSource, SettingValue, SettingsChangeEvent, SettingsResetType};

impl SettingsUseCases {
    /// Reset the whole tree or one section to defaults and return the result.
    ///
    /// `Specific(keys)` leaves the tree untouched and records nothing.
    pub async fn reset_settings(&self, reset_type: SettingsResetType) -> SettingsResult<AppSettings> {
        let previous = self.repository.get_settings().await?;

        let (label, reset) = match &reset_type {
            SettingsResetType::All => ("all", self.repository.reset_settings().await?),
            SettingsResetType::Section(section) => {
                (section.as_str(), self.repository.reset_section(*section).await?)
            }
            SettingsResetType::Specific(requested) => {
                warn!(?requested, "Resetting specific keys is not supported, settings unchanged");
                self.emit(
                    AnalyticsEvent::new(names::SETTINGS_RESET)
                        .with("type", "specific")
                        .with("applied", false),
                );
                return Ok(previous);
            }
        };

        let recorded = match reset_event(&previous, &reset) {
            Ok(event) => self.tracker.record(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            self.compensate(&previous, &e).await;
            return Err(e);
        }

        info!(scope = label, "Settings reset");
        self.emit(
            AnalyticsEvent::new(names::SETTINGS_RESET)
                .with("type", label)
                .with("applied", true),
        );

        Ok(reset)
    }
}

/// Workflow event carrying both whole trees
fn reset_event(previous: &AppSettings, reset: &AppSettings) -> SettingsResult<SettingsChangeEvent> {
    Ok(SettingsChangeEvent::new(
        keys::SETTINGS_RESET,
        Some(SettingValue::encode(previous)?),
        SettingValue::encode(reset)?,
        ChangeSource::Reset,
    ))
}
