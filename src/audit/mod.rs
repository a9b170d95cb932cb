//! Change Tracker / Audit Log
//!
//! Section-level diffing between two configuration trees and append-only
//! recording of the resulting events through the repository.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::debug;

use crate::core::SettingsResult;
use crate::model::{AppSettings, ChangeSource, SettingsChangeEvent, SettingsSection};
use crate::repository::SettingsRepository;

/// Compute one change event per differing section.
///
/// Sections are compared structurally; the event is keyed by the section name
/// and carries the whole old and new section as encoded blob values. Sections
/// are never merged into one event or split across several.
pub fn diff(
    old: &AppSettings,
    new: &AppSettings,
    source: ChangeSource,
) -> SettingsResult<Vec<SettingsChangeEvent>> {
    old.differing_sections(new)
        .into_iter()
        .map(|section| section_event(old, new, section, source))
        .collect()
}

/// Change event for a single section, whether or not it differs
pub fn section_event(
    old: &AppSettings,
    new: &AppSettings,
    section: SettingsSection,
    source: ChangeSource,
) -> SettingsResult<SettingsChangeEvent> {
    Ok(SettingsChangeEvent::new(
        section.as_str(),
        Some(old.section(section).encode()?),
        new.section(section).encode()?,
        source,
    ))
}

/// Append-only recorder over a repository's audit primitives
#[derive(Clone)]
pub struct ChangeTracker {
    repository: Arc<dyn SettingsRepository>,
}

impl ChangeTracker {
    pub fn new(repository: Arc<dyn SettingsRepository>) -> Self {
        Self { repository }
    }

    /// Append one event. Failures propagate to the caller.
    pub async fn record(&self, event: SettingsChangeEvent) -> SettingsResult<()> {
        event.ensure_encodable()?;
        debug!(
            key = %event.setting_key,
            source = %event.source,
            "Recording settings change"
        );
        self.repository.track_setting_change(event).await
    }

    /// Append several events as one batch: either all of them land in the
    /// log or none do.
    pub async fn record_all(&self, events: Vec<SettingsChangeEvent>) -> SettingsResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        for event in &events {
            event.ensure_encodable()?;
        }

        let count = events.len();
        debug!(count, "Recording settings changes");
        self.repository.track_setting_changes(events).await?;
        Ok(count)
    }

    /// Newest-first history, optionally filtered by key
    pub async fn history(
        &self,
        key: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> SettingsResult<Vec<SettingsChangeEvent>> {
        self.repository
            .get_settings_history(key, limit, offset)
            .await
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker").finish_non_exhaustive()
    }
}
