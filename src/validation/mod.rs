//! Validation Engine
//!
//! Pure validators for each section and for the whole tree. Validators never
//! fail: they return a (possibly empty) list of [`ValidationError`]s and the
//! caller decides to reject the mutation when the list is non-empty.

mod rules;


pub use rules::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::model::{AppSettings, SettingValue, SettingsSection, SettingsValidationType};

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Dotted path, e.g. `storage.cacheSizeBytes`
    pub field: String,
    pub reason: String,
    pub suggested_value: Option<SettingValue>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
            suggested_value: None,
        }
    }

    pub fn with_suggestion(mut self, value: impl Into<SettingValue>) -> Self {
        self.suggested_value = Some(value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Rule spanning more than one section
pub type CrossSectionRule = Arc<dyn Fn(&AppSettings) -> Vec<ValidationError> + Send + Sync>;

/// Whole-tree and per-section validator
#[derive(Clone, Default)]
pub struct SettingsValidator {
    cross_section_rules: Vec<CrossSectionRule>,
}

impl fmt::Debug for SettingsValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsValidator")
            .field("cross_section_rules", &self.cross_section_rules.len())
            .finish()
    }
}

impl SettingsValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule evaluated after the per-section validators
    pub fn with_cross_section_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&AppSettings) -> Vec<ValidationError> + Send + Sync + 'static,
    {
        self.cross_section_rules.push(Arc::new(rule));
        self
    }

    /// Validate the whole tree: every section plus cross-section rules
    pub fn validate(&self, settings: &AppSettings) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = SettingsSection::ALL
            .into_iter()
            .flat_map(|section| self.validate_section(settings, section))
            .collect();

        for rule in &self.cross_section_rules {
            errors.extend(rule(settings));
        }

        errors
    }

    /// Dispatch on a validation selector
    pub fn validate_type(
        &self,
        settings: &AppSettings,
        validation_type: SettingsValidationType,
    ) -> Vec<ValidationError> {
        match validation_type {
            SettingsValidationType::All => self.validate(settings),
            SettingsValidationType::Section(section) => self.validate_section(settings, section),
        }
    }

    /// Validate one section of a tree
    pub fn validate_section(
        &self,
        settings: &AppSettings,
        section: SettingsSection,
    ) -> Vec<ValidationError> {
        match section {
            SettingsSection::General => validate_general(&settings.general),
            SettingsSection::Bible => validate_bible(&settings.bible),
            SettingsSection::Privacy => validate_privacy(&settings.privacy),
            SettingsSection::Sync => validate_sync(&settings.sync),
            SettingsSection::Accessibility => validate_accessibility(&settings.accessibility),
            SettingsSection::Notifications => validate_notifications(&settings.notifications),
            SettingsSection::Display => validate_display(&settings.display),
            SettingsSection::Storage => validate_storage(&settings.storage),
            SettingsSection::Analytics => validate_analytics(&settings.analytics),
        }
    }
}

/// Convenience: is the tree acceptable as a whole
pub fn is_valid(settings: &AppSettings) -> bool {
    SettingsValidator::default().validate(settings).is_empty()
}
