//! The configuration tree

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sections::{
    AccessibilitySettings, AnalyticsSettings, BibleSettings, DisplaySettings, GeneralSettings,
    NotificationSettings, PrivacySettings, StorageSettings, SyncSettings,
};
use super::value::SettingValue;
use crate::core::error::{SettingsError, SettingsResult};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: &str = "2.0.0";

/// Key of one independently addressable section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingsSection {
    General,
    Bible,
    Privacy,
    Sync,
    Accessibility,
    Notifications,
    Display,
    Storage,
    Analytics,
}

impl SettingsSection {
    /// Every section, in tree order
    pub const ALL: [SettingsSection; 9] = [
        SettingsSection::General,
        SettingsSection::Bible,
        SettingsSection::Privacy,
        SettingsSection::Sync,
        SettingsSection::Accessibility,
        SettingsSection::Notifications,
        SettingsSection::Display,
        SettingsSection::Storage,
        SettingsSection::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsSection::General => "general",
            SettingsSection::Bible => "bible",
            SettingsSection::Privacy => "privacy",
            SettingsSection::Sync => "sync",
            SettingsSection::Accessibility => "accessibility",
            SettingsSection::Notifications => "notifications",
            SettingsSection::Display => "display",
            SettingsSection::Storage => "storage",
            SettingsSection::Analytics => "analytics",
        }
    }
}

impl std::fmt::Display for SettingsSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettingsSection {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingsSection::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| SettingsError::not_found(format!("settings section '{}'", s)))
    }
}

/// The value of a single section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", content = "value", rename_all = "camelCase")]
pub enum SectionValue {
    General(GeneralSettings),
    Bible(BibleSettings),
    Privacy(PrivacySettings),
    Sync(SyncSettings),
    Accessibility(AccessibilitySettings),
    Notifications(NotificationSettings),
    Display(DisplaySettings),
    Storage(StorageSettings),
    Analytics(AnalyticsSettings),
}

impl SectionValue {
    pub fn section(&self) -> SettingsSection {
        match self {
            SectionValue::General(_) => SettingsSection::General,
            SectionValue::Bible(_) => SettingsSection::Bible,
            SectionValue::Privacy(_) => SettingsSection::Privacy,
            SectionValue::Sync(_) => SettingsSection::Sync,
            SectionValue::Accessibility(_) => SettingsSection::Accessibility,
            SectionValue::Notifications(_) => SettingsSection::Notifications,
            SectionValue::Display(_) => SettingsSection::Display,
            SectionValue::Storage(_) => SettingsSection::Storage,
            SectionValue::Analytics(_) => SettingsSection::Analytics,
        }
    }

    /// Encode the bare section (without the tag) as an opaque blob
    pub fn encode(&self) -> SettingsResult<SettingValue> {
        match self {
            SectionValue::General(v) => SettingValue::encode(v),
            SectionValue::Bible(v) => SettingValue::encode(v),
            SectionValue::Privacy(v) => SettingValue::encode(v),
            SectionValue::Sync(v) => SettingValue::encode(v),
            SectionValue::Accessibility(v) => SettingValue::encode(v),
            SectionValue::Notifications(v) => SettingValue::encode(v),
            SectionValue::Display(v) => SettingValue::encode(v),
            SectionValue::Storage(v) => SettingValue::encode(v),
            SectionValue::Analytics(v) => SettingValue::encode(v),
        }
    }
}

/// Versioned, fully populated configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub general: GeneralSettings,
    pub bible: BibleSettings,
    pub privacy: PrivacySettings,
    pub sync: SyncSettings,
    pub accessibility: AccessibilitySettings,
    pub notifications: NotificationSettings,
    pub display: DisplaySettings,
    pub storage: StorageSettings,
    pub analytics: AnalyticsSettings,
    pub last_modified: DateTime<Utc>,
    /// Schema version (semantic version string)
    pub version: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            bible: BibleSettings::default(),
            privacy: PrivacySettings::default(),
            sync: SyncSettings::default(),
            accessibility: AccessibilitySettings::default(),
            notifications: NotificationSettings::default(),
            display: DisplaySettings::default(),
            storage: StorageSettings::default(),
            analytics: AnalyticsSettings::default(),
            last_modified: Utc::now(),
            version: CURRENT_SCHEMA_VERSION.to_string(),
        }
    }
}

impl AppSettings {
    /// Clone out one section
    pub fn section(&self, section: SettingsSection) -> SectionValue {
        match section {
            SettingsSection::General => SectionValue::General(self.general.clone()),
            SettingsSection::Bible => SectionValue::Bible(self.bible.clone()),
            SettingsSection::Privacy => SectionValue::Privacy(self.privacy.clone()),
            SettingsSection::Sync => SectionValue::Sync(self.sync.clone()),
            SettingsSection::Accessibility => {
                SectionValue::Accessibility(self.accessibility.clone())
            }
            SettingsSection::Notifications => {
                SectionValue::Notifications(self.notifications.clone())
            }
            SettingsSection::Display => SectionValue::Display(self.display.clone()),
            SettingsSection::Storage => SectionValue::Storage(self.storage.clone()),
            SettingsSection::Analytics => SectionValue::Analytics(self.analytics.clone()),
        }
    }

    /// Replace one section; `last_modified` and `version` are left alone
    pub fn set_section(&mut self, value: SectionValue) {
        match value {
            SectionValue::General(v) => self.general = v,
            SectionValue::Bible(v) => self.bible = v,
            SectionValue::Privacy(v) => self.privacy = v,
            SectionValue::Sync(v) => self.sync = v,
            SectionValue::Accessibility(v) => self.accessibility = v,
            SectionValue::Notifications(v) => self.notifications = v,
            SectionValue::Display(v) => self.display = v,
            SectionValue::Storage(v) => self.storage = v,
            SectionValue::Analytics(v) => self.analytics = v,
        }
    }

    /// Copy of `self` with `section` taken from `other`
    pub fn with_section_from(&self, section: SettingsSection, other: &AppSettings) -> Self {
        let mut next = self.clone();
        next.set_section(other.section(section));
        next
    }

    /// Structural equality of a single section
    pub fn section_eq(&self, other: &AppSettings, section: SettingsSection) -> bool {
        match section {
            SettingsSection::General => self.general == other.general,
            SettingsSection::Bible => self.bible == other.bible,
            SettingsSection::Privacy => self.privacy == other.privacy,
            SettingsSection::Sync => self.sync == other.sync,
            SettingsSection::Accessibility => self.accessibility == other.accessibility,
            SettingsSection::Notifications => self.notifications == other.notifications,
            SettingsSection::Display => self.display == other.display,
            SettingsSection::Storage => self.storage == other.storage,
            SettingsSection::Analytics => self.analytics == other.analytics,
        }
    }

    /// Sections whose values differ, in tree order
    pub fn differing_sections(&self, other: &AppSettings) -> Vec<SettingsSection> {
        SettingsSection::ALL
            .into_iter()
            .filter(|section| !self.section_eq(other, *section))
            .collect()
    }

    /// Section-wise equality, ignoring `last_modified`
    pub fn same_content(&self, other: &AppSettings) -> bool {
        self.version == other.version && self.differing_sections(other).is_empty()
    }

    /// Bump `last_modified` to now
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}
