//! Section value types
//!
//! Each section is an independent value type: scalars, closed enumerations,
//! or nested value types only. Sections never reference each other. Missing
//! fields default-fill on load so older snapshots stay readable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const MB: u64 = 1024 * 1024;

/// General application preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralSettings {
    /// Interface language (BCP 47 tag, e.g. "en" or "pt-BR")
    pub language: String,
    /// Region code used for formatting
    pub region: String,
    pub haptic_feedback: bool,
    pub first_launch_completed: bool,
    /// Alternate app icon name
    pub app_icon: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            region: "US".to_string(),
            haptic_feedback: true,
            first_launch_completed: false,
            app_icon: "default".to_string(),
        }
    }
}

/// Scripture reading preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BibleSettings {
    /// Translation abbreviation (e.g. "ESV")
    pub default_translation: String,
    /// Optional translation shown side by side
    pub parallel_translation: Option<String>,
    pub show_verse_numbers: bool,
    pub show_red_letters: bool,
    /// Highlight palette as `#RRGGBB` strings
    pub highlight_colors: Vec<String>,
    /// Audio Bible playback rate multiplier
    pub audio_playback_speed: f64,
    pub reading_plan: Option<ReadingPlanSettings>,
}

impl Default for BibleSettings {
    fn default() -> Self {
        Self {
            default_translation: "ESV".to_string(),
            parallel_translation: None,
            show_verse_numbers: true,
            show_red_letters: true,
            highlight_colors: vec![
                "#FFEB3B".to_string(),
                "#8BC34A".to_string(),
                "#03A9F4".to_string(),
                "#E91E63".to_string(),
                "#FF9800".to_string(),
            ],
            audio_playback_speed: 1.0,
            reading_plan: None,
        }
    }
}

/// Active reading plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPlanSettings {
    pub plan_id: String,
    pub name: String,
    pub duration_days: u32,
    pub start_date: NaiveDate,
}

/// How much usage data the user agrees to share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DataCollectionLevel {
    None,
    #[default]
    Minimal,
    Standard,
    Full,
}

/// Privacy and security preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacySettings {
    /// Sensitive: unlock with Face ID / Touch ID
    pub biometric_auth_enabled: bool,
    /// Sensitive: require the app passcode on launch
    pub passcode_required: bool,
    /// Seconds in background before locking, 0 locks immediately
    pub auto_lock_timeout_seconds: u32,
    pub data_collection_level: DataCollectionLevel,
    pub share_reading_activity: bool,
    pub crash_reporting_enabled: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            biometric_auth_enabled: false,
            passcode_required: false,
            auto_lock_timeout_seconds: 300,
            data_collection_level: DataCollectionLevel::default(),
            share_reading_activity: false,
            crash_reporting_enabled: true,
        }
    }
}

impl PrivacySettings {
    /// Field names flagged sensitive; excluded from exports on request and
    /// sealed by the vault collaborator.
    pub const SENSITIVE_FIELDS: [&'static str; 2] = ["biometricAuthEnabled", "passcodeRequired"];

    /// Copy with every sensitive field cleared
    pub fn redacted(&self) -> Self {
        Self {
            biometric_auth_enabled: false,
            passcode_required: false,
            ..self.clone()
        }
    }
}

/// Strategy the remote sync backend applies when both sides changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SyncConflictPolicy {
    PreferLocal,
    PreferRemote,
    #[default]
    MostRecent,
}

/// Cross-device synchronization preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncSettings {
    pub enabled: bool,
    pub sync_over_cellular: bool,
    pub sync_interval_minutes: u32,
    pub conflict_policy: SyncConflictPolicy,
    pub sync_notes: bool,
    pub sync_highlights: bool,
    pub sync_bookmarks: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_over_cellular: false,
            sync_interval_minutes: 30,
            conflict_policy: SyncConflictPolicy::default(),
            sync_notes: true,
            sync_highlights: true,
            sync_bookmarks: true,
        }
    }
}

/// Accessibility preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessibilitySettings {
    pub dynamic_type: bool,
    /// Multiplier applied on top of the display font size
    pub font_scale: f64,
    pub reduce_motion: bool,
    pub high_contrast: bool,
    pub bold_text: bool,
    pub voice_over_hints: bool,
}

impl Default for AccessibilitySettings {
    fn default() -> Self {
        Self {
            dynamic_type: true,
            font_scale: 1.0,
            reduce_motion: false,
            high_contrast: false,
            bold_text: false,
            voice_over_hints: true,
        }
    }
}

/// Wall clock time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }
}

/// Window during which no reminders are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// Reminder and notification preferences; scheduling itself is done by the
/// platform scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub daily_verse_enabled: bool,
    pub daily_verse_time: TimeOfDay,
    pub reading_reminders: bool,
    /// ISO weekdays, 1 = Monday through 7 = Sunday
    pub reminder_days: Vec<u8>,
    pub quiet_hours: Option<QuietHours>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_verse_enabled: true,
            daily_verse_time: TimeOfDay::new(8, 0),
            reading_reminders: false,
            reminder_days: vec![1, 2, 3, 4, 5, 6, 7],
            quiet_hours: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
    Sepia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReadingMode {
    #[default]
    Scroll,
    Paged,
}

/// Reader appearance preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettings {
    pub theme: Theme,
    pub font_family: String,
    /// Point size of body text
    pub font_size: f64,
    pub line_spacing: f64,
    pub reading_mode: ReadingMode,
    pub keep_screen_on: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            font_family: "Georgia".to_string(),
            font_size: 18.0,
            line_spacing: 1.4,
            reading_mode: ReadingMode::default(),
            keep_screen_on: false,
        }
    }
}

/// Local storage budget preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageSettings {
    pub cache_size_bytes: u64,
    pub offline_content_size_bytes: u64,
    pub auto_download_audio: bool,
    pub download_over_cellular: bool,
    pub clear_cache_on_low_storage: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            cache_size_bytes: 100 * MB,
            offline_content_size_bytes: 500 * MB,
            auto_download_audio: false,
            download_over_cellular: false,
            clear_cache_on_low_storage: true,
        }
    }
}

/// In-app analytics preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsSettings {
    pub enabled: bool,
    pub usage_statistics: bool,
    pub performance_monitoring: bool,
    pub personalized_recommendations: bool,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            usage_statistics: true,
            performance_monitoring: true,
            personalized_recommendations: false,
        }
    }
}

impl AnalyticsSettings {
    /// Defaults consistent with a privacy data-collection level
    pub fn for_collection_level(level: DataCollectionLevel) -> Self {
        match level {
            DataCollectionLevel::None => Self {
                enabled: false,
                usage_statistics: false,
                performance_monitoring: false,
                personalized_recommendations: false,
            },
            DataCollectionLevel::Minimal => Self {
                usage_statistics: false,
                ..Self::default()
            },
            DataCollectionLevel::Standard => Self::default(),
            DataCollectionLevel::Full => Self {
                personalized_recommendations: true,
                ..Self::default()
            },
        }
    }
}
