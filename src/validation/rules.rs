//! Per-section validation rules and their bounds

use lazy_static::lazy_static;
use regex::Regex;

use super::ValidationError;
use crate::model::{
    AccessibilitySettings, AnalyticsSettings, BibleSettings, DisplaySettings, GeneralSettings,
    NotificationSettings, PrivacySettings, StorageSettings, SyncSettings, TimeOfDay,
};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

pub const MIN_CACHE_SIZE_BYTES: u64 = 10 * MB;
pub const MAX_CACHE_SIZE_BYTES: u64 = GB;
pub const MIN_OFFLINE_CONTENT_BYTES: u64 = 50 * MB;
pub const MAX_OFFLINE_CONTENT_BYTES: u64 = 5 * GB;
pub const MIN_HIGHLIGHT_COLORS: usize = 1;
pub const MAX_HIGHLIGHT_COLORS: usize = 20;
pub const MIN_READING_PLAN_DAYS: u32 = 1;
pub const MAX_READING_PLAN_DAYS: u32 = 1095;
pub const MIN_FONT_SIZE: f64 = 10.0;
pub const MAX_FONT_SIZE: f64 = 40.0;
pub const MIN_LINE_SPACING: f64 = 1.0;
pub const MAX_LINE_SPACING: f64 = 3.0;
pub const MIN_FONT_SCALE: f64 = 0.5;
pub const MAX_FONT_SCALE: f64 = 3.0;
pub const MIN_PLAYBACK_SPEED: f64 = 0.5;
pub const MAX_PLAYBACK_SPEED: f64 = 3.0;
pub const MIN_SYNC_INTERVAL_MINUTES: u32 = 5;
pub const MAX_SYNC_INTERVAL_MINUTES: u32 = 1440;
pub const MAX_AUTO_LOCK_SECONDS: u32 = 3600;

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
    static ref LANGUAGE_TAG: Regex = Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})*$").unwrap();
    static ref REGION_CODE: Regex = Regex::new(r"^[A-Z]{2}$").unwrap();
}

fn check_range_u64(
    errors: &mut Vec<ValidationError>,
    field: &str,
    value: u64,
    min: u64,
    max: u64,
) {
    if value < min {
        errors.push(
            ValidationError::new(field, format!("must be at least {}", min))
                .with_suggestion(min as i64),
        );
    } else if value > max {
        errors.push(
            ValidationError::new(field, format!("must be at most {}", max))
                .with_suggestion(max as i64),
        );
    }
}

fn check_range_f64(
    errors: &mut Vec<ValidationError>,
    field: &str,
    value: f64,
    min: f64,
    max: f64,
) {
    if !value.is_finite() {
        errors.push(ValidationError::new(field, "must be a finite number").with_suggestion(min));
    } else if value < min {
        errors.push(
            ValidationError::new(field, format!("must be at least {}", min)).with_suggestion(min),
        );
    } else if value > max {
        errors.push(
            ValidationError::new(field, format!("must be at most {}", max)).with_suggestion(max),
        );
    }
}

fn check_not_blank(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    }
}

fn check_time_of_day(errors: &mut Vec<ValidationError>, field: &str, time: &TimeOfDay) {
    if time.hour > 23 {
        errors.push(ValidationError::new(
            format!("{}.hour", field),
            "must be between 0 and 23",
        ));
    }
    if time.minute > 59 {
        errors.push(ValidationError::new(
            format!("{}.minute", field),
            "must be between 0 and 59",
        ));
    }
}

pub fn validate_general(general: &GeneralSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !LANGUAGE_TAG.is_match(&general.language) {
        errors.push(
            ValidationError::new("general.language", "must be a language tag such as 'en' or 'pt-BR'")
                .with_suggestion("en"),
        );
    }
    if !REGION_CODE.is_match(&general.region) {
        errors.push(
            ValidationError::new("general.region", "must be a two-letter uppercase region code")
                .with_suggestion("US"),
        );
    }
    check_not_blank(&mut errors, "general.appIcon", &general.app_icon);

    errors
}

pub fn validate_bible(bible: &BibleSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_not_blank(&mut errors, "bible.defaultTranslation", &bible.default_translation);
    if let Some(parallel) = &bible.parallel_translation {
        check_not_blank(&mut errors, "bible.parallelTranslation", parallel);
        if parallel == &bible.default_translation {
            errors.push(ValidationError::new(
                "bible.parallelTranslation",
                "must differ from the default translation",
            ));
        }
    }

    let colors = bible.highlight_colors.len();
    if !(MIN_HIGHLIGHT_COLORS..=MAX_HIGHLIGHT_COLORS).contains(&colors) {
        errors.push(ValidationError::new(
            "bible.highlightColors",
            format!(
                "must contain between {} and {} colors, found {}",
                MIN_HIGHLIGHT_COLORS, MAX_HIGHLIGHT_COLORS, colors
            ),
        ));
    }
    for (index, color) in bible.highlight_colors.iter().enumerate() {
        if !HEX_COLOR.is_match(color) {
            errors.push(ValidationError::new(
                format!("bible.highlightColors[{}]", index),
                format!("'{}' is not a #RRGGBB color", color),
            ));
        }
    }

    check_range_f64(
        &mut errors,
        "bible.audioPlaybackSpeed",
        bible.audio_playback_speed,
        MIN_PLAYBACK_SPEED,
        MAX_PLAYBACK_SPEED,
    );

    if let Some(plan) = &bible.reading_plan {
        check_not_blank(&mut errors, "bible.readingPlan.planId", &plan.plan_id);
        check_not_blank(&mut errors, "bible.readingPlan.name", &plan.name);
        check_range_u64(
            &mut errors,
            "bible.readingPlan.durationDays",
            u64::from(plan.duration_days),
            u64::from(MIN_READING_PLAN_DAYS),
            u64::from(MAX_READING_PLAN_DAYS),
        );
    }

    errors
}

pub fn validate_privacy(privacy: &PrivacySettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if privacy.auto_lock_timeout_seconds > MAX_AUTO_LOCK_SECONDS {
        errors.push(
            ValidationError::new(
                "privacy.autoLockTimeoutSeconds",
                format!("must be at most {} seconds", MAX_AUTO_LOCK_SECONDS),
            )
            .with_suggestion(i64::from(MAX_AUTO_LOCK_SECONDS)),
        );
    }

    errors
}

pub fn validate_sync(sync: &SyncSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_range_u64(
        &mut errors,
        "sync.syncIntervalMinutes",
        u64::from(sync.sync_interval_minutes),
        u64::from(MIN_SYNC_INTERVAL_MINUTES),
        u64::from(MAX_SYNC_INTERVAL_MINUTES),
    );

    errors
}

pub fn validate_accessibility(accessibility: &AccessibilitySettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_range_f64(
        &mut errors,
        "accessibility.fontScale",
        accessibility.font_scale,
        MIN_FONT_SCALE,
        MAX_FONT_SCALE,
    );

    errors
}

pub fn validate_notifications(notifications: &NotificationSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_time_of_day(
        &mut errors,
        "notifications.dailyVerseTime",
        &notifications.daily_verse_time,
    );

    if let Some(quiet) = &notifications.quiet_hours {
        check_time_of_day(&mut errors, "notifications.quietHours.start", &quiet.start);
        check_time_of_day(&mut errors, "notifications.quietHours.end", &quiet.end);
        if quiet.start == quiet.end {
            errors.push(ValidationError::new(
                "notifications.quietHours",
                "start and end must differ",
            ));
        }
    }

    for (index, day) in notifications.reminder_days.iter().enumerate() {
        if !(1..=7).contains(day) {
            errors.push(ValidationError::new(
                format!("notifications.reminderDays[{}]", index),
                "must be an ISO weekday between 1 and 7",
            ));
        }
    }

    if notifications.reading_reminders && notifications.reminder_days.is_empty() {
        errors.push(ValidationError::new(
            "notifications.reminderDays",
            "at least one day is required when reading reminders are on",
        ));
    }

    errors
}

pub fn validate_display(display: &DisplaySettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_not_blank(&mut errors, "display.fontFamily", &display.font_family);
    check_range_f64(
        &mut errors,
        "display.fontSize",
        display.font_size,
        MIN_FONT_SIZE,
        MAX_FONT_SIZE,
    );
    check_range_f64(
        &mut errors,
        "display.lineSpacing",
        display.line_spacing,
        MIN_LINE_SPACING,
        MAX_LINE_SPACING,
    );

    errors
}

pub fn validate_storage(storage: &StorageSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_range_u64(
        &mut errors,
        "storage.cacheSizeBytes",
        storage.cache_size_bytes,
        MIN_CACHE_SIZE_BYTES,
        MAX_CACHE_SIZE_BYTES,
    );
    check_range_u64(
        &mut errors,
        "storage.offlineContentSizeBytes",
        storage.offline_content_size_bytes,
        MIN_OFFLINE_CONTENT_BYTES,
        MAX_OFFLINE_CONTENT_BYTES,
    );

    errors
}

pub fn validate_analytics(analytics: &AnalyticsSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !analytics.enabled
        && (analytics.usage_statistics
            || analytics.performance_monitoring
            || analytics.personalized_recommendations)
    {
        errors.push(
            ValidationError::new(
                "analytics.enabled",
                "individual analytics options require analytics to be enabled",
            )
            .with_suggestion(true),
        );
    }

    errors
}
