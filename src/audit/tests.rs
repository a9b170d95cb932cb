//! Tests for the change tracker

use super::*;
use crate::core::SettingsError;
use crate::model::{DisplaySettings, SettingValue, Theme};
use crate::testing::MockRepository;
use proptest::prelude::*;

#[test]
fn test_identical_trees_produce_no_events() {
    let settings = AppSettings::default();
    let mut touched = settings.clone();
    touched.touch();

    assert!(diff(&settings, &touched, ChangeSource::User).unwrap().is_empty());
}

#[test]
fn test_one_event_per_changed_section() {
    let old = AppSettings::default();
    let mut new = old.clone();
    new.display.theme = Theme::Dark;
    new.display.font_size = 20.0;
    new.sync.enabled = false;

    let events = diff(&old, &new, ChangeSource::User).unwrap();
    let keys: Vec<_> = events.iter().map(|e| e.setting_key.as_str()).collect();
    assert_eq!(keys, vec!["sync", "display"]);
    assert!(events.iter().all(|e| e.source == ChangeSource::User));

    let display = &events[1];
    let before: DisplaySettings = display.old_value.as_ref().unwrap().decode().unwrap();
    let after: DisplaySettings = display.new_value.decode().unwrap();
    assert_eq!(before, old.display);
    assert_eq!(after, new.display);
}

#[tokio::test]
async fn test_record_and_history() {
    let repo = Arc::new(MockRepository::new());
    let tracker = ChangeTracker::new(repo.clone());

    let first = SettingsChangeEvent::new("display", None, SettingValue::Int(1), ChangeSource::User);
    let second = SettingsChangeEvent::new("bible", None, SettingValue::Int(2), ChangeSource::Sync);
    assert_eq!(tracker.record_all(vec![first.clone(), second.clone()]).await.unwrap(), 2);

    let history = tracker.history(None, 10, 0).await.unwrap();
    assert_eq!(history, vec![second, first.clone()]);

    let display = tracker.history(Some("display"), 10, 0).await.unwrap();
    assert_eq!(display, vec![first]);
}

#[tokio::test]
async fn test_record_failure_propagates() {
    let repo = Arc::new(MockRepository::new());
    MockRepository::switch(&repo.fail_track, true);
    let tracker = ChangeTracker::new(repo.clone());

    let event = SettingsChangeEvent::new("display", None, SettingValue::Int(1), ChangeSource::User);
    let result = tracker.record(event).await;
    assert!(matches!(result, Err(SettingsError::StorageUnavailable(_))));
    assert!(repo.recorded().is_empty());
}

fn arb_theme() -> impl Strategy<Value = Theme> {
    prop_oneof![
        Just(Theme::System),
        Just(Theme::Light),
        Just(Theme::Dark),
        Just(Theme::Sepia),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Event count equals the number of sections that actually changed
    #[test]
    fn prop_diff_granularity(
        theme in arb_theme(),
        font_size in 10.0f64..40.0,
        sync_enabled in any::<bool>(),
        language in prop::sample::select(vec!["en", "de", "fr"]),
    ) {
        let old = AppSettings::default();
        let mut new = old.clone();
        new.display.theme = theme;
        new.display.font_size = font_size;
        new.sync.enabled = sync_enabled;
        new.general.language = language.to_string();

        let expected = [
            old.general != new.general,
            old.sync != new.sync,
            old.display != new.display,
        ]
        .iter()
        .filter(|changed| **changed)
        .count();

        let events = diff(&old, &new, ChangeSource::User).unwrap();
        prop_assert_eq!(events.len(), expected);
    }
}
