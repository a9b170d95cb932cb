//! Tests for the logging setup

use super::*;
use tempfile::TempDir;

#[test]
fn test_log_level_display() {
    assert_eq!(LogLevel::Trace.to_string(), "trace");
    assert_eq!(LogLevel::Debug.to_string(), "debug");
    assert_eq!(LogLevel::Info.to_string(), "info");
    assert_eq!(LogLevel::Warn.to_string(), "warn");
    assert_eq!(LogLevel::Error.to_string(), "error");
    assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
}

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Text);
    assert_eq!(config.output, LogOutput::Console);
    assert_eq!(config.rotation, RotationStrategy::Daily);
    assert_eq!(config.file_prefix, "leavn-settings.log");
    assert!(config.log_directory.is_none());
    assert!(config.include_target);
    assert!(!config.include_thread_id);
}

#[test]
fn test_logging_config_builder() {
    let config = LoggingConfig::new()
        .with_level(LogLevel::Debug)
        .with_format(LogFormat::Json)
        .with_output(LogOutput::File)
        .with_log_directory("/tmp/leavn-logs")
        .with_module_level("leavn_settings::repository", LogLevel::Trace);

    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.output, LogOutput::File);
    assert_eq!(config.log_directory, Some(PathBuf::from("/tmp/leavn-logs")));
    assert_eq!(
        config.module_levels.get("leavn_settings::repository"),
        Some(&LogLevel::Trace)
    );
}

#[test]
fn test_presets() {
    let dev = LoggingConfig::development();
    assert_eq!(dev.level, LogLevel::Debug);
    assert_eq!(dev.output, LogOutput::Console);
    assert!(dev.include_file_info);

    let prod = LoggingConfig::production();
    assert_eq!(prod.format, LogFormat::Json);
    assert_eq!(prod.output, LogOutput::Both);
    assert!(!prod.respect_env_filter);
    assert!(prod.log_directory.is_some());
}

#[test]
fn test_filter_directives() {
    let config = LoggingConfig::new()
        .with_level(LogLevel::Warn)
        .with_module_level("leavn_settings::usecase", LogLevel::Debug)
        .with_module_level("leavn_settings::analytics", LogLevel::Error);

    assert_eq!(
        config.filter_directives(),
        "warn,leavn_settings::analytics=error,leavn_settings::usecase=debug"
    );

    let filter = LoggingSystem::build_env_filter(&LoggingConfig {
        respect_env_filter: false,
        ..config
    });
    assert!(filter.is_ok());
}

#[test]
fn test_log_directory_is_created() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("logs");
    let config = LoggingConfig::new().with_log_directory(&dir);

    let resolved = LoggingSystem::resolve_log_directory(&config).unwrap();
    assert_eq!(resolved, dir);
    assert!(dir.is_dir());
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: LoggingConfig =
        serde_json::from_str(r#"{ "level": "debug", "rotation": "hourly" }"#).unwrap();
    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.rotation, RotationStrategy::Hourly);
    assert_eq!(config.output, LogOutput::Console);
    assert_eq!(config.file_prefix, "leavn-settings.log");
}
