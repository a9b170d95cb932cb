//! Logging configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Log verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Structured JSON format for machine parsing
    Json,
}

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration, embedded in the engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level
    pub level: LogLevel,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Directory for log files when file output is enabled
    pub log_directory: Option<PathBuf>,

    /// File name prefix of the rolling log
    pub file_prefix: String,

    pub rotation: RotationStrategy,

    /// Per-module level overrides, e.g. `leavn_settings::repository = debug`
    pub module_levels: BTreeMap<String, LogLevel>,

    /// Let `RUST_LOG` replace the configured filter when set
    pub respect_env_filter: bool,

    pub include_target: bool,

    pub include_thread_id: bool,

    pub include_file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Console,
            log_directory: None,
            file_prefix: "leavn-settings.log".to_string(),
            rotation: RotationStrategy::Daily,
            module_levels: BTreeMap::new(),
            respect_env_filter: true,
            include_target: true,
            include_thread_id: false,
            include_file_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_directory = Some(dir.into());
        self
    }

    pub fn with_module_level(mut self, module: impl Into<String>, level: LogLevel) -> Self {
        self.module_levels.insert(module.into(), level);
        self
    }

    /// Verbose console logging for local work
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            include_thread_id: true,
            include_file_info: true,
            ..Self::default()
        }
    }

    /// JSON logs to console and a daily rolling file
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Both,
            log_directory: Some(default_log_directory()),
            respect_env_filter: false,
            ..Self::default()
        }
    }

    /// Filter directive string, e.g. `info,leavn_settings::sync=debug`
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.as_str().to_string())
            .chain(
                self.module_levels
                    .iter()
                    .map(|(module, level)| format!("{}={}", module, level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Platform log directory for the settings engine
fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leavn")
        .join("logs")
}
