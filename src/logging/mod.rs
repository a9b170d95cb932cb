//! Logging setup for hosts embedding the settings engine
//!
//! The engine itself only emits `tracing` events. A host that has no
//! subscriber of its own can install one from [`LoggingConfig`], writing to the
//! console, a rolling file, or both.

mod config;

#[cfg(test)]
mod tests;

pub use config::{LogFormat, LogLevel, LogOutput, LoggingConfig, RotationStrategy};

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationError(String),

    #[error("Invalid filter directive: {0}")]
    InvalidFilter(String),
}

pub type LoggingResult<T> = Result<T, LoggingError>;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Installed subscriber. Dropping it flushes and stops the file writer.
pub struct LoggingSystem {
    config: LoggingConfig,
    _guards: Vec<WorkerGuard>,
}

impl LoggingSystem {
    /// Install a global subscriber built from `config`
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        let env_filter = Self::build_env_filter(&config)?;
        let mut guards = Vec::new();

        let console = match config.output {
            LogOutput::Console | LogOutput::Both => Some(Self::create_console_layer(&config)),
            LogOutput::File => None,
        };

        let file = match config.output {
            LogOutput::File | LogOutput::Both => {
                let (layer, guard) = Self::create_file_layer(&config)?;
                guards.push(guard);
                Some(layer)
            }
            LogOutput::Console => None,
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .with(file)
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

        tracing::debug!(
            level = %config.level,
            output = ?config.output,
            "Logging initialized"
        );

        Ok(Self {
            config,
            _guards: guards,
        })
    }

    /// `RUST_LOG` when allowed and present, otherwise the configured directives
    fn build_env_filter(config: &LoggingConfig) -> LoggingResult<EnvFilter> {
        if config.respect_env_filter {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }

        let directives = config.filter_directives();
        EnvFilter::try_new(&directives)
            .map_err(|e| LoggingError::InvalidFilter(format!("{}: {}", directives, e)))
    }

    fn create_console_layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info);

        match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        }
    }

    fn create_file_layer<S>(config: &LoggingConfig) -> LoggingResult<(BoxedLayer<S>, WorkerGuard)>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let log_dir = Self::resolve_log_directory(config)?;

        let appender = RollingFileAppender::new(
            rotation_for(config.rotation),
            &log_dir,
            &config.file_prefix,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info)
            .with_ansi(false);

        let layer = match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        };

        Ok((layer, guard))
    }

    /// Create the log directory, falling back to `./logs`
    fn resolve_log_directory(config: &LoggingConfig) -> LoggingResult<PathBuf> {
        let log_dir = config
            .log_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"));

        std::fs::create_dir_all(&log_dir).map_err(|e| {
            LoggingError::DirectoryCreationError(format!("{}: {}", log_dir.display(), e))
        })?;

        Ok(log_dir)
    }

    pub fn log_directory(&self) -> Option<&PathBuf> {
        self.config.log_directory.as_ref()
    }

    pub fn log_level(&self) -> LogLevel {
        self.config.level
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

fn rotation_for(strategy: RotationStrategy) -> Rotation {
    match strategy {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    }
}

/// Install a subscriber from the logging section of the engine configuration
pub fn init_logging(config: LoggingConfig) -> LoggingResult<LoggingSystem> {
    LoggingSystem::init(config)
}
