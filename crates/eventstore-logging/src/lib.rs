//! Structured JSONL logging for the event store
//!
//! # Features
//!
//! - **JSONL Output**: structured JSON lines for log aggregation (default)
//! - **Pretty Output**: human-readable console output for development
//! - **File Rotation**: daily/hourly log rotation via tracing-appender
//! - **Filtering**: `RUST_LOG` first, then the configured level and per-target directives
//!
//! # Quick Start
//!
//! ```ignore
//! use eventstore_logging::{EventStoreSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = EventStoreSubscriberBuilder::new().try_init()?;
//!
//! // Development mode with pretty human-readable output
//! let _guard = EventStoreSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()?;
//! ```

pub mod config;

pub use config::{
    ConsoleConfig, FileConfig, FilterConfig, JsonlConfig, LogConfig, RotationStrategy,
};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid filter directive: {0}")]
    Filter(String),

    #[error("Cannot open log file: {0}")]
    Appender(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
#[derive(Debug, Clone, Default)]
pub struct EventStoreSubscriberBuilder {
    config: LogConfig,
}

impl EventStoreSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Filter from `RUST_LOG`, falling back to the configured level and directives
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let mut filter = EnvFilter::try_new(&self.config.default_level)
            .map_err(|e| LoggingError::Filter(e.to_string()))?;
        for directive in self.config.filters.directives() {
            let directive: Directive = directive
                .parse()
                .map_err(|e| LoggingError::Filter(format!("{directive}: {e}")))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output on drop and must be kept
    /// alive for the duration of the program when file output is enabled.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = self.env_filter()?;
        let console = &self.config.console;
        let jsonl = &self.config.jsonl;

        // Disabled layers are `None`, which tracing-subscriber treats as a no-op layer
        let pretty_console = (console.enabled && console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
        });

        let json_console = (console.enabled && !console.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
        });

        let mut guard = None;
        let file_layer = match &self.config.file {
            Some(file_config) => {
                let (writer, file_guard) = file_writer(file_config)?;
                guard = Some(file_guard);
                Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(jsonl.include_spans)
                        .flatten_event(jsonl.flatten_events)
                        .with_file(jsonl.include_location)
                        .with_line_number(jsonl.include_location)
                        .with_ansi(false)
                        .with_writer(writer),
                )
            }
            None => None,
        };

        Registry::default()
            .with(env_filter)
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

/// Non-blocking writer for the configured log file
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for testing (minimal output), ignoring a subscriber already set
pub fn init_testing() {
    let _ = EventStoreSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
