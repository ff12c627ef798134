//! Logging infrastructure for Tenure.
//!
//! This module provides structured logging using the tracing ecosystem.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter, TestWriter},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level applied to the tenure crates when `RUST_LOG` is unset.
    pub level: Level,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Whether to include span events.
    pub include_spans: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
    /// Whether to include target (module path).
    pub include_target: bool,
    /// Route output through libtest's capture instead of stdout.
    pub test_writer: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_target: true,
            test_writer: false,
        }
    }
}

impl LoggingConfig {
    /// Verbose output for local runs and tests.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            include_spans: true,
            include_location: true,
            include_target: true,
            test_writer: false,
        }
    }

    /// JSON output for log aggregation inside a cluster.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_location: false,
            include_target: true,
            test_writer: false,
        }
    }

    /// Development output captured per test by libtest.
    pub fn test() -> Self {
        Self {
            test_writer: true,
            ..Self::development()
        }
    }

    fn writer(&self) -> BoxMakeWriter {
        if self.test_writer {
            BoxMakeWriter::new(TestWriter::new())
        } else {
            BoxMakeWriter::new(std::io::stdout)
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "tenure_core={},tenure_observability={}",
                self.level, self.level
            ))
        })
    }
}

/// Initializes the logging system with default configuration.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_logging() {
    if let Err(e) = try_init_logging_with_config(LoggingConfig::default()) {
        panic!("failed to initialize logging: {e}");
    }
}

/// Installs the global subscriber, returning an error if one is already set.
///
/// Tests call this from every case with [`LoggingConfig::test`]; only the
/// first call wins.
pub fn try_init_logging_with_config(config: LoggingConfig) -> Result<(), TryInitError> {
    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(config.writer())
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(config.writer())
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(fmt_layer)
            .try_init()
    }
}
