//! # tenure-observability
//!
//! Logging and metrics infrastructure for Tenure.
//!
//! This crate provides structured logging with tracing and the counters and
//! gauges recorded by the election engine.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, try_init_logging_with_config, LoggingConfig};
pub use metrics::ElectionMetrics;
