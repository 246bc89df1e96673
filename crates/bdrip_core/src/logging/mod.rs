//! Logging infrastructure for bdrip.
//!
//! This module provides:
//! - Per-clip loggers with file + callback dual output
//! - Compact mode that keeps tool output in a tail buffer
//! - Integration with the `tracing` ecosystem, optionally to a rolling file
//!
//! # Example
//!
//! ```no_run
//! use bdrip_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("00001", "/tmp/work/00001_build", LogConfig::default(), None).unwrap();
//!
//! logger.phase("Encode");
//! logger.command("x265 --frames 100 --y4m ...");
//! logger.success("Encoded 100 frames");
//! ```

mod job_logger;
mod types;

use std::fs;
use std::path::Path;

pub use job_logger::JobLogger;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the rolling application log.
pub const APP_LOG_PREFIX: &str = "bdrip.log";

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], additionally writing a daily-rolling log file in `logs_dir`.
///
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    logs_dir: &Path,
) -> std::io::Result<WorkerGuard> {
    fs::create_dir_all(logs_dir)?;
    let appender = tracing_appender::rolling::daily(logs_dir, APP_LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(env_filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}
