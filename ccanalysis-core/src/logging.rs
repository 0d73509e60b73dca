//! Logging infrastructure for ccanalysis
//!
//! Logs are written to `~/.ccanalysis/logs/`. Stdout is reserved for command
//! output because hook callers parse it.

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// File name prefix for rotated log files
pub const LOG_FILE_PREFIX: &str = "ccanalysis";

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to `log_dir`
/// - Daily rotation, keeping `config.max_files` files
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig, log_dir: &Path) -> crate::error::Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(log_dir)
        .map_err(|e| crate::error::Error::Logging(e.to_string()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::error::Error::Logging(e.to_string()))?;

    tracing::debug!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}
