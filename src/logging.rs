//! Logging Setup
//!
//! Installs the tracing subscriber: stdout always, plus a daily rolling
//! file named after the instance when a log directory is configured. File
//! writes go through a background worker whose guard must outlive every
//! log call; [`crate::shutdown::terminate`] drops it last.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::ConfigError;

/// Non-blocking writer for the log file and the guard of its worker.
pub struct LogFile {
    writer: NonBlocking,
    guard: WorkerGuard,
}

/// Opens the rolling log file when `LOG_DIRECTORY` is set.
///
/// The directory must already exist and accept writes.
pub fn open_log_file(config: &Config) -> Result<Option<LogFile>, ConfigError> {
    let Some(directory) = config.log_directory.as_deref() else {
        return Ok(None);
    };
    check_writable(directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.instance.as_str())
        .filename_suffix("log")
        .max_log_files(config.log_max_files)
        .build(directory)
        .map_err(|e| log_directory_error(directory, e))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok(Some(LogFile { writer, guard }))
}

/// Installs the global subscriber and returns the file worker guard.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init(level: &str, log_file: Option<LogFile>) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("disaster_gateway={level},tower_http={level}").into());

    let (writer, guard) = match log_file {
        Some(LogFile { writer, guard }) => (Some(writer), Some(guard)),
        None => (None, None),
    };
    let file_layer = writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn check_writable(directory: &Path) -> Result<(), ConfigError> {
    let marker = directory.join(format!(".write-check-{}", std::process::id()));
    std::fs::write(&marker, b"")
        .and_then(|()| std::fs::remove_file(&marker))
        .map_err(|e| log_directory_error(directory, e))
}

fn log_directory_error(directory: &Path, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key: "LOG_DIRECTORY".to_string(),
        message: format!("'{}' cannot be written to: {}", directory.display(), err),
    }
}
