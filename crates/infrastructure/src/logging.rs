use std::path::Path;

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ConfigError, LogFormat, LogLevel};

/// Where console events go. Report commands log to stderr so their
/// stdout stays machine-readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

/// Initialize structured console logging, and optionally a log file.
///
/// - `LogFormat::Json`: flattened JSON (production, log aggregator compatible).
/// - `LogFormat::Text`: human-readable colored output (development).
///
/// When `log_file` is given, events are also written as JSON to a file
/// in the same directory, rolled daily. The returned guard flushes the
/// non-blocking writer on drop and must live as long as the process.
///
/// Uses `RUST_LOG` env var if set, otherwise falls back to the given `level`.
/// Must be called exactly once at startup.
pub fn init_logging(
    level: LogLevel,
    format: LogFormat,
    console: ConsoleTarget,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, ConfigError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let console_layer = match (format, console) {
        (LogFormat::Json, ConsoleTarget::Stdout) => fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(false)
            .boxed(),
        (LogFormat::Json, ConsoleTarget::Stderr) => fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .boxed(),
        (LogFormat::Text, ConsoleTarget::Stdout) => {
            fmt::layer().pretty().with_target(true).with_ansi(true).boxed()
        }
        (LogFormat::Text, ConsoleTarget::Stderr) => fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (dir, prefix) = split_log_path(path)?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::Validation {
            field: "agent.log_file".to_string(),
            message: format!("logging already initialised: {e}"),
        })?;

    Ok(guard)
}

/// Split a log path into the directory to roll in and the file prefix.
fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr), ConfigError> {
    let prefix = path.file_name().ok_or_else(|| ConfigError::Validation {
        field: "agent.log_file".to_string(),
        message: format!("'{}' does not name a file", path.display()),
    })?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok((dir, prefix))
}
