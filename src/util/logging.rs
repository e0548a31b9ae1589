// LogWatch - util/logging.rs
//
// Structured logging with runtime-selectable debug mode.
//
// Activation:
//   - Environment variable: RUST_LOG=debug (or trace)
//   - CLI flag: --debug
//   - Config file: [logging] level = "debug"
//
// Output: stderr by default, or the file named by [logging] file. File output
// goes through a non-blocking writer so the tailing threads never wait on
// disk; the returned guard must live until exit to flush it.
// Never logs full log-line contents above debug level.

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Initialise the logging subsystem.
///
/// Priority: RUST_LOG env var > CLI --debug flag > config level > default "info".
/// If `log_file` cannot be opened, output falls back to stderr with a warning.
/// Returns the flush guard of the file writer, if one was installed.
pub fn init(
    debug_flag: bool,
    config_level: Option<&str>,
    log_file: Option<&str>,
) -> Option<WorkerGuard> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug_flag {
        EnvFilter::new("debug")
    } else if let Some(level) = config_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(super::constants::DEFAULT_LOG_LEVEL)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    let mut guard = None;
    let mut file_error = None;
    match log_file.filter(|p| !p.is_empty()) {
        Some(path) => match file_appender(Path::new(path)) {
            Ok(appender) => {
                let (writer, worker_guard) = tracing_appender::non_blocking(appender);
                guard = Some(worker_guard);
                builder.with_ansi(false).with_writer(writer).init();
            }
            Err(e) => {
                file_error = Some((path.to_string(), e));
                builder.init();
            }
        },
        None => builder.init(),
    }

    if let Some((path, e)) = file_error {
        tracing::warn!(path = %path, error = %e, "Cannot open log file; logging to stderr");
    }

    tracing::debug!(
        app = super::constants::APP_NAME,
        version = super::constants::APP_VERSION,
        file = guard.is_some(),
        "Logging initialised"
    );
    guard
}

/// Appender writing to exactly `path` (no rotation, appends across runs).
/// Missing parent directories are created.
fn file_appender(path: &Path) -> io::Result<RollingFileAppender> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "log file path has no file name")
    })?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .map_err(io::Error::other)
}
