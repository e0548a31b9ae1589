// LogWatch - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogWatch";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "logwatch";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Pattern matching
// =============================================================================

/// Default error patterns as `(title, pattern)` pairs, in evaluation order.
pub const DEFAULT_ERROR_PATTERNS: &[(&str, &str)] = &[
    ("Exceptions", "exception"),
    ("Errors", "error"),
    ("Tracebacks", "traceback"),
    ("Failures", "failed"),
    ("Critical", "critical"),
];

/// Leading character that switches a pattern from literal to regex matching.
pub const REGEX_PATTERN_PREFIX: char = '^';

/// Maximum pattern length to prevent pathological regex compilation.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Capacity of the per-file ring buffer of recently matched lines.
pub const MAX_MATCHED_LINES_PER_FILE: usize = 50;

/// Format used for datetimes in config.toml and on the command line.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Log file classification
// =============================================================================

/// Extensions (lower-case, without the dot) that always mark a log file.
pub const LOG_EXTENSIONS: &[&str] = &["log", "logs"];

/// File-name substrings that trigger a content check.
pub const DEFAULT_NAME_HINTS: &[&str] = &["log"];

/// Extra name hint enabled by the txt variant of the classifier.
pub const TXT_NAME_HINT: &str = "txt";

/// Number of non-empty leading lines sampled by the content check.
pub const CLASSIFY_SAMPLE_LINES: usize = 5;

/// Sampled lines that must look like log lines for a positive verdict.
pub const CLASSIFY_MIN_MATCHING_LINES: usize = 2;

/// Upper bound on bytes read while sampling a candidate file.
pub const CLASSIFY_MAX_SAMPLE_BYTES: u64 = 64 * 1024;

/// Default log-line prefix pattern: ISO, US, bracketed ISO, time-only and
/// syslog-style timestamps at the start of a line.
pub const DEFAULT_LOG_LINE_PATTERN: &str = concat!(
    r"^\d{4}[-/]\d{2}[-/]\d{2}|",
    r"^\d{2}[-/]\d{2}[-/]\d{4}|",
    r"^\[\d{4}[-/]\d{2}[-/]\d{2}|",
    r"^\d{2}:\d{2}:\d{2}|",
    r"^\w{3}\s+\d{1,2}\s+\d{2}:\d{2}",
);

// =============================================================================
// Scanner
// =============================================================================

/// Directory names never descended into (in addition to hidden directories).
pub const EXCLUDED_DIR_NAMES: &[&str] = &["node_modules", "__pycache__", "venv", ".git"];

/// Depth limit (inclusive, root = 0) of the progress-estimate pre-pass.
pub const SCAN_ESTIMATE_MAX_DEPTH: usize = 3;

/// Progress never reaches this value until the scan completes.
pub const SCAN_PROGRESS_CAP: f64 = 0.99;

/// How long `LogScanner::stop` waits for the scan thread to exit.
pub const SCAN_STOP_TIMEOUT_SECS: u64 = 2;

// =============================================================================
// Watcher
// =============================================================================

/// Glob matched against file names inside watched directories.
pub const WATCHED_FILE_GLOB: &str = "*.log";

/// Extension a changed path must carry to be picked up from a watched directory.
pub const WATCHED_FILE_EXTENSION: &str = "log";

/// Default interval of the polling change source (ms).
pub const WATCH_POLL_INTERVAL_MS: u64 = 500;

/// Minimum user-configurable poll interval (ms).
pub const MIN_WATCH_POLL_INTERVAL_MS: u64 = 100;

/// Maximum user-configurable poll interval (ms).
pub const MAX_WATCH_POLL_INTERVAL_MS: u64 = 60_000;

/// How often background loops check their cancel flag (ms).
pub const WATCH_CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// How long `MultiLogWatcher::stop` waits for the change-source thread.
pub const WATCHER_STOP_TIMEOUT_SECS: u64 = 2;

/// Chunk size used when counting newlines ahead of a resume offset.
pub const NEWLINE_SCAN_CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration and persistence
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Persisted watcher state file name (stored in the platform data directory).
pub const SESSION_FILE_NAME: &str = "state.json";

/// How often `logwatch watch` flushes watcher state to disk (seconds).
pub const STATE_SAVE_INTERVAL_SECS: u64 = 30;
