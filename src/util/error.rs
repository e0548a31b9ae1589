// LogWatch - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Only configuration-class failures propagate; transient I/O on individual
// files is logged and skipped at the point of occurrence.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogWatch operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogWatchError {
    /// An error pattern or log-line pattern failed to compile.
    Pattern(PatternError),

    /// Configuration value could not be read or parsed.
    Config(ConfigError),

    /// The change-notification backend could not be started.
    Watch(WatchError),

    /// Persisted watcher state could not be written.
    Session(SessionError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for LogWatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(e) => write!(f, "Pattern error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Watch(e) => write!(f, "Watch error: {e}"),
            Self::Session(e) => write!(f, "State error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LogWatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pattern(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Watch(e) => Some(e),
            Self::Session(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern errors
// ---------------------------------------------------------------------------

/// Errors raised while compiling user-supplied patterns.
#[derive(Debug)]
pub enum PatternError {
    /// A `^`-prefixed pattern (or the log-line pattern) is not a valid regex.
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    /// A pattern exceeds the maximum allowed length.
    TooLong { length: usize, max_length: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegex { pattern, source } => {
                write!(f, "Invalid regex '{pattern}': {source}")
            }
            Self::TooLong { length, max_length } => write!(
                f,
                "Pattern is {length} chars, exceeds maximum of {max_length}"
            ),
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
            Self::TooLong { .. } => None,
        }
    }
}

impl From<PatternError> for LogWatchError {
    fn from(e: PatternError) -> Self {
        Self::Pattern(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A datetime value does not follow `DATETIME_FORMAT`.
    InvalidDatetime {
        field: String,
        value: String,
        source: chrono::ParseError,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::InvalidDatetime {
                field,
                value,
                source,
            } => write!(
                f,
                "'{field}' = '{value}' is not a valid datetime \
                 (expected YYYY-MM-DD HH:MM:SS): {source}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidDatetime { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for LogWatchError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Watch errors
// ---------------------------------------------------------------------------

/// Errors related to starting the change-notification backend.
#[derive(Debug)]
pub enum WatchError {
    /// The native filesystem event backend is unavailable.
    Notify(notify::Error),
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify(e) => write!(f, "native file events unavailable: {e}"),
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Notify(e) => Some(e),
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        Self::Notify(e)
    }
}

impl From<WatchError> for LogWatchError {
    fn from(e: WatchError) -> Self {
        Self::Watch(e)
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors related to saving persisted watcher state.
#[derive(Debug)]
pub enum SessionError {
    /// I/O error creating, writing, or renaming the state file.
    Io { path: PathBuf, source: io::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "State file I/O error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "State serialisation error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<SessionError> for LogWatchError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

/// Convenience type alias for LogWatch results.
pub type Result<T> = std::result::Result<T, LogWatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn compile_length(length: usize) -> Result<usize> {
        if length > 10 {
            Err::<(), _>(PatternError::TooLong {
                length,
                max_length: 10,
            })?;
        }
        Ok(length)
    }

    #[test]
    fn test_result_alias_converts_subsystem_errors() {
        assert_eq!(compile_length(3).unwrap(), 3);
        let err = compile_length(12).unwrap_err();
        assert!(matches!(err, LogWatchError::Pattern(PatternError::TooLong { .. })));
        assert_eq!(
            err.to_string(),
            "Pattern error: Pattern is 12 chars, exceeds maximum of 10"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_error_names_operation_and_path() {
        let err = LogWatchError::Io {
            path: PathBuf::from("/var/log/missing"),
            operation: "scan",
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(
            err.to_string(),
            "I/O error during scan on '/var/log/missing': gone"
        );
    }
}
