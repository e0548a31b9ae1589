// LogWatch - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies. These types are the shared vocabulary across all
// layers and the boundary types handed to collaborators.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Pattern configuration
// =============================================================================

/// A user-configured error pattern: a display title plus the match string.
///
/// The match string is a literal (case-insensitive substring) unless it
/// starts with `^`, in which case it is a case-insensitive regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PatternEntry")]
pub struct PatternSpec {
    pub title: String,
    pub pattern: String,
}

impl PatternSpec {
    /// Build a spec whose title is derived from the pattern text.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            title: capitalize(&pattern),
            pattern,
        }
    }

    /// Build a spec with an explicit title.
    pub fn titled(title: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pattern: pattern.into(),
        }
    }

    /// The built-in default pattern list.
    pub fn defaults() -> Vec<Self> {
        crate::util::constants::DEFAULT_ERROR_PATTERNS
            .iter()
            .map(|(title, pattern)| Self::titled(*title, *pattern))
            .collect()
    }
}

/// On-disk shape of a pattern: either a bare string or a `{title, pattern}`
/// table. Both normalise to `PatternSpec`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PatternEntry {
    Plain(String),
    Titled {
        title: Option<String>,
        pattern: String,
    },
}

impl From<PatternEntry> for PatternSpec {
    fn from(entry: PatternEntry) -> Self {
        match entry {
            PatternEntry::Plain(pattern) => PatternSpec::new(pattern),
            PatternEntry::Titled {
                title: Some(title),
                pattern,
            } => PatternSpec::titled(title, pattern),
            PatternEntry::Titled {
                title: None,
                pattern,
            } => PatternSpec::new(pattern),
        }
    }
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// =============================================================================
// Change source selection
// =============================================================================

/// Which change-notification backend the watcher should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeSourceMode {
    /// Native OS file events, falling back to polling if unavailable.
    #[default]
    Auto,
    /// Native OS file events only; failure to start is an error.
    Native,
    /// Fixed-interval polling of the watched file set.
    Poll,
}

impl ChangeSourceMode {
    /// Parse a config/CLI value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "native" => Some(Self::Native),
            "poll" => Some(Self::Poll),
            _ => None,
        }
    }
}

// =============================================================================
// Datetime range filter
// =============================================================================

/// Inclusive datetime window applied to matched lines.
///
/// Lines without a parseable timestamp are always in range: most log lines
/// carry no timestamp the extractor recognises, so excluding them would
/// hide continuation lines and stack traces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatetimeRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DatetimeRange {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// Returns true if no bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Returns true if `timestamp` falls inside the window (bounds inclusive).
    pub fn contains(&self, timestamp: Option<NaiveDateTime>) -> bool {
        let Some(ts) = timestamp else {
            return true;
        };
        if self.start.is_some_and(|start| ts < start) {
            return false;
        }
        if self.end.is_some_and(|end| ts > end) {
            return false;
        }
        true
    }
}

// =============================================================================
// Match bookkeeping
// =============================================================================

/// A line that matched at least one pattern, retained in the per-file ring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedLine {
    /// 1-based line number within the file.
    pub line_number: u64,
    /// Line text with surrounding whitespace removed.
    pub text: String,
    /// Timestamp extracted from the line, if any.
    pub timestamp: Option<NaiveDateTime>,
    /// Raw strings of every pattern that matched, in configured order.
    pub matched_patterns: Vec<String>,
}

/// Notification emitted for each newly-appearing qualifying line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchEvent {
    /// File name component of `file_path`.
    pub file_name: String,
    pub file_path: PathBuf,
    pub line_number: u64,
    /// Trimmed line text.
    pub text: String,
    pub matched_patterns: Vec<String>,
}

/// Serialisable per-file snapshot exchanged with the persistence layer.
///
/// Missing fields default to zero so partially-written or legacy entries
/// still load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FileState {
    /// Byte offset up to which the file has been read.
    #[serde(default)]
    pub position: u64,
    /// Modification time (seconds since the Unix epoch) at that offset.
    #[serde(default)]
    pub mtime: f64,
    /// Cumulative number of pattern matches counted for the file.
    #[serde(default)]
    pub error_count: u64,
}

// =============================================================================
// Scan progress messages
// =============================================================================

/// Messages sent from the background scan thread to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanProgress {
    /// A log file was discovered.
    Found(PathBuf),
    /// Fraction of the estimated directory count visited so far (0.0-1.0).
    Progress(f64),
    /// Scan finished or was stopped. Always the last message.
    Done { total_found: usize },
}
