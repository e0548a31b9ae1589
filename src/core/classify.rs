// LogWatch - core/classify.rs
//
// Log file classification heuristics used by the scanner.
//
// Architecture note: this module never opens files. The app layer
// (app::scanner) reads the leading lines of a candidate and passes them here,
// keeping all filesystem access out of the core.

use crate::util::constants;
use crate::util::error::PatternError;
use regex::Regex;
use std::path::Path;

/// Classification settings shared by every scan of a `LogScanner`.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Lower-case substrings of a file name that trigger a content check.
    pub name_hints: Vec<String>,

    /// Pattern a sampled line must match at its start to count as a log line.
    pub log_line_pattern: Regex,

    /// Number of non-empty leading lines sampled.
    pub sample_lines: usize,

    /// Minimum matching sampled lines for a positive verdict.
    pub min_matching_lines: usize,
}

impl ClassifierConfig {
    /// Build a config with a custom log-line pattern.
    ///
    /// An invalid pattern is a configuration error, never silently replaced.
    pub fn new(log_line_pattern: &str) -> Result<Self, PatternError> {
        if log_line_pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
            return Err(PatternError::TooLong {
                length: log_line_pattern.len(),
                max_length: constants::MAX_REGEX_PATTERN_LENGTH,
            });
        }
        let regex = Regex::new(log_line_pattern).map_err(|e| PatternError::InvalidRegex {
            pattern: log_line_pattern.to_string(),
            source: e,
        })?;
        Ok(Self {
            name_hints: constants::DEFAULT_NAME_HINTS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            log_line_pattern: regex,
            sample_lines: constants::CLASSIFY_SAMPLE_LINES,
            min_matching_lines: constants::CLASSIFY_MIN_MATCHING_LINES,
        })
    }

    /// Also content-check files whose name contains "txt".
    pub fn with_txt_files(mut self) -> Self {
        let hint = constants::TXT_NAME_HINT.to_string();
        if !self.name_hints.contains(&hint) {
            self.name_hints.push(hint);
        }
        self
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        // Covered by the unit tests below.
        Self::new(constants::DEFAULT_LOG_LINE_PATTERN).expect("built-in log-line pattern")
    }
}

/// First-stage verdict based on the file name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameVerdict {
    /// `.log` / `.logs` extension: a log file without further checks.
    LogExtension,
    /// Name contains a hint; the content decides.
    NeedsContentCheck,
    /// Not a log file.
    NotLog,
}

/// Classify `path` by extension and file name.
pub fn classify_name(path: &Path, config: &ClassifierConfig) -> NameVerdict {
    let has_log_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|e| constants::LOG_EXTENSIONS.contains(&e.as_str()));
    if has_log_extension {
        return NameVerdict::LogExtension;
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if config.name_hints.iter().any(|hint| name.contains(hint.as_str())) {
        NameVerdict::NeedsContentCheck
    } else {
        NameVerdict::NotLog
    }
}

/// Decide whether sampled lines look like a log.
///
/// Blank lines are skipped and do not count towards the sample; the first
/// `sample_lines` non-empty lines (trimmed) are tested against the log-line
/// pattern, which must match at the very start of the line.
pub fn has_log_format<'a, I>(lines: I, config: &ClassifierConfig) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let matches = lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(config.sample_lines)
        .filter(|line| matches_at_start(&config.log_line_pattern, line))
        .count();
    matches >= config.min_matching_lines
}

fn matches_at_start(regex: &Regex, line: &str) -> bool {
    regex.find(line).is_some_and(|m| m.start() == 0)
}

/// Returns true for directory names the scanner never descends into:
/// hidden directories and the fixed exclusion list.
pub fn is_skipped_dir_name(name: &str) -> bool {
    name.starts_with('.') || constants::EXCLUDED_DIR_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_log_extensions() {
        let config = ClassifierConfig::default();
        for name in ["app.log", "app.LOG", "service.logs"] {
            assert_eq!(
                classify_name(&PathBuf::from(name), &config),
                NameVerdict::LogExtension,
                "{name}"
            );
        }
    }

    #[test]
    fn test_name_hint_needs_content_check() {
        let config = ClassifierConfig::default();
        assert_eq!(
            classify_name(&PathBuf::from("mylog.txt"), &config),
            NameVerdict::NeedsContentCheck
        );
        assert_eq!(
            classify_name(&PathBuf::from("notes.txt"), &config),
            NameVerdict::NotLog
        );
        assert_eq!(
            classify_name(&PathBuf::from("notes.txt"), &config.with_txt_files()),
            NameVerdict::NeedsContentCheck
        );
    }

    #[test]
    fn test_two_of_five_lines_is_enough() {
        let config = ClassifierConfig::default();
        let lines = [
            "2024-01-15 10:00:00 INFO start",
            "plain text",
            "more text",
            "[2024-01-15 10:00:02] ERROR boom",
            "the end",
        ];
        assert!(has_log_format(lines, &config));
    }

    #[test]
    fn test_one_matching_line_is_not_enough() {
        let config = ClassifierConfig::default();
        let lines = [
            "2024-01-15 10:00:00 INFO start",
            "plain text",
            "more text",
            "still text",
            "the end",
        ];
        assert!(!has_log_format(lines, &config));
    }

    #[test]
    fn test_only_first_five_non_empty_lines_count() {
        let config = ClassifierConfig::default();
        let lines = [
            "",
            "a",
            "  ",
            "b",
            "c",
            "d",
            "2024-01-15 10:00:00 x",
            "e",
            "2024-01-15 10:00:01 y",
        ];
        // Five non-empty lines are a, b, c, d and the first timestamped one.
        assert!(!has_log_format(lines, &config));
    }

    #[test]
    fn test_blank_lines_skipped_and_lines_trimmed() {
        let config = ClassifierConfig::default();
        let lines = ["", "   12:30:45 tick", "", "Jan 15 12:30:01 host sshd", ""];
        assert!(has_log_format(lines, &config));
    }

    #[test]
    fn test_empty_sample_is_not_a_log() {
        let config = ClassifierConfig::default();
        assert!(!has_log_format(std::iter::empty(), &config));
    }

    #[test]
    fn test_timestamp_must_be_at_line_start() {
        let config = ClassifierConfig::default();
        let lines = ["msg at 2024-01-15 10:00:00", "msg at 2024-01-15 10:00:01"];
        assert!(!has_log_format(lines, &config));
    }

    #[test]
    fn test_custom_log_line_pattern() {
        let config = ClassifierConfig::new(r"^(INFO|WARN|ERROR)\s+").unwrap();
        assert!(has_log_format(["INFO up", "ERROR down"], &config));
        assert!(!has_log_format(["2024-01-15 INFO", "2024-01-15 ERROR"], &config));
    }

    #[test]
    fn test_custom_pattern_without_anchor_still_matches_at_start() {
        let config = ClassifierConfig::new(r"\[\w+\]").unwrap();
        assert!(has_log_format(["[INFO] a", "[ERROR] b"], &config));
        assert!(!has_log_format(["x [INFO] a", "y [ERROR] b"], &config));
    }

    #[test]
    fn test_invalid_log_line_pattern() {
        assert!(matches!(
            ClassifierConfig::new("^(unclosed"),
            Err(PatternError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_skipped_dir_names() {
        for name in [".git", ".cache", "node_modules", "__pycache__", "venv"] {
            assert!(is_skipped_dir_name(name), "{name}");
        }
        assert!(!is_skipped_dir_name("logs"));
        assert!(!is_skipped_dir_name("venv2"));
    }
}
