// LogWatch - platform/config.rs
//
// Platform directory resolution and config.toml loading with startup
// validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::model::{ChangeSourceMode, PatternSpec};
use crate::util::constants;
use crate::util::error::ConfigError;
use chrono::NaiveDateTime;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for LogWatch configuration and state.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logwatch/)
    pub config_dir: PathBuf,

    /// Data directory holding persisted watcher state.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be
    /// determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();
            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                "Platform paths resolved"
            );
            Self {
                config_dir,
                data_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback,
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub watch: WatchSection,
    pub patterns: PatternsSection,
    pub scanner: ScannerSection,
    pub filter: FilterSection,
    pub watcher: WatcherSection,
    pub logging: LoggingSection,
}

/// `[watch]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Directories whose `*.log` children are watched.
    pub directories: Option<Vec<PathBuf>>,
    /// Legacy single-directory key, folded into `directories`.
    pub log_dir: Option<PathBuf>,
}

/// `[patterns]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct PatternsSection {
    /// Ordered error patterns: bare strings or `{ title, pattern }` tables.
    pub error_patterns: Option<Vec<PatternSpec>>,
}

/// `[scanner]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ScannerSection {
    /// Regex a sampled line must match at its start to look like a log line.
    pub log_line_pattern: Option<String>,
    /// Also content-check files whose name contains "txt".
    pub include_txt: Option<bool>,
}

/// `[filter]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct FilterSection {
    /// Inclusive lower bound, `YYYY-MM-DD HH:MM:SS`.
    pub start: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD HH:MM:SS`.
    pub end: Option<String>,
}

/// `[watcher]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// "auto", "native" or "poll".
    pub mode: Option<String>,
    /// Poll interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
/// Pattern strings are kept uncompiled: an invalid regex must reach the
/// caller as an error, not be replaced by a default here.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Watch targets --
    pub directories: Vec<PathBuf>,

    // -- Matching --
    pub error_patterns: Vec<PatternSpec>,
    pub filter_start: Option<NaiveDateTime>,
    pub filter_end: Option<NaiveDateTime>,

    // -- Scanner --
    pub log_line_pattern: Option<String>,
    pub include_txt: bool,

    // -- Watcher --
    pub watcher_mode: ChangeSourceMode,
    pub poll_interval_ms: u64,

    // -- Logging --
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            error_patterns: PatternSpec::defaults(),
            filter_start: None,
            filter_end: None,
            log_line_pattern: None,
            include_txt: false,
            watcher_mode: ChangeSourceMode::Auto,
            poll_interval_ms: constants::WATCH_POLL_INTERVAL_MS,
            log_level: None,
            log_file: None,
        }
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` datetime, naming `field` in the error.
pub fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, ConfigError> {
    NaiveDateTime::parse_from_str(value.trim(), constants::DATETIME_FORMAT).map_err(|e| {
        ConfigError::InvalidDatetime {
            field: field.to_string(),
            value: value.to_string(),
            source: e,
        }
    })
}

/// Load and validate the config file at `path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings (first run). An unreadable
/// or unparseable file yields defaults plus a warning describing the problem.
pub fn load_config(path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            let err = ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            };
            warnings.push(format!("{err}. Using defaults."));
            return (AppConfig::default(), warnings);
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            let err = ConfigError::TomlParse {
                path: path.to_path_buf(),
                source: e,
            };
            warnings.push(format!("{err}. Using defaults."));
            return (AppConfig::default(), warnings);
        }
    };

    let config = validate(raw, &mut warnings);
    tracing::info!(
        path = %path.display(),
        directories = config.directories.len(),
        patterns = config.error_patterns.len(),
        "Loaded config.toml"
    );
    (config, warnings)
}

/// Turn a parsed `RawConfig` into an `AppConfig`, accumulating warnings.
pub fn validate(raw: RawConfig, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Watch: directories (+ legacy log_dir) --
    let mut directories = raw.watch.directories.unwrap_or_default();
    if let Some(old) = raw.watch.log_dir.filter(|p| !p.as_os_str().is_empty()) {
        if !directories.contains(&old) {
            tracing::info!(dir = %old.display(), "Migrating legacy [watch] log_dir");
            directories.push(old);
        }
    }
    directories.retain(|d| !d.as_os_str().is_empty());
    config.directories = directories;

    // -- Patterns: error_patterns --
    if let Some(patterns) = raw.patterns.error_patterns {
        let patterns: Vec<PatternSpec> = patterns
            .into_iter()
            .filter(|p| !p.pattern.is_empty())
            .collect();
        if patterns.is_empty() {
            warnings.push(
                "[patterns] error_patterns is empty. Using the default patterns.".to_string(),
            );
        } else {
            config.error_patterns = patterns;
        }
    }

    // -- Scanner --
    config.log_line_pattern = raw.scanner.log_line_pattern.filter(|p| !p.is_empty());
    config.include_txt = raw.scanner.include_txt.unwrap_or(false);

    // -- Filter: start / end --
    config.filter_start = raw
        .filter
        .start
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| match parse_datetime("[filter] start", &s) {
            Ok(dt) => Some(dt),
            Err(e) => {
                warnings.push(format!("{e}. Ignoring the lower bound."));
                None
            }
        });
    config.filter_end = raw
        .filter
        .end
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| match parse_datetime("[filter] end", &s) {
            Ok(dt) => Some(dt),
            Err(e) => {
                warnings.push(format!("{e}. Ignoring the upper bound."));
                None
            }
        });
    if let (Some(start), Some(end)) = (config.filter_start, config.filter_end) {
        if start > end {
            warnings.push(format!(
                "[filter] start ({start}) is after end ({end}); only lines without a \
                 timestamp can match."
            ));
        }
    }

    // -- Watcher: mode --
    if let Some(ref mode) = raw.watcher.mode {
        match ChangeSourceMode::parse(mode) {
            Some(m) => config.watcher_mode = m,
            None => warnings.push(format!(
                "[watcher] mode = \"{mode}\" is not recognised. \
                 Expected \"auto\", \"native\" or \"poll\". Using default (auto).",
            )),
        }
    }

    // -- Watcher: poll_interval_ms --
    if let Some(ms) = raw.watcher.poll_interval_ms {
        if (constants::MIN_WATCH_POLL_INTERVAL_MS..=constants::MAX_WATCH_POLL_INTERVAL_MS)
            .contains(&ms)
        {
            config.poll_interval_ms = ms;
        } else {
            warnings.push(format!(
                "[watcher] poll_interval_ms = {ms} is out of range ({}-{}). Using default ({}).",
                constants::MIN_WATCH_POLL_INTERVAL_MS,
                constants::MAX_WATCH_POLL_INTERVAL_MS,
                constants::WATCH_POLL_INTERVAL_MS,
            ));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load_str(toml_text: &str) -> (AppConfig, Vec<String>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(constants::CONFIG_FILE_NAME);
        std::fs::write(&path, toml_text).unwrap();
        load_config(&path)
    }

    #[test]
    fn test_missing_file_gives_defaults_without_warnings() {
        let dir = TempDir::new().unwrap();
        let (config, warnings) = load_config(&dir.path().join("nope.toml"));
        assert!(warnings.is_empty());
        assert!(config.directories.is_empty());
        assert_eq!(config.error_patterns.len(), 5);
        assert_eq!(config.poll_interval_ms, constants::WATCH_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_full_config() {
        let (config, warnings) = load_str(
            r#"
[watch]
directories = ["/var/log/app"]

[patterns]
error_patterns = ["error", { title = "Timeouts", pattern = "^.*timeout" }]

[scanner]
log_line_pattern = '^\d{4}'
include_txt = true

[filter]
start = "2024-01-10 00:00:00"
end = "2024-01-20 00:00:00"

[watcher]
mode = "poll"
poll_interval_ms = 250

[logging]
level = "DEBUG"
file = "/tmp/logwatch.log"
"#,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.directories, vec![PathBuf::from("/var/log/app")]);
        assert_eq!(
            config.error_patterns,
            vec![
                PatternSpec::titled("Error", "error"),
                PatternSpec::titled("Timeouts", "^.*timeout"),
            ]
        );
        assert_eq!(config.log_line_pattern.as_deref(), Some(r"^\d{4}"));
        assert!(config.include_txt);
        assert!(config.filter_start.is_some() && config.filter_end.is_some());
        assert_eq!(config.watcher_mode, ChangeSourceMode::Poll);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.log_file.as_deref(), Some("/tmp/logwatch.log"));
    }

    #[test]
    fn test_legacy_log_dir_is_migrated() {
        let (config, warnings) = load_str("[watch]\nlog_dir = \"/var/log/old\"\n");
        assert!(warnings.is_empty());
        assert_eq!(config.directories, vec![PathBuf::from("/var/log/old")]);
    }

    #[test]
    fn test_invalid_values_warn_and_fall_back() {
        let (config, warnings) = load_str(
            r#"
[filter]
start = "yesterday"

[watcher]
mode = "fsevents"
poll_interval_ms = 5

[logging]
level = "loud"
"#,
        );
        assert_eq!(warnings.len(), 4, "{warnings:?}");
        assert!(config.filter_start.is_none());
        assert_eq!(config.watcher_mode, ChangeSourceMode::Auto);
        assert_eq!(config.poll_interval_ms, constants::WATCH_POLL_INTERVAL_MS);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_empty_pattern_list_keeps_defaults() {
        let (config, warnings) = load_str("[patterns]\nerror_patterns = [\"\"]\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.error_patterns, PatternSpec::defaults());
    }

    #[test]
    fn test_unparseable_toml_warns() {
        let (config, warnings) = load_str("[watch\ndirectories = 3");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("parse error"), "{}", warnings[0]);
        assert!(config.directories.is_empty());
    }

    #[test]
    fn test_parse_datetime() {
        assert!(parse_datetime("--since", "2024-01-15 10:00:00").is_ok());
        let err = parse_datetime("--since", "2024-01-15").unwrap_err();
        assert!(err.to_string().contains("--since"));
    }
}
