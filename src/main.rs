// LogWatch - main.rs
//
// Command-line driver. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation
// 3. Restoring persisted watcher state
// 4. Running a scan, a full rescan, or a live watch

use clap::{Parser, Subcommand};
use logwatch::app::scanner::LogScanner;
use logwatch::app::session::{self, SessionData};
use logwatch::app::watcher::{MultiLogWatcher, WatcherConfig};
use logwatch::core::classify::ClassifierConfig;
use logwatch::core::model::{ChangeSourceMode, MatchEvent, PatternSpec, ScanProgress};
use logwatch::platform::config::{self, AppConfig, PlatformPaths};
use logwatch::util::constants;
use logwatch::util::error::{LogWatchError, Result};
use logwatch::util::logging;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// LogWatch - incremental log tailing and error-pattern matching.
///
/// Watches directories of `*.log` files and individually indexed files,
/// reporting every newly appended line that matches an error pattern.
#[derive(Parser, Debug)]
#[command(name = "logwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    /// Additional directory to watch (repeatable).
    #[arg(long = "dir", global = true)]
    dirs: Vec<PathBuf>,

    /// Additional file to index (repeatable).
    #[arg(long = "file", global = true)]
    files: Vec<PathBuf>,

    /// Error pattern replacing the configured list (repeatable). Prefix with
    /// `^` for a regex.
    #[arg(short = 'p', long = "pattern", global = true)]
    patterns: Vec<String>,

    /// Only count matches at or after this time (YYYY-MM-DD HH:MM:SS).
    #[arg(long = "since", global = true)]
    since: Option<String>,

    /// Only count matches at or before this time (YYYY-MM-DD HH:MM:SS).
    #[arg(long = "until", global = true)]
    until: Option<String>,

    /// Force the polling change source.
    #[arg(long = "poll", global = true)]
    poll: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover log files under a directory.
    Scan {
        /// Directory to scan recursively.
        dir: PathBuf,

        /// Also content-check files whose name contains "txt".
        #[arg(long = "include-txt")]
        include_txt: bool,

        /// Add discovered files to the persisted index.
        #[arg(long = "add")]
        add: bool,
    },

    /// Recount every watched file from the beginning.
    Rescan,

    /// Tail watched files and print new matches as they appear.
    Watch {
        /// Stop after this many seconds (runs until interrupted if omitted).
        #[arg(long = "seconds")]
        seconds: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let paths = PlatformPaths::resolve();
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let (app_config, warnings) = config::load_config(&config_path);

    let log_guard = logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "LogWatch starting"
    );

    if let Err(e) = run(&cli, &app_config, &paths) {
        tracing::error!(error = %e, "LogWatch failed");
        eprintln!("Error: {e}");
        // exit() skips destructors; flush the file writer first.
        drop(log_guard);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, app_config: &AppConfig, paths: &PlatformPaths) -> Result<()> {
    let state_path = session::session_path(&paths.data_dir);
    let mut state = session::load(&state_path).unwrap_or_default();

    match &cli.command {
        Command::Scan {
            dir,
            include_txt,
            add,
        } => {
            let found = run_scan(&absolute(dir), app_config, *include_txt)?;
            if *add {
                for path in &found {
                    state.files.entry(path.clone()).or_default();
                }
                session::save(&state, &state_path)?;
                println!("Indexed {} file(s).", found.len());
            }
            Ok(())
        }
        Command::Rescan => {
            let watcher = build_watcher(cli, app_config, &state)?;
            watcher.reindex_all_files(
                |p| tracing::debug!(progress = p, "Rescan progress"),
                print_event,
            );
            print_counts(&watcher);
            session::save(&SessionData::new(watcher.get_file_state()), &state_path)?;
            Ok(())
        }
        Command::Watch { seconds } => {
            let watcher = build_watcher(cli, app_config, &state)?;
            run_watch(&watcher, *seconds, &state_path)
        }
    }
}

/// Configure a watcher from config, CLI overrides and persisted state.
fn build_watcher(
    cli: &Cli,
    app_config: &AppConfig,
    state: &SessionData,
) -> Result<MultiLogWatcher> {
    let mode = if cli.poll {
        ChangeSourceMode::Poll
    } else {
        app_config.watcher_mode
    };
    let watcher = MultiLogWatcher::with_config(WatcherConfig {
        mode,
        poll_interval: Duration::from_millis(app_config.poll_interval_ms),
    });

    let specs: Vec<PatternSpec> = if cli.patterns.is_empty() {
        app_config.error_patterns.clone()
    } else {
        cli.patterns.iter().map(PatternSpec::new).collect()
    };
    watcher.set_error_patterns(&specs)?;

    let start = match &cli.since {
        Some(s) => Some(config::parse_datetime("--since", s)?),
        None => app_config.filter_start,
    };
    let end = match &cli.until {
        Some(s) => Some(config::parse_datetime("--until", s)?),
        None => app_config.filter_end,
    };
    watcher.set_datetime_filter(start, end);

    watcher.set_directories(
        app_config
            .directories
            .iter()
            .chain(&cli.dirs)
            .map(|d| absolute(d)),
    );
    watcher.set_indexed_files(
        state
            .indexed_files()
            .iter()
            .chain(&cli.files)
            .map(|f| absolute(f)),
    );
    watcher.restore_file_state(&state.files);

    tracing::info!(
        directories = watcher.directories().len(),
        indexed = watcher.indexed_files().len(),
        patterns = specs.len(),
        "Watcher configured"
    );
    Ok(watcher)
}

fn run_scan(
    root: &Path,
    app_config: &AppConfig,
    include_txt: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::read_dir(root).map_err(|e| LogWatchError::Io {
        path: root.to_path_buf(),
        operation: "scan",
        source: e,
    })?;

    let mut classifier = match &app_config.log_line_pattern {
        Some(pattern) => ClassifierConfig::new(pattern)?,
        None => ClassifierConfig::default(),
    };
    if include_txt || app_config.include_txt {
        classifier = classifier.with_txt_files();
    }

    let mut scanner = LogScanner::new(classifier);
    scanner.start_scan(root);

    let mut found = Vec::new();
    let mut handle = |msg: ScanProgress| match msg {
        ScanProgress::Found(path) => {
            println!("{}", path.display());
            found.push(path);
            false
        }
        ScanProgress::Progress(p) => {
            tracing::debug!(progress = p, "Scan progress");
            false
        }
        ScanProgress::Done { total_found } => {
            println!("Found {total_found} log file(s) under {}.", root.display());
            true
        }
    };

    let tick = Duration::from_millis(constants::WATCH_CANCEL_CHECK_INTERVAL_MS);
    loop {
        match scanner.recv_progress_timeout(tick) {
            Some(msg) => {
                if handle(msg) {
                    break;
                }
            }
            None if !scanner.is_scanning() => {
                // Pick up anything sent between the timeout and thread exit.
                scanner.poll_progress().into_iter().for_each(|msg| {
                    handle(msg);
                });
                break;
            }
            None => {}
        }
    }
    scanner.stop();
    Ok(found)
}

fn run_watch(
    watcher: &MultiLogWatcher,
    seconds: Option<u64>,
    state_path: &Path,
) -> Result<()> {
    watcher.reindex_from_positions(|p| tracing::debug!(progress = p, "Catch-up progress"));
    print_counts(watcher);

    let kind = watcher.start()?;
    println!(
        "Watching {} file(s) using {kind}.",
        watcher.watched_files().len()
    );

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let save_interval = Duration::from_secs(constants::STATE_SAVE_INTERVAL_SECS);
    let tick = Duration::from_millis(constants::WATCH_CANCEL_CHECK_INTERVAL_MS);
    let mut last_save = Instant::now();

    while deadline.map_or(true, |d| Instant::now() < d) {
        if let Some(event) = watcher.recv_event_timeout(tick) {
            print_event(&event);
            for event in watcher.poll_events() {
                print_event(&event);
            }
        }
        if last_save.elapsed() >= save_interval {
            save_state(watcher, state_path);
            last_save = Instant::now();
        }
    }

    watcher.stop();
    session::save(&SessionData::new(watcher.get_file_state()), state_path)?;
    println!("Total matches: {}", watcher.get_total_error_count());
    Ok(())
}

/// Periodic save; a failure is logged and retried at the next interval.
fn save_state(watcher: &MultiLogWatcher, state_path: &Path) {
    if let Err(e) = session::save(&SessionData::new(watcher.get_file_state()), state_path) {
        tracing::warn!(error = %e, "Could not save watcher state");
    }
}

fn print_event(event: &MatchEvent) {
    println!(
        "{}:{}: {} [{}]",
        event.file_name,
        event.line_number,
        event.text,
        event.matched_patterns.join(", ")
    );
}

fn print_counts(watcher: &MultiLogWatcher) {
    for path in watcher.watched_files() {
        let count = watcher.get_error_count(&path);
        if count > 0 {
            println!("{:>6}  {}", count, path.display());
        }
    }
    println!("{:>6}  total", watcher.get_total_error_count());
}

/// Resolve `path` against the current directory so it compares equal to the
/// absolute paths reported by OS file events.
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
