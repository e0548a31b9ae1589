// LogWatch - app/watcher.rs
//
// Multi-file watcher: owns the watch targets, the active match rules and the
// per-file tail state, and drives them from a change source or from explicit
// reindex requests.
//
// Architecture:
//   - `WatchCore` is shared (Arc) between the public `MultiLogWatcher` and
//     the change-source thread. Three independent mutexes guard targets,
//     rules and tail state; no code path holds two of them at once.
//   - Match events go out over an mpsc channel and are sent only after the
//     tail lock is released, so a slow consumer never stalls accessors.
//   - All public methods take `&self`, so a watcher can be shared with a
//     thread that runs a reindex while another thread reads counts.
//
// Error handling: per-file I/O failures are logged and skipped (see
// app::tail). Only invalid patterns and a failed native backend (when native
// mode is forced) reach the caller.

use crate::app::change_source::{ChangeSource, ChangeSourceKind, NativeSource, PollSource};
use crate::app::tail::{MatchRules, TailState};
use crate::core::model::{
    ChangeSourceMode, DatetimeRange, FileState, MatchEvent, MatchedLine, PatternSpec,
};
use crate::core::pattern::PatternSet;
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::{PatternError, WatchError};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub mode: ChangeSourceMode,
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: ChangeSourceMode::Auto,
            poll_interval: Duration::from_millis(constants::WATCH_POLL_INTERVAL_MS),
        }
    }
}

// =============================================================================
// Shared core
// =============================================================================

#[derive(Debug, Default)]
struct WatchTargets {
    dirs: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
}

/// State shared with the change-source threads.
pub struct WatchCore {
    targets: Mutex<WatchTargets>,
    rules: Mutex<MatchRules>,
    tail: Mutex<TailState>,
    events_tx: mpsc::Sender<MatchEvent>,
}

/// Glob selecting the files tailed inside a watched directory.
fn watched_file_glob() -> &'static glob::Pattern {
    static CELL: OnceLock<glob::Pattern> = OnceLock::new();
    CELL.get_or_init(|| {
        // Fixed glob, covered by the unit tests below.
        glob::Pattern::new(constants::WATCHED_FILE_GLOB).expect("built-in watched-file glob")
    })
}

/// Lock a mutex, recovering the data if another thread panicked while
/// holding it. The guarded values stay structurally valid in that case.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WatchCore {
    fn new(events_tx: mpsc::Sender<MatchEvent>) -> Self {
        Self {
            targets: Mutex::new(WatchTargets::default()),
            rules: Mutex::new(MatchRules::default()),
            tail: Mutex::new(TailState::new()),
            events_tx,
        }
    }

    fn rules(&self) -> MatchRules {
        lock(&self.rules).clone()
    }

    /// True if `path` is an indexed file, or a `.log` file under a watched
    /// directory.
    pub fn should_watch_file(&self, path: &Path) -> bool {
        let targets = lock(&self.targets);
        if targets.files.contains(path) {
            return true;
        }
        let is_log = path
            .extension()
            .is_some_and(|e| e == constants::WATCHED_FILE_EXTENSION);
        is_log && targets.dirs.iter().any(|dir| path.starts_with(dir))
    }

    /// Every `*.log` directly inside a watched directory plus every indexed
    /// file, de-duplicated and sorted.
    pub fn watched_files(&self) -> BTreeSet<PathBuf> {
        let (dirs, mut files) = {
            let targets = lock(&self.targets);
            (targets.dirs.clone(), targets.files.clone())
        };
        for dir in &dirs {
            files.extend(fs::list_matching_files(dir, watched_file_glob()));
        }
        files
    }

    /// Directories to register: existing watched directories plus existing
    /// parents of indexed files.
    pub fn watch_roots(&self) -> BTreeSet<PathBuf> {
        let targets = lock(&self.targets);
        let parents = targets
            .files
            .iter()
            .filter_map(|f| f.parent())
            .filter(|p| !p.as_os_str().is_empty());
        targets
            .dirs
            .iter()
            .map(PathBuf::as_path)
            .chain(parents)
            .filter(|p| p.is_dir())
            .map(Path::to_path_buf)
            .collect()
    }

    /// Incrementally check one file and publish its events.
    pub fn check_file(&self, path: &Path) -> usize {
        let rules = self.rules();
        let events = lock(&self.tail).check(path, &rules);
        self.publish(events)
    }

    /// One sweep over the whole watched set.
    pub fn check_all_files(&self) -> usize {
        self.watched_files()
            .iter()
            .map(|path| self.check_file(path))
            .sum()
    }

    /// Entry point for change notifications.
    pub fn handle_change(&self, path: &Path) {
        if self.should_watch_file(path) {
            self.check_file(path);
        }
    }

    fn publish(&self, events: Vec<MatchEvent>) -> usize {
        let count = events.len();
        for event in events {
            if self.events_tx.send(event).is_err() {
                // Receiver dropped together with the watcher.
                break;
            }
        }
        count
    }
}

// =============================================================================
// MultiLogWatcher
// =============================================================================

/// Watches directories and individually indexed files for new pattern
/// matches.
///
/// Lifecycle: `Stopped -> start() -> Running -> stop() -> Stopped`. Targets,
/// rules and counts can be changed in either state.
pub struct MultiLogWatcher {
    core: Arc<WatchCore>,
    events_rx: Mutex<mpsc::Receiver<MatchEvent>>,
    source: Mutex<Option<Box<dyn ChangeSource>>>,
    config: WatcherConfig,
}

impl MultiLogWatcher {
    /// Watcher with default patterns, no datetime filter and `Auto` mode.
    pub fn new() -> Self {
        Self::with_config(WatcherConfig::default())
    }

    pub fn with_config(config: WatcherConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            core: Arc::new(WatchCore::new(tx)),
            events_rx: Mutex::new(rx),
            source: Mutex::new(None),
            config,
        }
    }

    // -------------------------------------------------------------------------
    // Targets and rules
    // -------------------------------------------------------------------------

    /// Replace the watched directory set.
    pub fn set_directories<I, P>(&self, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let dirs: BTreeSet<PathBuf> = dirs.into_iter().map(Into::into).collect();
        tracing::debug!(count = dirs.len(), "Watched directories replaced");
        lock(&self.core.targets).dirs = dirs;
        self.sync_watches();
    }

    /// Replace the indexed file set.
    pub fn set_indexed_files<I, P>(&self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let files: BTreeSet<PathBuf> = files.into_iter().map(Into::into).collect();
        tracing::debug!(count = files.len(), "Indexed files replaced");
        lock(&self.core.targets).files = files;
        self.sync_watches();
    }

    /// Add one indexed file.
    pub fn add_indexed_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!(file = %path.display(), "Indexed file added");
        lock(&self.core.targets).files.insert(path);
        self.sync_watches();
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        lock(&self.core.targets).dirs.iter().cloned().collect()
    }

    pub fn indexed_files(&self) -> Vec<PathBuf> {
        lock(&self.core.targets).files.iter().cloned().collect()
    }

    /// Every file a polling sweep would check right now.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.core.watched_files().into_iter().collect()
    }

    /// Compile and install a new pattern list. On error the previous
    /// patterns stay active. Existing counts are not recomputed.
    pub fn set_error_patterns(&self, specs: &[PatternSpec]) -> Result<(), PatternError> {
        let patterns = PatternSet::compile(specs)?;
        tracing::info!(count = patterns.len(), "Error patterns updated");
        lock(&self.core.rules).patterns = Arc::new(patterns);
        Ok(())
    }

    /// Install a new datetime window. Existing counts are not recomputed.
    pub fn set_datetime_filter(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) {
        tracing::debug!(?start, ?end, "Datetime filter updated");
        lock(&self.core.rules).range = DatetimeRange::new(start, end);
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start the change source. A no-op returning the running kind if the
    /// watcher is already running.
    ///
    /// Every currently watched file is checked once first so it has a
    /// baseline before the first notification arrives.
    pub fn start(&self) -> Result<ChangeSourceKind, WatchError> {
        let mut slot = lock(&self.source);
        if let Some(source) = slot.as_ref() {
            return Ok(source.kind());
        }

        self.core.check_all_files();

        let core = Arc::clone(&self.core);
        let interval = self.config.poll_interval;
        let mut source: Box<dyn ChangeSource> = match self.config.mode {
            ChangeSourceMode::Poll => Box::new(PollSource::start(core, interval)),
            ChangeSourceMode::Native => Box::new(NativeSource::start(core)?),
            ChangeSourceMode::Auto => match NativeSource::start(Arc::clone(&core)) {
                Ok(native) => Box::new(native),
                Err(e) => {
                    tracing::warn!(error = %e, "Native file events unavailable; polling instead");
                    Box::new(PollSource::start(core, interval))
                }
            },
        };
        source.sync_watches(&self.core.watch_roots());

        let kind = source.kind();
        *slot = Some(source);
        tracing::info!(source = %kind, "Watcher started");
        Ok(kind)
    }

    /// Stop the change source and release its registrations. Waits at most
    /// `WATCHER_STOP_TIMEOUT_SECS` for the background thread.
    pub fn stop(&self) {
        let source = lock(&self.source).take();
        if let Some(source) = source {
            let kind = source.kind();
            let joined =
                source.shutdown(Duration::from_secs(constants::WATCHER_STOP_TIMEOUT_SECS));
            tracing::info!(source = %kind, joined, "Watcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.source).is_some()
    }

    fn sync_watches(&self) {
        let mut slot = lock(&self.source);
        if let Some(source) = slot.as_mut() {
            source.sync_watches(&self.core.watch_roots());
        }
    }

    // -------------------------------------------------------------------------
    // Change handling
    // -------------------------------------------------------------------------

    /// Feed an external change notification. Irrelevant paths are ignored.
    pub fn notify_changed(&self, path: &Path) {
        self.core.handle_change(path);
    }

    pub fn should_watch_file(&self, path: &Path) -> bool {
        self.core.should_watch_file(path)
    }

    /// Check one file now; returns the number of events published.
    pub fn check_file(&self, path: &Path) -> usize {
        self.core.check_file(path)
    }

    /// Check every watched file now; returns the number of events published.
    pub fn check_all_files(&self) -> usize {
        self.core.check_all_files()
    }

    /// Drain pending match events without blocking.
    pub fn poll_events(&self) -> Vec<MatchEvent> {
        let rx = lock(&self.events_rx);
        rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next match event.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<MatchEvent> {
        lock(&self.events_rx).recv_timeout(timeout).ok()
    }

    // -------------------------------------------------------------------------
    // Reindexing
    // -------------------------------------------------------------------------

    /// Catch up every watched file from its saved position, rebuilding
    /// counts and buffered lines. Reports `(idx + 1) / total` after each file.
    pub fn reindex_from_positions(&self, mut on_progress: impl FnMut(f64)) {
        let files = self.core.watched_files();
        let total = files.len();
        tracing::info!(files = total, "Reindexing from saved positions");
        let rules = self.core.rules();
        for (idx, path) in files.iter().enumerate() {
            lock(&self.core.tail).reindex_from_position(path, &rules);
            on_progress((idx + 1) as f64 / total as f64);
        }
    }

    /// Discard all per-file state and rebuild every watched file from byte 0.
    /// `on_match` is called for every qualifying line.
    pub fn reindex_all_files(
        &self,
        mut on_progress: impl FnMut(f64),
        mut on_match: impl FnMut(&MatchEvent),
    ) {
        let files = self.core.watched_files();
        let total = files.len();
        tracing::info!(files = total, "Reindexing all files");
        let rules = self.core.rules();
        lock(&self.core.tail).clear();
        for (idx, path) in files.iter().enumerate() {
            let events = lock(&self.core.tail).reindex_full(path, &rules);
            for event in &events {
                on_match(event);
            }
            on_progress((idx + 1) as f64 / total as f64);
        }
    }

    // -------------------------------------------------------------------------
    // Counts and state
    // -------------------------------------------------------------------------

    pub fn get_error_count(&self, path: &Path) -> u64 {
        lock(&self.core.tail).match_count(path)
    }

    pub fn get_total_error_count(&self) -> u64 {
        lock(&self.core.tail).total_match_count()
    }

    pub fn get_matched_lines(&self, path: &Path) -> Vec<MatchedLine> {
        lock(&self.core.tail).matched_lines(path)
    }

    /// Sorted files with at least one buffered match for `pattern` (a raw
    /// pattern string as configured).
    pub fn get_files_for_pattern(&self, pattern: &str) -> Vec<PathBuf> {
        lock(&self.core.tail).files_for_pattern(pattern)
    }

    pub fn reset_counts(&self) {
        lock(&self.core.tail).reset_all();
    }

    pub fn reset_file_count(&self, path: &Path) {
        lock(&self.core.tail).reset_file(path);
    }

    pub fn get_file_state(&self) -> BTreeMap<PathBuf, FileState> {
        lock(&self.core.tail).export_state()
    }

    pub fn restore_file_state(&self, state: &BTreeMap<PathBuf, FileState>) {
        lock(&self.core.tail).restore_state(state);
    }
}

impl Default for MultiLogWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MultiLogWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Unit tests
// =============================================================================
