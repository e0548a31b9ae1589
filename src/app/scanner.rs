// LogWatch - app/scanner.rs
//
// Log file discovery: walks a directory tree on a background thread and
// reports every file that looks like a log.
//
// Architecture:
//   - `LogScanner` owns the worker thread and the receiving end of the
//     progress channel; the caller polls it (`poll_progress`) or blocks on
//     `recv_progress_timeout`.
//   - `scan_directory` is the synchronous pipeline the thread runs, also
//     usable directly by callers that manage their own thread.
//   - Two passes: a depth-limited directory count seeds the progress
//     denominator, then an unbounded walk classifies files. Both passes prune
//     hidden and excluded directories via `filter_entry`, so those subtrees
//     are never read.
//
// Error handling: unreadable directories and files are skipped. A scan never
// aborts early except on cancellation, and always ends with `Done`.

use crate::app::worker::Worker;
use crate::core::classify::{self, ClassifierConfig, NameVerdict};
use crate::core::model::ScanProgress;
use crate::platform::fs;
use crate::util::constants::{
    CLASSIFY_MAX_SAMPLE_BYTES, SCAN_ESTIMATE_MAX_DEPTH, SCAN_PROGRESS_CAP, SCAN_STOP_TIMEOUT_SECS,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use walkdir::{DirEntry, WalkDir};

// =============================================================================
// LogScanner
// =============================================================================

/// Background log-file scanner. One scan at a time per instance.
pub struct LogScanner {
    config: Arc<ClassifierConfig>,
    progress_rx: Option<mpsc::Receiver<ScanProgress>>,
    worker: Option<Worker>,
}

impl LogScanner {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config: Arc::new(config),
            progress_rx: None,
            worker: None,
        }
    }

    /// Start scanning `root` in the background.
    ///
    /// Returns false (and does nothing) if a scan is already running.
    pub fn start_scan(&mut self, root: impl Into<PathBuf>) -> bool {
        if self.is_scanning() {
            tracing::debug!("Scan already running; start ignored");
            return false;
        }

        let root = root.into();
        let (tx, rx) = mpsc::channel();
        let config = Arc::clone(&self.config);

        tracing::info!(root = %root.display(), "Scan started");
        self.progress_rx = Some(rx);
        self.worker = Some(Worker::spawn("logwatch-scan", move |cancel| {
            scan_directory(&root, &config, &cancel, |msg| {
                // A dropped receiver only means nobody is listening any more.
                let _ = tx.send(msg);
            });
        }));
        true
    }

    /// Request cancellation and wait up to `SCAN_STOP_TIMEOUT_SECS` for the
    /// scan thread. `Done` is still delivered on the progress channel.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let joined = worker.stop(Duration::from_secs(SCAN_STOP_TIMEOUT_SECS));
            tracing::info!(joined, "Scan stopped");
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Drain all pending progress messages without blocking.
    pub fn poll_progress(&self) -> Vec<ScanProgress> {
        self.progress_rx
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }

    /// Wait up to `timeout` for the next progress message.
    pub fn recv_progress_timeout(&self, timeout: Duration) -> Option<ScanProgress> {
        self.progress_rx.as_ref()?.recv_timeout(timeout).ok()
    }
}

impl Default for LogScanner {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl Drop for LogScanner {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel();
        }
    }
}

// =============================================================================
// Scan pipeline
// =============================================================================

/// Walk `root` and report discoveries through `emit`. Returns the number of
/// log files found.
///
/// Message order: `Progress(0.0)`, then interleaved `Found` / `Progress`
/// (capped at 0.99), then `Progress(1.0)` if the walk completed, and always a
/// final `Done`.
pub fn scan_directory(
    root: &Path,
    config: &ClassifierConfig,
    cancel: &AtomicBool,
    mut emit: impl FnMut(ScanProgress),
) -> usize {
    let mut found = 0usize;

    if !root.is_dir() {
        tracing::warn!(root = %root.display(), "Scan root is not a directory");
        emit(ScanProgress::Done { total_found: 0 });
        return 0;
    }

    let total_dirs = estimate_directories(root, cancel);
    tracing::debug!(root = %root.display(), total_dirs, "Directory estimate");
    emit(ScanProgress::Progress(0.0));

    let mut scanned_dirs = 0usize;
    let mut completed = true;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(is_walkable);

    for entry in walker {
        if cancel.load(Ordering::SeqCst) {
            completed = false;
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            scanned_dirs += 1;
            if total_dirs > 0 {
                let fraction = (scanned_dirs as f64 / total_dirs as f64).min(SCAN_PROGRESS_CAP);
                emit(ScanProgress::Progress(fraction));
            }
        } else if file_type.is_file() && is_log_file(entry.path(), config) {
            found += 1;
            tracing::debug!(file = %entry.path().display(), "Log file found");
            emit(ScanProgress::Found(entry.path().to_path_buf()));
        }
    }

    if completed {
        emit(ScanProgress::Progress(1.0));
    }
    tracing::info!(
        root = %root.display(),
        found,
        scanned_dirs,
        completed,
        "Scan finished"
    );
    emit(ScanProgress::Done { total_found: found });
    found
}

/// Count directories up to `SCAN_ESTIMATE_MAX_DEPTH` (root included),
/// applying the same pruning as the main walk.
pub fn estimate_directories(root: &Path, cancel: &AtomicBool) -> usize {
    let mut count = 0usize;
    let walker = WalkDir::new(root)
        .max_depth(SCAN_ESTIMATE_MAX_DEPTH)
        .follow_links(false)
        .into_iter()
        .filter_entry(is_walkable);
    for entry in walker.flatten() {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        if entry.file_type().is_dir() {
            count += 1;
        }
    }
    count
}

/// Decide whether the file at `path` is a log file: by extension, or by a
/// content check when the name carries a hint.
pub fn is_log_file(path: &Path, config: &ClassifierConfig) -> bool {
    match classify::classify_name(path, config) {
        NameVerdict::LogExtension => true,
        NameVerdict::NotLog => false,
        NameVerdict::NeedsContentCheck => {
            match fs::sample_non_empty_lines(path, config.sample_lines, CLASSIFY_MAX_SAMPLE_BYTES)
            {
                Ok(lines) => classify::has_log_format(lines.iter().map(String::as_str), config),
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "Cannot sample file");
                    false
                }
            }
        }
    }
}

/// `filter_entry` predicate: the root is always walked; below it, hidden and
/// excluded directories are pruned. Files are never pruned here.
fn is_walkable(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    !entry
        .file_name()
        .to_str()
        .is_some_and(classify::is_skipped_dir_name)
}

// =============================================================================
// Unit tests
// =============================================================================
