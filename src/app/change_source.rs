// LogWatch - app/change_source.rs
//
// Change-notification strategies behind `MultiLogWatcher`.
//
// Both implementations end in `WatchCore`, so match semantics are identical
// and only latency differs:
//   - `NativeSource`: OS file events via the `notify` crate. The notify
//     callback only forwards paths over a channel; a dispatcher thread runs
//     the filter and the file check, keeping file I/O off the backend's
//     event thread.
//   - `PollSource`: one full sweep of the watched file set per interval.

use crate::app::watcher::WatchCore;
use crate::app::worker::{sleep_cancellable, Worker};
use crate::util::constants::WATCH_CANCEL_CHECK_INTERVAL_MS;
use crate::util::error::WatchError;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// The backend actually running after `MultiLogWatcher::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSourceKind {
    Native,
    Poll,
}

impl fmt::Display for ChangeSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native file events"),
            Self::Poll => write!(f, "polling"),
        }
    }
}

/// A running change-notification backend.
pub trait ChangeSource: Send {
    fn kind(&self) -> ChangeSourceKind;

    /// Make the set of registered directories equal to `roots`.
    fn sync_watches(&mut self, roots: &BTreeSet<PathBuf>);

    /// Release all registrations and wait up to `timeout` for the background
    /// thread. Returns false if the thread had to be detached.
    fn shutdown(self: Box<Self>, timeout: Duration) -> bool;
}

// =============================================================================
// Native OS events
// =============================================================================

pub struct NativeSource {
    watcher: RecommendedWatcher,
    registered: BTreeSet<PathBuf>,
    dispatcher: Worker,
}

impl NativeSource {
    /// Create the OS watcher and the dispatcher thread. No directory is
    /// registered until `sync_watches`.
    pub fn start(core: Arc<WatchCore>) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel::<PathBuf>();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths {
                            // Receiver gone means the source is shutting down.
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        })?;

        let dispatcher = Worker::spawn("logwatch-events", move |cancel| {
            let tick = Duration::from_millis(WATCH_CANCEL_CHECK_INTERVAL_MS);
            while !cancel.load(Ordering::SeqCst) {
                match rx.recv_timeout(tick) {
                    Ok(path) => core.handle_change(&path),
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Event dispatcher stopped");
        });

        Ok(Self {
            watcher,
            registered: BTreeSet::new(),
            dispatcher,
        })
    }
}

impl ChangeSource for NativeSource {
    fn kind(&self) -> ChangeSourceKind {
        ChangeSourceKind::Native
    }

    fn sync_watches(&mut self, roots: &BTreeSet<PathBuf>) {
        let stale: Vec<PathBuf> = self.registered.difference(roots).cloned().collect();
        for dir in stale {
            if let Err(e) = self.watcher.unwatch(&dir) {
                tracing::debug!(dir = %dir.display(), error = %e, "Unwatch failed");
            }
            self.registered.remove(&dir);
        }

        for dir in roots {
            if self.registered.contains(dir) {
                continue;
            }
            match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    tracing::debug!(dir = %dir.display(), "Watching directory");
                    self.registered.insert(dir.clone());
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Cannot watch directory");
                }
            }
        }
    }

    fn shutdown(self: Box<Self>, timeout: Duration) -> bool {
        let NativeSource {
            watcher,
            registered,
            dispatcher,
        } = *self;
        // Dropping the OS watcher releases every registration and closes the
        // event channel, which also ends the dispatcher loop.
        drop(watcher);
        tracing::debug!(released = registered.len(), "Native watches released");
        dispatcher.stop(timeout)
    }
}

// =============================================================================
// Polling fallback
// =============================================================================

pub struct PollSource {
    worker: Worker,
}

impl PollSource {
    pub fn start(core: Arc<WatchCore>, interval: Duration) -> Self {
        let worker = Worker::spawn("logwatch-poll", move |cancel| {
            let slice = Duration::from_millis(WATCH_CANCEL_CHECK_INTERVAL_MS);
            loop {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
                core.check_all_files();
                if sleep_cancellable(interval, slice, &cancel) {
                    break;
                }
            }
            tracing::debug!("Poll loop stopped");
        });
        Self { worker }
    }
}

impl ChangeSource for PollSource {
    fn kind(&self) -> ChangeSourceKind {
        ChangeSourceKind::Poll
    }

    /// Every sweep re-lists the watched set, so there is nothing to register.
    fn sync_watches(&mut self, _roots: &BTreeSet<PathBuf>) {}

    fn shutdown(self: Box<Self>, timeout: Duration) -> bool {
        self.worker.stop(timeout)
    }
}
