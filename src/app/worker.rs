// LogWatch - app/worker.rs
//
// Cancellable background thread with a bounded join wait.
//
// The thread owns a "done" sender for its whole lifetime; when the closure
// returns (or panics) the sender drops and the receiver disconnects, which is
// how `stop` learns the thread has exited without blocking on `join`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct Worker {
    cancel: Arc<AtomicBool>,
    done_rx: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn `body` on a named thread. The closure receives the cancel flag
    /// and must check it at every natural boundary.
    pub fn spawn<F>(name: &str, body: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let thread_cancel = Arc::clone(&cancel);

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _done = done_tx;
                body(thread_cancel);
            });

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                // The closure (and with it the sender) was dropped, so the
                // worker already reads as finished.
                tracing::error!(thread = name, error = %e, "Failed to spawn worker thread");
                None
            }
        };

        Self {
            cancel,
            done_rx,
            handle,
        }
    }

    /// Returns true once the thread body has returned.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.done_rx.try_recv(),
            Err(mpsc::TryRecvError::Disconnected)
        )
    }

    /// Ask the thread to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Set the cancel flag and wait up to `timeout` for the thread to exit.
    ///
    /// Returns true if the thread exited in time (it is then joined). On
    /// timeout the thread is left detached and will exit on its own.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.cancel();
        match self.done_rx.recv_timeout(timeout) {
            Err(mpsc::RecvTimeoutError::Disconnected) | Ok(()) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        tracing::warn!("Worker thread panicked");
                    }
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Worker thread did not stop in time; detaching"
                );
                false
            }
        }
    }
}

/// Sleep for `total`, waking every `slice` to check `cancel`.
///
/// Returns true if cancellation was requested.
pub fn sleep_cancellable(total: Duration, slice: Duration, cancel: &AtomicBool) -> bool {
    let slice = slice.max(Duration::from_millis(1));
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.load(Ordering::SeqCst) {
            return true;
        }
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    cancel.load(Ordering::SeqCst)
}
