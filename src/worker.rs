//! Off-thread execution of long-running operations
//!
//! The operation runs on its own thread and reports into a
//! [`ProgressSlot`]; the caller polls the slot and may cancel at any time.
//! Nothing the caller does blocks the worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cancel::CancellationToken;
use crate::error::{ProfileError, ProfileResult};
use crate::progress::{ProgressEvent, ProgressSlot};

/// Handle to an operation running on a worker thread
pub struct OperationHandle<T> {
    thread: JoinHandle<ProfileResult<T>>,
    cancel: CancellationToken,
    progress: Arc<ProgressSlot>,
}

impl<T> OperationHandle<T> {
    /// Request cancellation; the operation stops at its next check
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Most recent progress event, if any
    pub fn latest_progress(&self) -> Option<ProgressEvent> {
        self.progress.latest()
    }

    /// Incremented on every new event
    pub fn progress_generation(&self) -> u64 {
        self.progress.generation()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the operation and return its result
    ///
    /// A panic on the worker thread is reported as an I/O error.
    pub fn join(self) -> ProfileResult<T> {
        self.thread
            .join()
            .unwrap_or_else(|_| Err(ProfileError::Io("Worker thread panicked".into())))
    }
}

/// Run `operation` on a new named thread
///
/// The closure receives the progress sink and cancellation token it must
/// thread through every call it makes.
pub fn spawn_operation<T, F>(name: &str, operation: F) -> ProfileResult<OperationHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(&ProgressSlot, &CancellationToken) -> ProfileResult<T> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let progress = Arc::new(ProgressSlot::new());

    let worker_cancel = cancel.clone();
    let worker_progress = Arc::clone(&progress);
    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || operation(&worker_progress, &worker_cancel))
        .map_err(|e| ProfileError::Io(format!("Failed to start worker thread: {}", e)))?;

    Ok(OperationHandle {
        thread,
        cancel,
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSink;
    use std::time::Duration;

    #[test]
    fn test_result_is_returned() {
        let handle = spawn_operation("test", |progress, _cancel| {
            progress.report(ProgressEvent::indeterminate("Working", ""));
            Ok(42)
        })
        .unwrap();

        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn test_latest_progress_visible() {
        let handle = spawn_operation("test", |progress, _cancel| {
            progress.report(ProgressEvent::determinate("Step", 1, 2, "a"));
            progress.report(ProgressEvent::determinate("Step", 2, 2, "b"));
            Ok(())
        })
        .unwrap();

        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(5));
        }
        let latest = handle.latest_progress().unwrap();
        assert_eq!(latest.position(), Some((2, 2)));
        assert_eq!(handle.progress_generation(), 2);
        handle.join().unwrap();
    }

    #[test]
    fn test_cancel_stops_worker() {
        let handle = spawn_operation("test", |_progress, cancel| {
            cancel.sleep(Duration::from_secs(30))?;
            Ok(())
        })
        .unwrap();

        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(handle.join().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_panic_becomes_error() {
        let handle: OperationHandle<()> =
            spawn_operation("test", |_progress, _cancel| panic!("boom")).unwrap();

        assert!(handle.join().is_err());
    }
}
