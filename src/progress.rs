//! Progress reporting for long-running operations
//!
//! Every operation reports through a [`ProgressSink`]. The sink is invoked
//! synchronously on the worker thread; consumers that display progress on
//! another thread should store the event and return immediately, which is
//! what [`ProgressSlot`] does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Whether the operation knows how far along it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProgressMode {
    /// Unknown amount of remaining work
    Indeterminate,
    /// `current` out of `maximum` steps done
    Determinate { current: u64, maximum: u64 },
}

/// A single progress update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Short phrase describing the current phase
    pub status: String,
    /// Active path, counter or other detail
    pub detail: String,
    /// Indeterminate or determinate progress
    #[serde(flatten)]
    pub mode: ProgressMode,
}

impl ProgressEvent {
    /// Create an event without a known position
    pub fn indeterminate(status: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            detail: detail.into(),
            mode: ProgressMode::Indeterminate,
        }
    }

    /// Create an event at `current` of `maximum`
    pub fn determinate(
        status: impl Into<String>,
        current: u64,
        maximum: u64,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status: status.into(),
            detail: detail.into(),
            mode: ProgressMode::Determinate { current, maximum },
        }
    }

    /// Position as (current, maximum) when determinate
    pub fn position(&self) -> Option<(u64, u64)> {
        match self.mode {
            ProgressMode::Determinate { current, maximum } => Some((current, maximum)),
            ProgressMode::Indeterminate => None,
        }
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            ProgressMode::Determinate { current, maximum } => {
                write!(f, "{} [{}/{}] {}", self.status, current, maximum, self.detail)
            }
            ProgressMode::Indeterminate => write!(f, "{} {}", self.status, self.detail),
        }
    }
}

/// Receiver of progress events
///
/// Implementations must not block: the caller is a worker in the middle of
/// a file copy or a process wait.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Holds only the most recent event for a polling display thread
#[derive(Debug, Default)]
pub struct ProgressSlot {
    latest: Mutex<Option<ProgressEvent>>,
    generation: AtomicU64,
}

impl ProgressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent event, if any was reported yet
    pub fn latest(&self) -> Option<ProgressEvent> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }

    /// Number of events reported so far
    ///
    /// Lets the display skip redraws when nothing changed.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl ProgressSink for ProgressSlot {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(event);
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Collects every event; used by tests to assert on the event stream
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events reported so far
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Status phrases in reporting order
    pub fn statuses(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.status).collect()
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_is_a_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = move |event: ProgressEvent| captured.lock().unwrap().push(event.status);

        sink.report(ProgressEvent::indeterminate("Validating", ""));
        sink.report(ProgressEvent::determinate("Compressing", 1, 3, "a.txt"));

        assert_eq!(*seen.lock().unwrap(), vec!["Validating", "Compressing"]);
    }

    #[test]
    fn test_slot_keeps_latest() {
        let slot = ProgressSlot::new();
        assert!(slot.latest().is_none());
        assert_eq!(slot.generation(), 0);

        slot.report(ProgressEvent::determinate("Copying", 10, 100, "1 MB / 10 MB"));
        slot.report(ProgressEvent::determinate("Copying", 20, 100, "2 MB / 10 MB"));

        let latest = slot.latest().unwrap();
        assert_eq!(latest.position(), Some((20, 100)));
        assert_eq!(slot.generation(), 2);
    }

    #[test]
    fn test_display_formats() {
        let event = ProgressEvent::determinate("Extracting", 2, 5, "profiles.ini");
        assert_eq!(event.to_string(), "Extracting [2/5] profiles.ini");

        let event = ProgressEvent::indeterminate("Deleting old profile", "/tmp/x");
        assert!(event.position().is_none());
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = ProgressEvent::determinate("Compressing", 1, 2, "a");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["mode"], "determinate");
        assert_eq!(json["current"], 1);
        assert_eq!(json["maximum"], 2);
    }
}
