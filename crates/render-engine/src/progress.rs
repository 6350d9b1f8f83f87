//! Batch progress and cooperative cancellation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Cancellation request shared between the caller, the orchestrator and the pumps.
///
/// Setting it never interrupts work in progress; it is polled between items
/// and between frames.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Live progress of one batch export.
///
/// The orchestrator is the only writer. Any number of readers may poll it.
#[derive(Debug, Default)]
pub struct ExportProgress {
    completed: AtomicU64,
    total: AtomicU64,
    frames_completed: AtomicU64,
    frames_total: AtomicU64,
    exporting: AtomicBool,
    current_item: Mutex<String>,
    errors: Mutex<Vec<String>>,
    cancel: CancellationFlag,
}

/// Serializable point-in-time copy of [`ExportProgress`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
    pub frames_completed: u64,
    pub frames_total: u64,
    pub progress: f64,
    pub exporting: bool,
    pub cancelled: bool,
    pub current_item: String,
    pub errors: Vec<String>,
}

impl ExportProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing cancellation flag, e.g. one wired to Ctrl-C.
    pub fn with_cancellation(cancel: CancellationFlag) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reset counters and errors for a new batch of `total` items.
    pub fn begin(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.reset_frame_progress();
        if let Ok(mut errors) = self.errors.lock() {
            errors.clear();
        }
        self.exporting.store(true, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        self.set_current_item("");
        self.exporting.store(false, Ordering::SeqCst);
    }

    pub fn set_current_item(&self, label: impl Into<String>) {
        if let Ok(mut current) = self.current_item.lock() {
            *current = label.into();
        }
    }

    pub fn current_item(&self) -> String {
        self.current_item
            .lock()
            .map(|current| current.clone())
            .unwrap_or_default()
    }

    pub fn item_completed(&self) -> u64 {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_frame_progress(&self, done: u64, total: u64) {
        self.frames_completed.store(done, Ordering::Relaxed);
        self.frames_total.store(total, Ordering::Relaxed);
    }

    pub fn reset_frame_progress(&self) {
        self.set_frame_progress(0, 0);
    }

    pub fn push_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(error = %message, "Export item failed");
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(message);
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::SeqCst)
    }

    /// Fraction of items completed, 0 when the batch is empty.
    pub fn progress(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.completed() as f64 / total as f64
        }
    }

    pub fn is_finished(&self) -> bool {
        !self.is_exporting() && self.total() > 0
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed(),
            total: self.total(),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_total: self.frames_total.load(Ordering::Relaxed),
            progress: self.progress(),
            exporting: self.is_exporting(),
            cancelled: self.is_cancelled(),
            current_item: self.current_item(),
            errors: self.errors(),
        }
    }
}
