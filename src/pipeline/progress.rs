//! Batch progress reporting.
//!
//! The pipeline counts resolved tasks; rendering belongs to the caller.

/// Receives `(completed, total)` after every task of a batch resolves
pub trait ProgressObserver: Send + Sync {
    /// Called once per resolved task, `completed` runs from 1 to `total`
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Observer that ignores progress
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Observer that emits a `tracing` debug event per update
#[derive(Clone, Debug)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    /// Tag every event with `label` (usually the batch label)
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressObserver for LogProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        tracing::debug!(label = %self.label, completed, total, "Batch progress");
    }
}
