//! Progress reporting for downsample runs
//!
//! A run pushes stage changes and copy progress into a [`ProgressSink`].
//! [`ProgressTracker`] is the pull-based sink: it keeps the latest snapshot
//! behind a mutex so a polling thread can read it at any time without
//! blocking the copy for longer than one snapshot update.

use crate::downsample::Summary;
use serde::{Deserialize, Serialize};
use splatlod_core::{Error, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Lifecycle of a single downsample run
///
/// A successful run moves through `ParsingHeader`, `Sampling`,
/// `WritingHeader`, `Copying` and `Completed`, in that order. The header is
/// written before the records are copied, since the output count is fixed
/// once sampling ends and the destination is only ever appended to. Any
/// non-terminal stage may end in `Errored`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "error", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    ParsingHeader,
    Sampling,
    WritingHeader,
    Copying,
    Completed,
    Errored(ErrorKind),
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Errored(_))
    }
}

/// Records copied so far out of the records selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completed fraction in `[0, 1]`; an empty selection counts as done
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn stage_changed(&self, _stage: Stage) {}

    fn progress(&self, progress: Progress);

    fn completed(&self, _summary: &Summary) {
        self.stage_changed(Stage::Completed);
    }

    fn failed(&self, error: &Error) {
        self.stage_changed(Stage::Errored(error.kind()));
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn stage_changed(&self, stage: Stage) {
        (**self).stage_changed(stage)
    }

    fn progress(&self, progress: Progress) {
        (**self).progress(progress)
    }

    fn completed(&self, summary: &Summary) {
        (**self).completed(summary)
    }

    fn failed(&self, error: &Error) {
        (**self).failed(error)
    }
}

/// Point-in-time view of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: Stage,
    pub completed: usize,
    pub total: usize,
    pub message: Option<String>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        match self.stage {
            Stage::Completed => 100.0,
            Stage::Copying => {
                let progress = Progress {
                    completed: self.completed,
                    total: self.total,
                };
                progress.fraction() * 100.0
            }
            _ => 0.0,
        }
    }
}

/// Shared, pollable progress state
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Mutex<ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    /// Return to `Idle` so the tracker can observe another run
    pub fn reset(&self) {
        *self.lock() = ProgressSnapshot::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressSink for ProgressTracker {
    fn stage_changed(&self, stage: Stage) {
        self.lock().stage = stage;
    }

    fn progress(&self, progress: Progress) {
        let mut snapshot = self.lock();
        snapshot.completed = progress.completed;
        snapshot.total = progress.total;
    }

    fn completed(&self, summary: &Summary) {
        let mut snapshot = self.lock();
        snapshot.stage = Stage::Completed;
        snapshot.completed = summary.retained_count;
        snapshot.total = summary.retained_count;
        snapshot.message = Some(format!(
            "Kept {}/{} records",
            summary.retained_count, summary.original_count
        ));
    }

    fn failed(&self, error: &Error) {
        let mut snapshot = self.lock();
        snapshot.stage = Stage::Errored(error.kind());
        snapshot.message = Some(error.to_string());
    }
}

/// Caller-owned cancellation flag, checked between record copies
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
