//! Downsample runs on a background thread
//!
//! The worker pushes progress into a [`ProgressTracker`] that the caller
//! polls; cancellation goes the other way through a [`CancelFlag`].

use crate::downsample::{Downsampler, Summary};
use crate::options::DownsampleOptions;
use crate::progress::{CancelFlag, ProgressSnapshot, ProgressTracker};
use splatlod_core::{Error, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Handle to a file downsample running on its own thread
pub struct DownsampleJob {
    tracker: ProgressTracker,
    cancel: CancelFlag,
    handle: JoinHandle<Result<Summary>>,
}

impl DownsampleJob {
    /// Start downsampling `input` into `output`
    pub fn spawn<P: Into<PathBuf>, Q: Into<PathBuf>>(
        input: P,
        output: Q,
        keep_ratio: f64,
        options: DownsampleOptions,
    ) -> Result<Self> {
        let input = input.into();
        let output = output.into();
        let tracker = ProgressTracker::new();
        let cancel = CancelFlag::new();

        let mut downsampler = Downsampler::new(options)
            .with_sink(Arc::new(tracker.clone()))
            .with_cancel_flag(cancel.clone());

        let handle = thread::Builder::new()
            .name("splatlod-downsample".to_string())
            .spawn(move || downsampler.run_file(&input, &output, keep_ratio))?;

        Ok(Self {
            tracker,
            cancel,
            handle,
        })
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// Ask the worker to stop before its next record copy
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return its result
    pub fn join(self) -> Result<Summary> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "downsample worker panicked",
            ))),
        }
    }
}
