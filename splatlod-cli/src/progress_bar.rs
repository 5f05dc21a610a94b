//! Terminal progress bar driven by downsample events
//!
//! One bar is reused across LOD levels; it is reset whenever a new run starts
//! parsing its header.

use indicatif::{ProgressBar, ProgressStyle};
use splatlod_core::Error;
use splatlod_io::{Progress, ProgressSink, Stage, Summary};

pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} records ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("▉▊▋▌▍▎▏ "));
        }
        Self { bar }
    }

    /// Leave the bar on screen with its last message
    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Idle => "Idle",
        Stage::ParsingHeader => "Parsing header",
        Stage::Sampling => "Sampling",
        Stage::WritingHeader => "Writing header",
        Stage::Copying => "Copying records",
        Stage::Completed => "Done",
        Stage::Errored(_) => "Failed",
    }
}

impl ProgressSink for BarSink {
    fn stage_changed(&self, stage: Stage) {
        if stage == Stage::ParsingHeader {
            self.bar.reset();
        }
        self.bar.set_message(stage_label(stage));
    }

    fn progress(&self, progress: Progress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.completed as u64);
    }

    fn completed(&self, summary: &Summary) {
        self.bar.set_length(summary.retained_count as u64);
        self.bar.set_position(summary.retained_count as u64);
        self.bar.set_message(format!(
            "Kept {}/{} records",
            summary.retained_count, summary.original_count
        ));
    }

    fn failed(&self, error: &Error) {
        self.bar.abandon_with_message(format!("Failed: {}", error.kind()));
    }
}
