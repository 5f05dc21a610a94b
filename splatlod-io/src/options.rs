//! Tunables for a downsample run

use serde::{Deserialize, Serialize};

/// Options controlling how a downsample run reads, writes and reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownsampleOptions {
    /// Records copied between progress reports
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    /// Capacity of the buffered reader and writer, in bytes
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Memory-map large file sources when the `io-mmap` feature is enabled
    #[serde(default = "default_use_mmap")]
    pub use_mmap: bool,
    /// Fixed sampler seed; `None` draws from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_progress_interval() -> usize {
    65_536
}
fn default_buffer_capacity() -> usize {
    1024 * 1024 // 1MB
}
fn default_use_mmap() -> bool {
    true
}

impl Default for DownsampleOptions {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            buffer_capacity: default_buffer_capacity(),
            use_mmap: default_use_mmap(),
            seed: None,
        }
    }
}

impl DownsampleOptions {
    pub fn with_progress_interval(mut self, records: usize) -> Self {
        self.progress_interval = records.max(1);
        self
    }

    pub fn with_buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes.max(1);
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Buffer size actually used for reads and writes, never zero
    pub fn io_buffer_capacity(&self) -> usize {
        self.buffer_capacity.max(1)
    }

    /// Records between progress reports, never zero
    pub fn report_interval(&self) -> usize {
        self.progress_interval.max(1)
    }
}
