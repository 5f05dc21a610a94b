//! Binary PLY downsampling for splatlod
//!
//! This crate reads binary PLY headers, copies a uniformly drawn subset of
//! vertex records into a new file and builds LOD pyramids from a single
//! source. Records are moved as opaque byte spans, so every attribute a
//! Gaussian-splat file carries is preserved exactly.

pub mod downsample;
pub mod header;
pub mod job;
pub mod lod;
pub mod mmap;
pub mod options;
pub mod progress;
pub mod source;

pub use downsample::{downsample, Downsampler, Plan, Summary};
pub use header::{read_header, read_header_file, PlyFormat, PlyHeader, MAX_HEADER_LEN};
pub use job::DownsampleJob;
pub use lod::{downsample_file, generate_lods, lod_levels, lod_output_path, LodLevel};
pub use mmap::{should_use_mmap, MmapReader, MIN_MMAP_SIZE};
pub use options::DownsampleOptions;
pub use progress::{CancelFlag, Progress, ProgressSink, ProgressSnapshot, ProgressTracker, Stage};
pub use source::{MappedSource, RecordSource, StreamSource};

#[cfg(test)]
mod tests;
