//! # splatlod
//!
//! Level-of-detail downsampling for Gaussian-splat point clouds stored as
//! binary PLY.
//!
//! This is the umbrella crate that provides convenient access to all splatlod
//! functionality. You can use this crate to get everything in one place, or
//! use individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: Record schema, fixed-width record codec and error types
//! - **Algorithms**: Uniform record selection without replacement
//! - **I/O**: PLY header parsing, downsampling, LOD generation and background jobs
//!
//! ## Quick Start
//!
//! ```rust
//! use splatlod::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = b"ply\nformat binary_little_endian 1.0\nelement vertex 4\nproperty float x\nend_header\n\
//!     \x00\x00\x00\x00\x00\x00\x80\x3f\x00\x00\x00\x40\x00\x00\x40\x40";
//! let mut output = Vec::new();
//!
//! let summary = Downsampler::new(DownsampleOptions::default().with_seed(7))
//!     .run(&source[..], &mut output, 0.5)?;
//! assert_eq!(summary.retained_count, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables core, algorithms and io
//! - `algorithms`: Record selection
//! - `io`: PLY downsampling and LOD generation
//! - `io-mmap`: Memory-map large source files
//! - `all`: Enables all features

// Re-export core functionality
pub use splatlod_core::*;

// Re-export sub-crates
#[cfg(feature = "algorithms")]
pub use splatlod_algorithms as algorithms;

#[cfg(feature = "io")]
pub use splatlod_io as io;

/// Convenient imports for common use cases
pub mod prelude {
    pub use splatlod_core::*;

    #[cfg(feature = "algorithms")]
    pub use splatlod_algorithms::*;

    #[cfg(feature = "io")]
    pub use splatlod_io::*;
}
