//! # splatlod algorithms
//!
//! Record selection for level-of-detail generation.

pub mod sampling;

// Re-export commonly used items
pub use sampling::*;
