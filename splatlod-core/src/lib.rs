//! Core data structures for splatlod
//!
//! This crate provides the record schema of a point-cloud file, the codec that
//! locates and copies fixed-width records, and the shared error type.

pub mod codec;
pub mod error;
pub mod schema;

pub use codec::*;
pub use error::*;
pub use schema::*;

/// Common result type for splatlod operations
pub type Result<T> = std::result::Result<T, Error>;
