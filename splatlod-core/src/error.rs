//! Error types for splatlod

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for splatlod operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Unsupported element block: {0}")]
    UnsupportedElementBlock(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid keep ratio {0}: expected a value in (0, 1]")]
    InvalidRatio(f64),

    #[error("Record index {index} out of range for {count} records")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Inconsistent output: expected {expected} bytes, wrote {actual}")]
    InconsistentOutput { expected: u64, actual: u64 },

    #[error("Cancelled after {completed} of {total} records")]
    Cancelled { completed: usize, total: usize },
}

/// Terminal classification of an [`Error`], suitable for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedHeader,
    UnsupportedElementBlock,
    UnsupportedFormat,
    InvalidRatio,
    IndexOutOfRange,
    IoFailure,
    InvalidData,
    InconsistentOutput,
    Cancelled,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedHeader(_) => ErrorKind::MalformedHeader,
            Error::UnsupportedElementBlock(_) => ErrorKind::UnsupportedElementBlock,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::InvalidRatio(_) => ErrorKind::InvalidRatio,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::Io(_) => ErrorKind::IoFailure,
            Error::InvalidData(_) => ErrorKind::InvalidData,
            Error::InconsistentOutput { .. } => ErrorKind::InconsistentOutput,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedHeader(message.into())
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedHeader => "MalformedHeader",
            ErrorKind::UnsupportedElementBlock => "UnsupportedElementBlock",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::InvalidRatio => "InvalidRatio",
            ErrorKind::IndexOutOfRange => "IndexOutOfRange",
            ErrorKind::IoFailure => "IOFailure",
            ErrorKind::InvalidData => "InvalidData",
            ErrorKind::InconsistentOutput => "InconsistentOutput",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}
