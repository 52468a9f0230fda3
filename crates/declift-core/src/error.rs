//! Error types for declift-core.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A serialized record could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// I/O error while writing an export.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or writing framed records.
///
/// An unknown record tag is not an error: readers skip the record body and
/// report the loss through the log.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Data was truncated.
    #[error("truncated data: expected {expected} bytes, got {actual} ({context})")]
    TruncatedData {
        expected: usize,
        actual: usize,
        context: &'static str,
    },

    /// A field held a value outside its domain.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    /// The end-of-record marker was missing or malformed.
    #[error("bad end of record marker: found {found:#x}")]
    BadEndMarker { found: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Create a truncated data error.
    pub fn truncated(expected: usize, actual: usize, context: &'static str) -> Self {
        Self::TruncatedData {
            expected,
            actual,
            context,
        }
    }
}
