//! Archive error types
//!
//! Defines all errors that can occur while decoding, merging and persisting
//! round-robin archives.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the archive layer
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata file does not start with the expected magic token
    #[error("Bad magic number: {found:?}")]
    BadMagic { found: String },

    /// A header field declares more bytes than the stream holds
    #[error("Truncated {field}: needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// A buffer record at the end of the metadata file is incomplete
    #[error("Corrupt buffer record {index}: {reason}")]
    CorruptRecord { index: usize, reason: String },

    /// Negative or implausible length prefix
    #[error("Invalid length for {field}: {length}")]
    InvalidLength { field: &'static str, length: i64 },

    /// Buffer index outside `0..buffer_count`
    #[error("Buffer index {index} out of range (device has {count} buffers)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Source and destination buffers disagree on capacity
    #[error("Capacity mismatch: buffer holds {expected} slots, got {found}")]
    CapacityMismatch { expected: usize, found: usize },

    /// Device has no resolved display name
    #[error("No display name resolved for device {0}")]
    UnnamedDevice(String),

    /// Cutoff date could not be parsed
    #[error("Invalid date: {0} (expected YYYY-mm-dd)")]
    InvalidDate(String),

    /// CSV reader failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Device name lookup file could not be read
    #[error("Name lookup error in {path:?}: {reason}")]
    NameLookup { path: PathBuf, reason: String },
}

impl ArchiveError {
    /// Whether processing may continue with the next buffer.
    ///
    /// Bad magic and truncated headers invalidate the whole device; everything
    /// else is scoped to a single buffer.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ArchiveError::BadMagic { .. }
                | ArchiveError::Truncated { .. }
                | ArchiveError::InvalidLength { .. }
        )
    }
}

/// Result type alias for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
