//! Error types for the unproto-core library.
//!
//! This module provides error handling using the `thiserror` crate. Every
//! decoding variant records the absolute byte offset (from the start of the
//! input buffer) at which the failing read began.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for unproto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all unproto operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A multi-byte read needed more bytes than remain in the buffer
    #[error("truncated input at offset {offset}: need {needed} bytes, {remaining} remain")]
    TruncatedInput {
        /// Byte offset where the read started
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
        /// Number of bytes that were available
        remaining: usize,
    },

    /// Tag with field number 0, an out-of-range field number, or an unsupported wire type
    #[error(
        "invalid tag {tag:#x} at offset {offset} (field {}, wire type {})",
        .tag >> 3,
        .tag & 0x07
    )]
    InvalidTag {
        /// Byte offset of the tag
        offset: usize,
        /// Raw tag value
        tag: u64,
    },

    /// Varint did not terminate within its byte budget
    #[error("overlong varint at offset {offset}: no terminating byte within {max_bytes} bytes")]
    OverlongVarint {
        /// Byte offset where the varint started
        offset: usize,
        /// Maximum number of bytes allowed for this varint
        max_bytes: usize,
    },

    /// A nested read would cross its enclosing range, or the range was not exhausted exactly
    #[error("boundary violation at offset {offset}: {details}")]
    BoundaryViolation {
        /// Byte offset where the violation was detected
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Length prefix larger than any valid length-delimited payload
    #[error("invalid length {length} at offset {offset}: exceeds {max}")]
    InvalidLength {
        /// Byte offset of the length prefix
        offset: usize,
        /// The declared length
        length: u64,
        /// Largest accepted length
        max: u64,
    },

    /// Nested messages deeper than the configured limit
    #[error("nesting depth exceeded at offset {offset}: limit is {max_depth}")]
    DepthExceeded {
        /// Byte offset of the payload that would have exceeded the limit
        offset: usize,
        /// Configured maximum depth
        max_depth: usize,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new truncated input error
    pub fn truncated(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::TruncatedInput {
            offset,
            needed,
            remaining,
        }
    }

    /// Creates a new boundary violation error
    pub fn boundary_violation(offset: usize, details: impl Into<String>) -> Self {
        Self::BoundaryViolation {
            offset,
            details: details.into(),
        }
    }

    /// Returns the byte offset the error refers to, if any
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::FileRead { .. } => None,
            Self::TruncatedInput { offset, .. }
            | Self::InvalidTag { offset, .. }
            | Self::OverlongVarint { offset, .. }
            | Self::BoundaryViolation { offset, .. }
            | Self::InvalidLength { offset, .. }
            | Self::DepthExceeded { offset, .. } => Some(*offset),
        }
    }

    /// Returns true if this error only rules out one interpretation of a
    /// length-delimited payload, so the next interpretation may be tried
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TruncatedInput { .. }
                | Self::InvalidTag { .. }
                | Self::OverlongVarint { .. }
                | Self::BoundaryViolation { .. }
                | Self::InvalidLength { .. }
        )
    }
}
