//! Error types shared across the opustuck engine.

use thiserror::Error;

/// Main error type for the opustuck engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Operation was cancelled through a [`crate::CancelToken`].
    #[error("Operation cancelled")]
    Cancelled,

    /// The input exposes no audio track or no float sample path.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The external decoder reported a failure.
    #[error("Decoding failed: {0}")]
    DecodeFailed(String),

    /// The external encoder reported a failure.
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    /// The sample buffer could not be reserved.
    #[error("Allocation of {needed} bytes failed")]
    AllocationFailed {
        /// Number of bytes that could not be reserved.
        needed: usize,
    },

    /// An internal invariant was broken; this is a bug.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Access outside the bounds of a byte blob.
    #[error("Blob access at offset {offset} is outside the {size} byte blob")]
    OutOfRange {
        /// Requested offset.
        offset: u64,
        /// Total size of the blob.
        size: u64,
    },

    /// I/O errors from the backing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an unsupported-format error.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Error::UnsupportedFormat(msg.into())
    }

    /// Create a decode-failure error wrapping an external codec message.
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Error::DecodeFailed(msg.into())
    }

    /// Create an encode-failure error wrapping an external codec message.
    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Error::EncodeFailed(msg.into())
    }

    /// Create an invalid-state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Check whether this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
