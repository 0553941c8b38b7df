//! Error types for channel layout transforms.

use thiserror::Error;

/// Errors raised while transforming channel layouts.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// The channel configuration matches no supported transform.
    #[error("Unsupported layout: {0}")]
    Unsupported(String),

    /// A channel required by the transform is not present.
    #[error("Missing required channel: {0}")]
    MissingChannel(String),

    /// The track carries the wrong number of channels for the transform.
    #[error("Invalid channel count: {count}, expected {expected}")]
    InvalidChannelCount {
        /// Actual channel count.
        count: usize,
        /// Human-readable description of the accepted counts.
        expected: String,
    },

    /// Error bubbled up from the core types, including cancellation.
    #[error(transparent)]
    Core(#[from] opustuck_core::Error),
}

impl LayoutError {
    /// Create an unsupported-layout error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        LayoutError::Unsupported(msg.into())
    }

    /// Check whether this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LayoutError::Core(core) if core.is_cancelled())
    }
}

/// Result type alias for layout transforms.
pub type Result<T> = std::result::Result<T, LayoutError>;
