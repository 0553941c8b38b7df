//! Error types for loudness processing.

use thiserror::Error;

/// Errors raised while normalizing a track.
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// The track carries no channels to normalize.
    #[error("Track has no channels")]
    NoChannels,

    /// Error bubbled up from the core types, including cancellation.
    #[error(transparent)]
    Core(#[from] opustuck_core::Error),
}

impl LoudnessError {
    /// Check whether this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoudnessError::Core(core) if core.is_cancelled())
    }
}

/// Result type alias for loudness processing.
pub type Result<T> = std::result::Result<T, LoudnessError>;
