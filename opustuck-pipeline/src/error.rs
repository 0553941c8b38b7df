//! Transcode pipeline error types.

use opustuck_declip::DeclipError;
use opustuck_loudness::LoudnessError;
use opustuck_spatial::LayoutError;
use thiserror::Error;

/// Error type covering every stage of a transcode.
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The configuration failed validation before any work started.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A transcode is already in flight on this coordinator.
    #[error("Transcoder already running")]
    AlreadyRunning,

    /// Core error: cancellation, codec failures, I/O, allocation.
    #[error(transparent)]
    Core(#[from] opustuck_core::Error),

    /// Channel layout could not be transformed to the output layout.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Normalization failed.
    #[error(transparent)]
    Loudness(#[from] LoudnessError),

    /// De-clipping failed; outside of cancellation this means a bug.
    #[error(transparent)]
    Declip(#[from] DeclipError),
}

impl TranscodeError {
    /// Check whether this error is a cancellation, at whatever depth it
    /// was raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            TranscodeError::Core(core) => core.is_cancelled(),
            TranscodeError::Layout(layout) => layout.is_cancelled(),
            TranscodeError::Loudness(loudness) => loudness.is_cancelled(),
            TranscodeError::Declip(declip) => declip.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, TranscodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_detected_through_wrapping() {
        let err: TranscodeError = opustuck_core::Error::Cancelled.into();
        assert!(err.is_cancelled());

        let err: TranscodeError = LayoutError::from(opustuck_core::Error::Cancelled).into();
        assert!(err.is_cancelled());

        let err = TranscodeError::InvalidConfig("effort out of range".into());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_display_passthrough() {
        let err: TranscodeError = opustuck_core::Error::decode_failed("header damaged").into();
        assert_eq!(err.to_string(), "Decoding failed: header damaged");
    }
}
