//! Error types for clipping detection and tucking.

use thiserror::Error;

/// Errors raised by the de-clipper. Apart from cancellation, every variant
/// indicates a broken internal invariant.
#[derive(Error, Debug)]
pub enum DeclipError {
    /// A half-wave's frame range does not fit inside the sample buffer.
    #[error("Half-wave range {start}..{end} lies outside the {frames} frame buffer")]
    RangeOutOfBounds {
        /// Start frame of the offending half-wave.
        start: usize,
        /// Exclusive end frame of the offending half-wave.
        end: usize,
        /// Number of frames in the buffer.
        frames: usize,
    },

    /// A foreign sample buffer does not match the track's geometry.
    #[error("Sample buffer holds {actual} samples, the track expects {expected}")]
    BufferMismatch {
        /// Length of the provided buffer.
        actual: usize,
        /// Length implied by the track geometry.
        expected: usize,
    },

    /// Source and decoded tracks disagree on the channel count.
    #[error("Channel count mismatch: source has {source_channels}, decoded has {decoded}")]
    ChannelMismatch {
        /// Channels in the source track.
        source_channels: usize,
        /// Channels in the decoded track.
        decoded: usize,
    },

    /// Half-wave lists are out of order or overlapping.
    #[error("Half-waves in channel {channel} overlap near frame {frame}")]
    OverlappingHalfwaves {
        /// Channel whose list is inconsistent.
        channel: usize,
        /// Start frame of the offending half-wave.
        frame: usize,
    },

    /// Error bubbled up from the core types, including cancellation.
    #[error(transparent)]
    Core(#[from] opustuck_core::Error),
}

impl DeclipError {
    /// Check whether this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeclipError::Core(core) if core.is_cancelled())
    }
}

/// Result type alias for de-clipping operations.
pub type Result<T> = std::result::Result<T, DeclipError>;
