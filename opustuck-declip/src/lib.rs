//! # Opustuck Declip
//!
//! Clipping detection and repair for the opustuck transcoding engine.
//!
//! Lossy codecs do not reproduce a waveform exactly; a signal that just
//! grazes full scale on the way in routinely comes back out of the decoder
//! slightly above it. This crate finds the half-waves responsible and scales
//! them down far enough that neither the input clipping nor the
//! codec-introduced overshoot survives:
//!
//! - [`find_clipping_halfwaves`] scans a track and records every half-wave
//!   with a sample beyond full scale
//! - [`tuck_halfwaves`] scales those half-waves in place to -0.001 dBFS
//! - [`integrate_clipping_halfwaves`] merges clipping found in the decoded
//!   Opus output back into the source track's records
//! - [`update_clipping_halfwaves`] re-measures the recorded windows against
//!   a decoded buffer and reports how many still clip
//! - [`copy_and_tuck`] writes a tucked copy of the source while leaving the
//!   source pristine, which is what the iterative loop re-encodes
//!
//! The iterative encode/decode/re-tuck loop in the pipeline crate drives
//! these until the decoded output stays under full scale or the retry caps
//! run out.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod detector;
pub mod error;
pub mod tucker;

pub use detector::{
    find_clipping_halfwaves, integrate_clipping_halfwaves, update_clipping_halfwaves,
    verify_consistency, MAX_INEFFECTIVE_ITERATIONS,
};
pub use error::{DeclipError, Result};
pub use tucker::{copy_and_tuck, tuck_halfwaves};
