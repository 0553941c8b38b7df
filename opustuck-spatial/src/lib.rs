//! # Opustuck Spatial
//!
//! Channel layout transforms for the opustuck transcoding engine.
//!
//! Opus (through its Vorbis heritage) mandates a fixed interleave order per
//! channel count, while input files arrive in whatever order their container
//! chose. This crate rewrites a track's interleaved sample buffer from the
//! input order into the Vorbis order of the chosen output layout:
//!
//! - [`upmix_mono_to_stereo`] duplicates a mono track into both channels
//! - [`downmix_to_stereo`] folds 5.1 or 7.1 into stereo, with a nightmode
//!   control interpolating between cinematic and speech-forward weights
//! - [`downmix_71_to_51`] folds 7.1 into 5.1 by averaging the side and back
//!   pairs
//! - [`reweave_51_to_vorbis`] permutes 5.1 channels into the Vorbis order
//!
//! All transforms run in place over the track's buffer, poll the
//! cancellation token at a fixed frame cadence and report progress in
//! [0, 1].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod order;
pub mod transformer;

pub use error::{LayoutError, Result};
pub use order::vorbis_order;
pub use transformer::{
    downmix_71_to_51, downmix_to_stereo, reweave_51_to_vorbis, upmix_mono_to_stereo,
};
