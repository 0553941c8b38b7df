//! # Opustuck Core
//!
//! Core types and utilities for the opustuck transcoding engine.
//!
//! This crate provides the fundamental building blocks used across all
//! opustuck components:
//! - Error handling types
//! - The [`Track`] / [`Channel`] audio data model with interleaved samples
//! - Clipping half-wave metadata used by the de-clipper
//! - Cooperative cancellation ([`CancelToken`])
//! - An in-memory byte blob standing in for the output file until it is
//!   complete ([`MemoryBlob`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod cancel;
pub mod error;
pub mod halfwave;
pub mod track;

pub use blob::MemoryBlob;
pub use cancel::{CancelToken, POLL_MASK};
pub use error::{Error, Result};
pub use halfwave::ClippingHalfwave;
pub use track::{Channel, ChannelPlacement, Track};

/// Linear amplitude at -0.001 dBFS.
///
/// Scaling a peak to this value instead of exactly 1.0 leaves a tiny safety
/// margin so the result stays strictly below full scale.
pub const MINUS_ONE_THOUSANDTH_DECIBEL: f32 = 0.999_884_9;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
