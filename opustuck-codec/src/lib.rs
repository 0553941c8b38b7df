//! # Opustuck Codec
//!
//! Bridges between the opustuck engine and external audio codecs.
//!
//! The engine neither decodes containers nor implements Opus itself; both
//! sit behind narrow trait seams supplied by the hosting application:
//!
//! - [`TrackSource`] hands out decoded interleaved float PCM plus the
//!   channel geometry of one audio track
//! - [`AudioLoader`] opens a [`TrackSource`] over a file path or over an
//!   in-memory encoded blob (the latter feeds the iterative de-clipper)
//! - [`OpusStreamEncoder`] / [`OpusEncoderFactory`] consume interleaved
//!   float PCM and produce the encoded byte stream
//!
//! On top of those seams this crate implements the two bridges the
//! transcode pipeline drives: [`read_track`] pulls a whole track into
//! memory in cancellation-friendly chunks, and [`encode_track`] feeds a
//! finished track to the encoder and collects the output into a
//! [`MemoryBlob`](opustuck_core::MemoryBlob).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sink;
pub mod source;

pub use sink::{
    encode_track, Application, EncoderParams, OpusEncoderFactory, OpusStreamEncoder, Signal,
    ENCODE_CHUNK_FRAMES,
};
pub use source::{read_track, AudioLoader, TrackSource, MAX_DECODE_CHUNK_FRAMES};
