//! Pulling decoded audio from an external source into a [`Track`].

use opustuck_core::{
    CancelToken, ChannelPlacement, Error, MemoryBlob, Result, Track,
};
use std::path::Path;
use tracing::debug;

/// Upper bound on the number of frames decoded per call, one second of
/// audio at 48 kHz. Smaller chunks keep cancellation responsive.
pub const MAX_DECODE_CHUNK_FRAMES: usize = 48_000;

/// One decodable audio track exposed by an external decoder.
///
/// Implementations wrap whatever container/codec library the hosting
/// application uses. All the engine needs is the channel geometry and a way
/// to pull interleaved float PCM a frame range at a time.
pub trait TrackSource {
    /// Number of channels in the track.
    fn channel_count(&self) -> usize;

    /// Total number of frames in the track.
    fn frame_count(&self) -> u64;

    /// Playback sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Placements of the channels in their interleaved order.
    fn channel_order(&self) -> Vec<ChannelPlacement>;

    /// Decode `frame_count` frames starting at `start_frame` into `dest`.
    ///
    /// `dest` holds exactly `frame_count * channel_count()` floats,
    /// interleaved in the source's channel order. Failures are wrapped
    /// verbatim in [`Error::DecodeFailed`].
    fn decode_interleaved(
        &mut self,
        dest: &mut [f32],
        start_frame: u64,
        frame_count: usize,
    ) -> Result<()>;
}

/// Opens [`TrackSource`] instances over the inputs the engine encounters.
///
/// `open_path` serves the user's input file; `open_blob` serves the encoded
/// Opus stream the iterative de-clipper needs to hear back.
pub trait AudioLoader: Send + Sync {
    /// Open the first audio track of the file at `path`.
    ///
    /// Fails with [`Error::UnsupportedFormat`] when the file holds no audio
    /// track or cannot deliver float samples, with [`Error::Io`] when the
    /// file cannot be read.
    fn open_path(&self, path: &Path) -> Result<Box<dyn TrackSource>>;

    /// Open the audio track of an in-memory encoded stream.
    fn open_blob(&self, blob: &MemoryBlob) -> Result<Box<dyn TrackSource>>;
}

/// Largest power-of-two fraction of `frame_count` that still fits the
/// per-call bound.
fn chunk_frames(frame_count: u64) -> usize {
    let mut chunk = frame_count;
    while chunk > MAX_DECODE_CHUNK_FRAMES as u64 {
        chunk >>= 1;
    }
    chunk as usize
}

/// Decode every frame of the source into a freshly allocated [`Track`].
///
/// The buffer is preallocated up front ([`Error::AllocationFailed`] when
/// that is refused); decoding then proceeds chunk by chunk, checking the
/// cancellation token and reporting progress in [0, 1] after each chunk.
pub fn read_track(
    source: &mut dyn TrackSource,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<Track> {
    let channel_count = source.channel_count();
    if channel_count == 0 {
        return Err(Error::unsupported_format("track has no audio channels"));
    }
    let order = source.channel_order();
    if order.len() != channel_count {
        return Err(Error::unsupported_format(format!(
            "decoder reports {} channels but orders {}",
            channel_count,
            order.len()
        )));
    }

    let total_frame_count = source.frame_count();
    debug!(
        channels = channel_count,
        frames = total_frame_count,
        sample_rate = source.sample_rate(),
        "reading track into memory"
    );

    let mut track = Track::new(&order, total_frame_count, source.sample_rate())?;

    let mut frames_per_chunk = chunk_frames(total_frame_count);
    let mut write_frame_index = 0u64;
    let mut remaining_frame_count = total_frame_count;

    while remaining_frame_count > 0 {
        if remaining_frame_count < frames_per_chunk as u64 {
            frames_per_chunk = remaining_frame_count as usize;
        }

        let start = write_frame_index as usize * channel_count;
        let end = start + frames_per_chunk * channel_count;
        source.decode_interleaved(
            &mut track.samples[start..end],
            write_frame_index,
            frames_per_chunk,
        )?;
        cancel.bail()?;

        write_frame_index += frames_per_chunk as u64;
        remaining_frame_count -= frames_per_chunk as u64;

        progress(write_frame_index as f32 / total_frame_count as f32);
    }

    Ok(track)
}
