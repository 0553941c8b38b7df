//! Feeding a finished track to an external Opus encoder.

use opustuck_core::{CancelToken, Error, MemoryBlob, Result, Track};
use tracing::debug;

/// Frames submitted to the encoder per call. Regular enough that a cancel
/// request from the user gets a quick reaction.
pub const ENCODE_CHUNK_FRAMES: usize = 12_000;

/// Application hint handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Application {
    /// Voice over IP: optimized for speech at low bitrates.
    Voip,
    /// Generic audio: best for music and mixed content.
    #[default]
    Audio,
    /// Minimum latency mode.
    LowDelay,
}

/// Signal type hint handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    /// Let the encoder decide.
    Auto,
    /// Speech signal.
    Voice,
    /// Music signal.
    #[default]
    Music,
}

/// Everything the external encoder needs to be configured.
#[derive(Debug, Clone)]
pub struct EncoderParams {
    /// Input sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channel_count: usize,
    /// Vorbis mapping family: 0 for mono/stereo, 1 for surround.
    pub mapping_family: u8,
    /// Target bitrate in bits per second.
    pub bitrate_bits_per_second: u32,
    /// Encoder complexity, 0 through 10.
    pub complexity: u8,
    /// Application hint.
    pub application: Application,
    /// Signal type hint.
    pub signal: Signal,
}

impl EncoderParams {
    /// Derive encoder parameters for a track that is already woven in the
    /// Vorbis channel order.
    ///
    /// `effort` in [0, 1] maps linearly onto the encoder's complexity
    /// scale, reaching 10 at 1.0.
    pub fn for_track(track: &Track, bitrate_kbps: f32, effort: f32) -> Self {
        let channel_count = track.channel_count();
        Self {
            sample_rate: track.sample_rate,
            channel_count,
            mapping_family: if channel_count <= 2 { 0 } else { 1 },
            bitrate_bits_per_second: (bitrate_kbps * 1000.0) as u32,
            complexity: (effort.clamp(0.0, 1.0) * 10.0).round() as u8,
            application: Application::Audio,
            signal: Signal::Music,
        }
    }
}

/// An external Opus encoder mid-stream.
///
/// The engine feeds interleaved float PCM and finally drains the encoder;
/// the implementation buffers the produced bytes until [`finish`] hands
/// them over. Failures are wrapped verbatim in [`Error::EncodeFailed`].
///
/// [`finish`]: OpusStreamEncoder::finish
pub trait OpusStreamEncoder {
    /// Submit interleaved samples covering whole frames.
    fn write_float(&mut self, interleaved: &[f32]) -> Result<()>;

    /// Flush any internally buffered audio and return the encoded stream.
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Creates [`OpusStreamEncoder`] instances for given parameters.
pub trait OpusEncoderFactory: Send + Sync {
    /// Create an encoder configured with `params`.
    fn create(&self, params: &EncoderParams) -> Result<Box<dyn OpusStreamEncoder>>;
}

/// Feed `samples` (interleaved in the track's channel order) through a
/// fresh encoder and collect the encoded stream into a [`MemoryBlob`].
///
/// The samples are usually the track's own buffer, but the iterative
/// de-clipper passes its tucked scratch copy instead, so the buffer is an
/// explicit argument. Submission happens in [`ENCODE_CHUNK_FRAMES`] chunks
/// with a cancellation check and a progress report after each one.
pub fn encode_track(
    track: &Track,
    samples: &[f32],
    factory: &dyn OpusEncoderFactory,
    params: &EncoderParams,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<MemoryBlob> {
    let channel_count = track.channel_count();
    if channel_count == 0 {
        return Err(Error::invalid_state("track has no channels to encode"));
    }
    if samples.len() != track.samples.len() {
        return Err(Error::invalid_state(format!(
            "encode buffer holds {} samples, the track expects {}",
            samples.len(),
            track.samples.len()
        )));
    }

    debug!(
        channels = channel_count,
        bitrate = params.bitrate_bits_per_second,
        complexity = params.complexity,
        mapping_family = params.mapping_family,
        "encoding track"
    );

    let mut encoder = factory.create(params)?;

    let total_frame_count = samples.len() / channel_count;
    let mut remaining_frame_count = total_frame_count;
    let mut position = 0usize;

    while remaining_frame_count > 0 {
        let frames_in_chunk = remaining_frame_count.min(ENCODE_CHUNK_FRAMES);

        let end = position + frames_in_chunk * channel_count;
        encoder.write_float(&samples[position..end])?;
        position = end;
        remaining_frame_count -= frames_in_chunk;

        cancel.bail()?;
        progress((total_frame_count - remaining_frame_count) as f32 / total_frame_count as f32);
    }

    let bytes = encoder.finish()?;
    Ok(MemoryBlob::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opustuck_core::ChannelPlacement::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Encoder that records chunk sizes and stores the raw samples.
    struct RecordingEncoder {
        chunks: Arc<AtomicUsize>,
        bytes: Vec<u8>,
    }

    impl OpusStreamEncoder for RecordingEncoder {
        fn write_float(&mut self, interleaved: &[f32]) -> Result<()> {
            self.chunks.fetch_add(1, Ordering::SeqCst);
            for sample in interleaved {
                self.bytes.extend_from_slice(&sample.to_le_bytes());
            }
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<Vec<u8>> {
            Ok(self.bytes)
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        chunks: Arc<AtomicUsize>,
        created_with: std::sync::Mutex<Option<EncoderParams>>,
    }

    impl OpusEncoderFactory for RecordingFactory {
        fn create(&self, params: &EncoderParams) -> Result<Box<dyn OpusStreamEncoder>> {
            *self.created_with.lock().unwrap() = Some(params.clone());
            Ok(Box::new(RecordingEncoder {
                chunks: self.chunks.clone(),
                bytes: Vec::new(),
            }))
        }
    }

    fn stereo_track(frames: u64) -> Track {
        Track::new(&[FrontLeft, FrontRight], frames, 48000).unwrap()
    }

    #[test]
    fn test_params_for_stereo_track() {
        let track = stereo_track(10);
        let params = EncoderParams::for_track(&track, 192.0, 1.0);
        assert_eq!(params.mapping_family, 0);
        assert_eq!(params.bitrate_bits_per_second, 192_000);
        assert_eq!(params.complexity, 10);
        assert_eq!(params.application, Application::Audio);
        assert_eq!(params.signal, Signal::Music);
    }

    #[test]
    fn test_params_for_surround_track() {
        let track = Track::new(
            &[FrontLeft, FrontCenter, FrontRight, BackLeft, BackRight, Lfe],
            10,
            48000,
        )
        .unwrap();
        let params = EncoderParams::for_track(&track, 320.0, 0.45);
        assert_eq!(params.mapping_family, 1);
        assert_eq!(params.complexity, 5);
    }

    #[test]
    fn test_encode_track_chunks_and_collects() {
        let mut track = stereo_track(25_000);
        for (index, sample) in track.samples.iter_mut().enumerate() {
            *sample = index as f32;
        }

        let chunks = Arc::new(AtomicUsize::new(0));
        let factory = RecordingFactory {
            chunks: chunks.clone(),
            created_with: Default::default(),
        };
        let params = EncoderParams::for_track(&track, 192.0, 1.0);

        let samples = track.samples.clone();
        let blob = encode_track(
            &track,
            &samples,
            &factory,
            &params,
            &CancelToken::new(),
            &mut |_| {},
        )
        .unwrap();

        // 25_000 frames submitted as 12_000 + 12_000 + 1_000
        assert_eq!(chunks.load(Ordering::SeqCst), 3);
        assert_eq!(blob.size(), 25_000 * 2 * 4);
        let seen = factory.created_with.lock().unwrap().clone().unwrap();
        assert_eq!(seen.channel_count, 2);

        // Round-trip a few samples through the byte blob
        let mut buf = [0u8; 4];
        blob.read_at(4, &mut buf).unwrap();
        assert_eq!(f32::from_le_bytes(buf), 1.0);
    }

    #[test]
    fn test_encode_track_rejects_mismatched_buffer() {
        let track = stereo_track(10);
        let factory = RecordingFactory {
            chunks: Arc::new(AtomicUsize::new(0)),
            created_with: Default::default(),
        };
        let params = EncoderParams::for_track(&track, 192.0, 1.0);

        let result = encode_track(
            &track,
            &[0.0; 7],
            &factory,
            &params,
            &CancelToken::new(),
            &mut |_| {},
        );
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_encode_track_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let track = stereo_track(10);
        let factory = RecordingFactory {
            chunks: Arc::new(AtomicUsize::new(0)),
            created_with: Default::default(),
        };
        let params = EncoderParams::for_track(&track, 192.0, 1.0);
        let samples = track.samples.clone();

        let result = encode_track(&track, &samples, &factory, &params, &cancel, &mut |_| {});
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_encode_track_propagates_encoder_failure() {
        struct FailingFactory;
        struct FailingEncoder;

        impl OpusStreamEncoder for FailingEncoder {
            fn write_float(&mut self, _: &[f32]) -> Result<()> {
                Err(Error::encode_failed("encoder rejected samples"))
            }
            fn finish(self: Box<Self>) -> Result<Vec<u8>> {
                unreachable!()
            }
        }
        impl OpusEncoderFactory for FailingFactory {
            fn create(&self, _: &EncoderParams) -> Result<Box<dyn OpusStreamEncoder>> {
                Ok(Box::new(FailingEncoder))
            }
        }

        let track = stereo_track(10);
        let params = EncoderParams::for_track(&track, 192.0, 1.0);
        let samples = track.samples.clone();

        let result = encode_track(
            &track,
            &samples,
            &FailingFactory,
            &params,
            &CancelToken::new(),
            &mut |_| {},
        );
        assert!(
            matches!(result, Err(Error::EncodeFailed(msg)) if msg == "encoder rejected samples")
        );
    }
}
