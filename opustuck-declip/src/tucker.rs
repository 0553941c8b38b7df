//! Scaling clipping half-waves back under full scale.
//!
//! Rather than hard-limiting individual samples, the tucker scales each
//! clipping half-wave as a whole, so the waveform keeps its shape and only
//! loses a little level over a fraction of a cycle. Samples outside the
//! recorded half-waves are never touched.

use crate::error::{DeclipError, Result};
use opustuck_core::{
    CancelToken, ClippingHalfwave, Track, MINUS_ONE_THOUSANDTH_DECIBEL, POLL_MASK,
};

/// Work out the quotient to divide a half-wave's samples by and record it.
///
/// The measured peak is trusted as-is; no re-scan happens here. In the
/// iterative loop the peak was collected from the decoded Opus stream while
/// the division is applied to the original samples, which is exactly what
/// keeps generation loss out of the output.
///
/// When the wave still clips after an earlier attempt, the previous quotient
/// is folded in, so every retry overshoots by the residual the codec put
/// back. A wave that no longer clips reuses its proven quotient unchanged.
/// The result is inflated slightly so the post-tuck peak lands at
/// -0.001 dBFS instead of exactly 0 dBFS.
fn update_and_return_volume_quotient(halfwave: &mut ClippingHalfwave) -> f32 {
    let quotient = if halfwave.peak_amplitude > 1.0 {
        let mut quotient = halfwave.peak_amplitude.abs();
        if halfwave.volume_quotient != 0.0 {
            quotient *= halfwave.volume_quotient;
        }
        halfwave.volume_quotient = quotient;
        quotient
    } else {
        halfwave.volume_quotient
    };

    quotient / MINUS_ONE_THOUSANDTH_DECIBEL
}

/// Scale every recorded clipping half-wave of the track in place.
pub fn tuck_halfwaves(
    track: &mut Track,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    let channel_count = track.channel_count();
    let frame_count = track.frame_count();

    for channel_index in 0..channel_count {
        let halfwave_count = track.channels[channel_index].clipping_halfwaves.len();

        for halfwave_index in 0..halfwave_count {
            let (range, quotient) = {
                let halfwave =
                    &mut track.channels[channel_index].clipping_halfwaves[halfwave_index];
                check_range(halfwave, frame_count)?;
                (halfwave.range(), update_and_return_volume_quotient(halfwave))
            };
            if quotient <= 0.0 {
                // Never clipped and never scaled; nothing to apply.
                continue;
            }

            for index in range {
                track.samples[index * channel_count + channel_index] /= quotient;

                if index & POLL_MASK == 0 {
                    cancel.bail().map_err(DeclipError::from)?;
                    progress(
                        channel_index as f32 / channel_count as f32
                            + index as f32 / frame_count as f32 / channel_count as f32,
                    );
                }
            }
        }
    }

    Ok(())
}

/// Copy the track's samples into `tucked`, scaling the clipping half-waves
/// on the way.
///
/// The source track is left untouched. The iterative loop runs this once per
/// pass over the pristine source, so quantization loss never accumulates
/// across iterations. Every sample is copied: the spans before, between and
/// after the half-waves verbatim, the half-wave spans divided by their
/// quotient.
pub fn copy_and_tuck(
    track: &mut Track,
    tucked: &mut [f32],
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    if tucked.len() != track.samples.len() {
        return Err(DeclipError::BufferMismatch {
            actual: tucked.len(),
            expected: track.samples.len(),
        });
    }

    let channel_count = track.channel_count();
    let frame_count = track.frame_count();

    for channel_index in 0..channel_count {
        let mut copy_start_index = 0usize;
        let halfwave_count = track.channels[channel_index].clipping_halfwaves.len();

        for halfwave_index in 0..halfwave_count {
            let (range, quotient) = {
                let halfwave =
                    &mut track.channels[channel_index].clipping_halfwaves[halfwave_index];
                check_range(halfwave, frame_count)?;
                (halfwave.range(), update_and_return_volume_quotient(halfwave))
            };

            // Verbatim up to where the half-wave begins
            for index in copy_start_index..range.start {
                let flat = index * channel_count + channel_index;
                tucked[flat] = track.samples[flat];
                poll(index, channel_index, channel_count, frame_count, cancel, progress)?;
            }

            if quotient > 0.0 {
                for index in range.clone() {
                    let flat = index * channel_count + channel_index;
                    tucked[flat] = track.samples[flat] / quotient;
                    poll(index, channel_index, channel_count, frame_count, cancel, progress)?;
                }
            } else {
                for index in range.clone() {
                    let flat = index * channel_count + channel_index;
                    tucked[flat] = track.samples[flat];
                    poll(index, channel_index, channel_count, frame_count, cancel, progress)?;
                }
            }

            copy_start_index = range.end;
        }

        // Tail between the last half-wave and the channel's end; for a track
        // with little clipping this span carries the brunt of the audio.
        for index in copy_start_index..frame_count {
            let flat = index * channel_count + channel_index;
            tucked[flat] = track.samples[flat];
            poll(index, channel_index, channel_count, frame_count, cancel, progress)?;
        }
    }

    Ok(())
}

fn check_range(halfwave: &ClippingHalfwave, frame_count: usize) -> Result<()> {
    if halfwave.next_zero_crossing_index > frame_count
        || halfwave.prior_zero_crossing_index > halfwave.next_zero_crossing_index
    {
        return Err(DeclipError::RangeOutOfBounds {
            start: halfwave.prior_zero_crossing_index,
            end: halfwave.next_zero_crossing_index,
            frames: frame_count,
        });
    }
    Ok(())
}

#[inline]
fn poll(
    index: usize,
    channel_index: usize,
    channel_count: usize,
    frame_count: usize,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    if index & POLL_MASK == 0 {
        cancel.bail().map_err(DeclipError::from)?;
        progress(
            channel_index as f32 / channel_count as f32
                + index as f32 / frame_count as f32 / channel_count as f32,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::find_clipping_halfwaves;
    use opustuck_core::ChannelPlacement::*;

    fn mono_track(samples: &[f32]) -> Track {
        let mut track = Track::new(&[FrontCenter], samples.len() as u64, 48000).unwrap();
        track.samples.copy_from_slice(samples);
        track
    }

    fn max_abs(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |a, s| a.max(s.abs()))
    }

    #[test]
    fn test_tuck_quotient_first_pass() {
        let mut track = mono_track(&[1.1, 0.9, 0.5, 0.3, 0.1, -0.2]);
        track.channels[0].clipping_halfwaves = vec![ClippingHalfwave::new(0, 0, 5, 2.0)];

        tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        // Every sample in the wave divided by 2.0 / 0.99988...
        let applied = 2.0 / MINUS_ONE_THOUSANDTH_DECIBEL;
        assert!((track.samples[0] - 1.1 / applied).abs() < 1e-6);
        assert!((max_abs(&track.samples[0..5]) - 0.5499).abs() < 1e-3);
        // Sample outside the wave untouched
        assert_eq!(track.samples[5], -0.2);
        // Quotient recorded for the next iteration
        assert_eq!(track.channels[0].clipping_halfwaves[0].volume_quotient, 2.0);
    }

    #[test]
    fn test_tuck_overshoots_on_retry() {
        let mut track = mono_track(&[1.05, 0.5, -0.2]);
        // An earlier pass divided by 2.0 but the decoded stream still
        // clipped at 1.05 inside this wave.
        let mut wave = ClippingHalfwave::new(0, 0, 2, 1.05);
        wave.volume_quotient = 2.0;
        track.channels[0].clipping_halfwaves = vec![wave];

        tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        let wave = &track.channels[0].clipping_halfwaves[0];
        assert!((wave.volume_quotient - 2.1).abs() < 1e-6);
        let applied = 2.1 / MINUS_ONE_THOUSANDTH_DECIBEL;
        assert!((track.samples[0] - 1.05 / applied).abs() < 1e-6);
    }

    #[test]
    fn test_tuck_reuses_proven_quotient() {
        let mut track = mono_track(&[0.9, 0.5, -0.2]);
        // The wave no longer clips; its proven quotient is applied as-is.
        let mut wave = ClippingHalfwave::new(0, 0, 2, 0.95);
        wave.volume_quotient = 1.5;
        track.channels[0].clipping_halfwaves = vec![wave];

        tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        let applied = 1.5 / MINUS_ONE_THOUSANDTH_DECIBEL;
        assert!((track.samples[0] - 0.9 / applied).abs() < 1e-6);
        assert_eq!(track.channels[0].clipping_halfwaves[0].volume_quotient, 1.5);
    }

    #[test]
    fn test_detect_then_tuck_round_trip() {
        let mut track = mono_track(&[
            0.3, 1.4, 1.2, 0.4, -0.2, -1.05, -0.6, 0.2, 0.8, 1.01, -0.3,
        ]);

        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();
        tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();
        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        assert!(track.channels[0].clipping_halfwaves.is_empty());
        assert!(max_abs(&track.samples) <= MINUS_ONE_THOUSANDTH_DECIBEL + 1e-6);
    }

    #[test]
    fn test_tuck_rejects_out_of_range_wave() {
        let mut track = mono_track(&[1.2, 0.5]);
        track.channels[0].clipping_halfwaves = vec![ClippingHalfwave::new(0, 1, 7, 1.2)];

        let result = tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {});
        assert!(matches!(result, Err(DeclipError::RangeOutOfBounds { .. })));
    }

    #[test]
    fn test_copy_and_tuck_preserves_source() {
        let source_samples = [0.3f32, 1.4, 1.2, 0.4, -0.2, -0.5];
        let mut track = mono_track(&source_samples);
        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        let mut tucked = vec![0.0f32; source_samples.len()];
        copy_and_tuck(&mut track, &mut tucked, &CancelToken::new(), &mut |_| {}).unwrap();

        // Source untouched
        assert_eq!(track.samples, source_samples.to_vec());
        // Clipping span scaled, everything else copied verbatim
        let applied = 1.4 / MINUS_ONE_THOUSANDTH_DECIBEL;
        assert!((tucked[1] - 1.4 / applied).abs() < 1e-6);
        assert!((tucked[2] - 1.2 / applied).abs() < 1e-6);
        assert_eq!(tucked[4], -0.2);
        assert_eq!(tucked[5], -0.5);
        assert!(max_abs(&tucked) <= MINUS_ONE_THOUSANDTH_DECIBEL + 1e-6);
    }

    #[test]
    fn test_copy_and_tuck_covers_leading_and_trailing_spans() {
        let mut track = mono_track(&[0.1, 0.2, -1.3, -0.4, 0.5, 0.6]);
        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        let mut tucked = vec![9.0f32; 6];
        copy_and_tuck(&mut track, &mut tucked, &CancelToken::new(), &mut |_| {}).unwrap();

        assert_eq!(tucked[0], 0.1);
        assert_eq!(tucked[1], 0.2);
        assert_eq!(tucked[4], 0.5);
        assert_eq!(tucked[5], 0.6);
        assert!(tucked[2].abs() < 1.0);
    }

    #[test]
    fn test_copy_and_tuck_rejects_mismatched_buffer() {
        let mut track = mono_track(&[0.1, 0.2]);
        let mut tucked = vec![0.0f32; 5];
        let result = copy_and_tuck(&mut track, &mut tucked, &CancelToken::new(), &mut |_| {});
        assert!(matches!(result, Err(DeclipError::BufferMismatch { .. })));
    }

    #[test]
    fn test_stereo_tuck_leaves_other_channel_alone() {
        let mut track = Track::new(&[FrontLeft, FrontRight], 4, 48000).unwrap();
        // Left clips, right does not; interleaved L R L R ...
        track.samples = vec![1.5, 0.5, 0.9, 0.4, -0.1, 0.3, -0.2, 0.2];

        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();
        tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        // Right channel byte-identical
        assert_eq!(track.samples[1], 0.5);
        assert_eq!(track.samples[3], 0.4);
        assert_eq!(track.samples[5], 0.3);
        assert_eq!(track.samples[7], 0.2);
        // Left channel wave scaled under full scale
        assert!(track.samples[0].abs() < 1.0);
    }
}
