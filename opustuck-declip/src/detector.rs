//! Locating clipping half-waves.
//!
//! A half-wave is a run of consecutive samples that all lie on one side of
//! the zero line. The detector records every half-wave containing at least
//! one sample beyond full scale; the tucker then scales exactly those runs
//! down. Zero counts as non-negative throughout, so the threshold behaves
//! identically on both sides of the axis.

use crate::error::{DeclipError, Result};
use opustuck_core::{CancelToken, ClippingHalfwave, Track, POLL_MASK};

/// Number of iterations a half-wave may sit at an unchanged peak before the
/// iterative loop gives up on it.
pub const MAX_INEFFECTIVE_ITERATIONS: u32 = 10;

/// Scan every channel of the track and rebuild its clipping half-wave list.
///
/// Any previously recorded half-waves are discarded. Each recorded wave
/// spans from its prior zero crossing (inclusive) to its next zero crossing
/// (exclusive); a wave still in progress when the buffer ends is closed at
/// the frame count. Peak amplitudes are stored as absolute values.
pub fn find_clipping_halfwaves(
    track: &mut Track,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    let channel_count = track.channel_count();
    let frame_count = track.frame_count();
    if frame_count == 0 {
        for channel in &mut track.channels {
            channel.clipping_halfwaves.clear();
        }
        return Ok(());
    }

    // Channels are processed one at a time; tracking zero crossings for all
    // channels in a single pass gains nothing and muddles the indices.
    for channel_index in 0..channel_count {
        let mut halfwaves = Vec::new();

        let first = track.samples[channel_index];
        let mut clipping_peak = first.abs();
        let mut clipping_peak_index = 0usize;
        let mut was_clipping = first.abs() > 1.0;
        let mut was_below_zero = first < 0.0;
        let mut zero_crossing_index = 0usize;

        for index in 1..frame_count {
            let sample = track.samples[index * channel_count + channel_index];

            // On a zero crossing, the current half-wave ends. Record it if
            // it clipped, then start tracking the new one.
            let is_below_zero = sample < 0.0;
            if was_below_zero != is_below_zero {
                if was_clipping {
                    halfwaves.push(ClippingHalfwave::new(
                        zero_crossing_index,
                        clipping_peak_index,
                        index,
                        clipping_peak,
                    ));
                    was_clipping = false;
                    clipping_peak = 0.0;
                }
                zero_crossing_index = index;
                was_below_zero = is_below_zero;
            }

            if sample.abs() > 1.0 {
                was_clipping = true;
                if clipping_peak < sample.abs() {
                    clipping_peak = sample.abs();
                    clipping_peak_index = index;
                }
            }

            if index & POLL_MASK == 0 {
                cancel.bail().map_err(DeclipError::from)?;
                progress(
                    channel_index as f32 / channel_count as f32
                        + index as f32 / frame_count as f32 / channel_count as f32,
                );
            }
        }

        // A wave that runs into the end of the buffer closes at frame_count.
        if was_clipping {
            halfwaves.push(ClippingHalfwave::new(
                zero_crossing_index,
                clipping_peak_index,
                frame_count,
                clipping_peak,
            ));
        }

        track.channels[channel_index].clipping_halfwaves = halfwaves;
    }

    Ok(())
}

/// Merge half-waves freshly detected on the decoded track into the source
/// track's lists.
///
/// A decoded half-wave that intersects an existing source half-wave simply
/// overwrites its peak amplitude; the quantization step of the codec moves
/// waveforms around a little, but touching ranges are taken to be the same
/// wave. A decoded half-wave with no counterpart means the codec introduced
/// clipping where the source had none, so an equivalent half-wave is
/// synthesized around the same position in the source and inserted in
/// order. Its peak is left at zero for the next [`update_clipping_halfwaves`]
/// pass to fill in.
pub fn integrate_clipping_halfwaves(source: &mut Track, decoded: &Track) -> Result<()> {
    if source.channel_count() != decoded.channel_count() {
        return Err(DeclipError::ChannelMismatch {
            source_channels: source.channel_count(),
            decoded: decoded.channel_count(),
        });
    }
    if source.samples.len() != decoded.samples.len() {
        return Err(DeclipError::BufferMismatch {
            actual: decoded.samples.len(),
            expected: source.samples.len(),
        });
    }

    for channel_index in 0..source.channel_count() {
        let decoded_halfwaves = &decoded.channels[channel_index].clipping_halfwaves;

        for fresh in decoded_halfwaves {
            let existing_index = source.channels[channel_index]
                .clipping_halfwaves
                .iter()
                .position(|existing| fresh.intersects(existing));

            match existing_index {
                Some(index) => {
                    source.channels[channel_index].clipping_halfwaves[index].peak_amplitude =
                        fresh.peak_amplitude;
                }
                None => {
                    let synthesized =
                        halfwave_around_sample(source, channel_index, fresh.peak_index);
                    let halfwaves = &mut source.channels[channel_index].clipping_halfwaves;
                    let insert_at = halfwaves.partition_point(|existing| {
                        existing.prior_zero_crossing_index
                            < synthesized.prior_zero_crossing_index
                    });
                    halfwaves.insert(insert_at, synthesized);
                }
            }
        }
    }

    Ok(())
}

/// Find the half-wave in the source buffer that surrounds `sample_index`.
///
/// Walks backward and forward from the sample until the signal crosses the
/// zero line. The actual peak is unknown at this point (it lives in the
/// decoded buffer), so it is left at zero.
fn halfwave_around_sample(
    track: &Track,
    channel_index: usize,
    sample_index: usize,
) -> ClippingHalfwave {
    let frame_count = track.frame_count();
    let starts_above_zero = track.sample_at(channel_index, sample_index) >= 0.0;

    // The start index is inclusive; stop while the preceding sample is
    // still on the same side.
    let mut prior_crossing_index = sample_index;
    while prior_crossing_index > 0 {
        let preceding = track.sample_at(channel_index, prior_crossing_index - 1);
        if (preceding >= 0.0) != starts_above_zero {
            break;
        }
        prior_crossing_index -= 1;
    }

    // The end index is exclusive; advance to the first sample on the other
    // side, or to the buffer end.
    let mut next_crossing_index = sample_index + 1;
    while next_crossing_index < frame_count {
        let sample = track.sample_at(channel_index, next_crossing_index);
        if (sample >= 0.0) != starts_above_zero {
            break;
        }
        next_crossing_index += 1;
    }

    ClippingHalfwave::new(prior_crossing_index, sample_index, next_crossing_index, 0.0)
}

/// Re-measure every recorded half-wave against the given sample buffer.
///
/// The buffer must have the same geometry as the track; it is usually the
/// freshly decoded Opus output. Each half-wave's window is re-scanned for
/// its absolute peak. A peak identical to the previous measurement bumps the
/// wave's ineffective-iteration count, any change resets it.
///
/// Returns the number of half-waves that still clip and have not yet
/// exhausted their [`MAX_INEFFECTIVE_ITERATIONS`]; the iterative loop stops
/// once this reaches zero.
pub fn update_clipping_halfwaves(
    track: &mut Track,
    samples: &[f32],
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<usize> {
    if samples.len() != track.samples.len() {
        return Err(DeclipError::BufferMismatch {
            actual: samples.len(),
            expected: track.samples.len(),
        });
    }

    let channel_count = track.channel_count();
    let frame_count = track.frame_count();
    let mut clipping_peak_count = 0usize;

    for channel_index in 0..channel_count {
        let halfwave_count = track.channels[channel_index].clipping_halfwaves.len();

        for clip_index in 0..halfwave_count {
            cancel.bail().map_err(DeclipError::from)?;

            let halfwave = &mut track.channels[channel_index].clipping_halfwaves[clip_index];
            if halfwave.next_zero_crossing_index > frame_count {
                return Err(DeclipError::RangeOutOfBounds {
                    start: halfwave.prior_zero_crossing_index,
                    end: halfwave.next_zero_crossing_index,
                    frames: frame_count,
                });
            }

            let mut peak = 0.0f32;
            for sample_index in halfwave.range() {
                let amplitude = samples[sample_index * channel_count + channel_index].abs();
                if peak < amplitude {
                    peak = amplitude;
                }
            }

            // Unchanged peaks accumulate toward the give-up threshold so a
            // wave the codec refuses to move does not stall the loop forever.
            if peak != halfwave.peak_amplitude {
                halfwave.ineffective_iteration_count = 0;
                halfwave.peak_amplitude = peak;
            } else {
                halfwave.ineffective_iteration_count += 1;
            }

            if peak > 1.0 && halfwave.ineffective_iteration_count < MAX_INEFFECTIVE_ITERATIONS {
                clipping_peak_count += 1;
            }
        }

        progress((channel_index + 1) as f32 / channel_count as f32);
    }

    Ok(clipping_peak_count)
}

/// Verify that every channel's half-wave list is ordered and disjoint.
pub fn verify_consistency(track: &Track) -> Result<()> {
    for (channel_index, channel) in track.channels.iter().enumerate() {
        let mut previous_end = 0usize;
        for halfwave in &channel.clipping_halfwaves {
            if halfwave.prior_zero_crossing_index < previous_end {
                return Err(DeclipError::OverlappingHalfwaves {
                    channel: channel_index,
                    frame: halfwave.prior_zero_crossing_index,
                });
            }
            previous_end = halfwave.next_zero_crossing_index;
        }
    }
    Ok(())
}
