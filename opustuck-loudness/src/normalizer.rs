//! Whole-track peak normalization.

use crate::error::{LoudnessError, Result};
use opustuck_core::{CancelToken, Track, MINUS_ONE_THOUSANDTH_DECIBEL, POLL_MASK};

/// Scale whole channel groups so their peak lands at -0.001 dBFS.
///
/// The track is scanned once to find two peaks: the largest absolute sample
/// across all LFE channels and the largest across everything else. Each
/// group is then multiplied by its own factor, so bass headroom is not
/// wasted on a loud dialog channel and vice versa.
///
/// With `allow_volume_decrease` set to false, a group whose peak already
/// reaches or exceeds full scale is left untouched. Scaling such a group
/// down would fight the de-clipper, which handles over-full signals far
/// more gently than a whole-channel gain change.
///
/// Progress is reported as [0, 0.5] over the scan pass and [0.5, 1] over
/// the scale pass; cancellation is polled at the usual frame cadence.
pub fn normalize_track(
    track: &mut Track,
    allow_volume_decrease: bool,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    let channel_count = track.channel_count();
    if channel_count == 0 {
        return Err(LoudnessError::NoChannels);
    }
    let frame_count = track.frame_count();

    let lfe_mask: Vec<bool> = track
        .channels
        .iter()
        .map(|channel| channel.placement.is_lfe())
        .collect();

    // Scan pass: one peak per group.
    let mut max_bass = 0.0f32;
    let mut max_other = 0.0f32;
    for frame in 0..frame_count {
        let base = frame * channel_count;
        for (channel, is_lfe) in lfe_mask.iter().enumerate() {
            let amplitude = track.samples[base + channel].abs();
            if *is_lfe {
                max_bass = max_bass.max(amplitude);
            } else {
                max_other = max_other.max(amplitude);
            }
        }

        if frame & POLL_MASK == 0 {
            cancel.bail().map_err(LoudnessError::from)?;
            progress(frame as f32 / frame_count as f32 / 2.0);
        }
    }

    let bass_factor = scale_factor(max_bass, allow_volume_decrease);
    let other_factor = scale_factor(max_other, allow_volume_decrease);
    if bass_factor.is_none() && other_factor.is_none() {
        progress(1.0);
        return Ok(());
    }

    // Scale pass.
    for frame in 0..frame_count {
        let base = frame * channel_count;
        for (channel, is_lfe) in lfe_mask.iter().enumerate() {
            let factor = if *is_lfe { bass_factor } else { other_factor };
            if let Some(factor) = factor {
                track.samples[base + channel] *= factor;
            }
        }

        if frame & POLL_MASK == 0 {
            cancel.bail().map_err(LoudnessError::from)?;
            progress(0.5 + frame as f32 / frame_count as f32 / 2.0);
        }
    }

    Ok(())
}

/// Gain that brings `peak` to -0.001 dBFS, or `None` when the group should
/// be left alone (silent, or already at full scale without permission to
/// scale down).
fn scale_factor(peak: f32, allow_volume_decrease: bool) -> Option<f32> {
    if peak <= 0.0 {
        return None;
    }
    if !allow_volume_decrease && peak >= 1.0 {
        return None;
    }
    Some(MINUS_ONE_THOUSANDTH_DECIBEL / peak)
}
