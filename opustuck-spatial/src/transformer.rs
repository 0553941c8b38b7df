//! In-place channel layout transforms.
//!
//! All transforms rewrite the track's interleaved sample buffer directly and
//! finish by replacing the channel descriptions with the resulting Vorbis
//! order. Long loops poll the cancellation token and report progress in
//! [0, 1] every [`POLL_MASK`] + 1 frames.

use crate::error::{LayoutError, Result};
use opustuck_core::{CancelToken, ChannelPlacement, Track, POLL_MASK};

/// Half the square root of two, the -3 dB pan factor for a diagonal source.
const DIAGONAL: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Linearly interpolate between two coefficients.
#[inline]
fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from * (1.0 - t) + to * t
}

/// One source channel feeding a downmix target.
struct Contribution {
    /// Offset of the source channel within an interleaved frame.
    offset: usize,
    /// Linear gain applied to the source sample.
    factor: f32,
}

/// Upmix a mono track to stereo by copying each sample to both channels.
///
/// The sample values are carried over verbatim; attenuating by -3 dB would
/// just lower the perceived volume, and any clipping present in the source
/// is left for the de-clipper to handle.
pub fn upmix_mono_to_stereo(
    track: &mut Track,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    if track.channel_count() != 1 {
        return Err(LayoutError::InvalidChannelCount {
            count: track.channel_count(),
            expected: "1".into(),
        });
    }
    if track.channels[0].placement != ChannelPlacement::FrontCenter {
        return Err(LayoutError::unsupported(
            "mono channel without center placement cannot be upmixed to stereo",
        ));
    }

    let frame_count = track.frame_count();

    // The buffer doubles in size, so the copy has to run backwards or it
    // would overwrite samples it has not read yet.
    let needed = frame_count * 2;
    track
        .samples
        .try_reserve_exact(needed - track.samples.len())
        .map_err(|_| opustuck_core::Error::AllocationFailed {
            needed: needed * std::mem::size_of::<f32>(),
        })?;
    track.samples.resize(needed, 0.0);

    for index in (0..frame_count).rev() {
        let sample = track.samples[index];
        track.samples[index * 2] = sample;
        track.samples[index * 2 + 1] = sample;

        if index & POLL_MASK == 0 {
            cancel.bail().map_err(LayoutError::from)?;
            progress((frame_count - index) as f32 / frame_count as f32);
        }
    }

    track.set_channel_layout(&[ChannelPlacement::FrontLeft, ChannelPlacement::FrontRight]);
    Ok(())
}

/// Downmix a 5.1 or 7.1 track to stereo.
///
/// `nightmode_level` interpolates between cinematic weighting at 0.0 (center
/// at -3 dB, fronts at unity, surrounds at -3 dB) and a speech-forward
/// weighting at 1.0 (center at unity, everything else at 0.3). When both a
/// side and a back channel exist on the same side, each contributes half so
/// the pair sums to the unsplit coefficient.
pub fn downmix_to_stereo(
    track: &mut Track,
    nightmode_level: f32,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    let channel_count = track.channel_count();
    if channel_count != 6 && channel_count != 8 {
        return Err(LayoutError::InvalidChannelCount {
            count: channel_count,
            expected: "6 or 8".into(),
        });
    }

    // Collect which source channels feed each stereo output. Anything not
    // matching a known role (the LFE in particular) contributes nothing.
    let mut mapping: [Vec<Contribution>; 2] = [Vec::new(), Vec::new()];
    for (index, channel) in track.channels.iter().enumerate() {
        match channel.placement {
            ChannelPlacement::FrontCenter => {
                let factor = lerp(DIAGONAL, 1.0, nightmode_level);
                mapping[0].push(Contribution { offset: index, factor });
                mapping[1].push(Contribution { offset: index, factor });
            }
            ChannelPlacement::FrontLeft => {
                let factor = lerp(1.0, 0.3, nightmode_level);
                mapping[0].push(Contribution { offset: index, factor });
            }
            ChannelPlacement::FrontRight => {
                let factor = lerp(1.0, 0.3, nightmode_level);
                mapping[1].push(Contribution { offset: index, factor });
            }
            ChannelPlacement::SideLeft | ChannelPlacement::BackLeft => {
                let mut factor = lerp(DIAGONAL, 0.3, nightmode_level);
                if channel_count > 6 {
                    // Side and back both present; each adds half.
                    factor /= 2.0;
                }
                mapping[0].push(Contribution { offset: index, factor });
            }
            ChannelPlacement::SideRight | ChannelPlacement::BackRight => {
                let mut factor = lerp(DIAGONAL, 0.3, nightmode_level);
                if channel_count > 6 {
                    factor /= 2.0;
                }
                mapping[1].push(Contribution { offset: index, factor });
            }
            _ => {}
        }
    }

    // A standard layout yields 3 contributions per side, or 4 with the
    // side/back pair split. Anything else is a layout this downmix would
    // render too quiet, too loud or empty.
    if mapping[0].len() != 3 && mapping[0].len() != 4 {
        return Err(LayoutError::unsupported(
            "channel layout is non-standard and can't be downmixed to stereo",
        ));
    }
    if mapping[1].len() != mapping[0].len() {
        return Err(LayoutError::unsupported(
            "channel layout is non-standard and can't be downmixed to stereo",
        ));
    }

    let frame_count = track.frame_count();
    for frame in 0..frame_count {
        let read_base = frame * channel_count;
        let mut left = 0.0;
        let mut right = 0.0;
        for contribution in &mapping[0] {
            left += track.samples[read_base + contribution.offset] * contribution.factor;
        }
        for contribution in &mapping[1] {
            right += track.samples[read_base + contribution.offset] * contribution.factor;
        }

        // The write cursor trails the read cursor, so rewriting in place is
        // safe as long as both outputs are computed before storing them.
        track.samples[frame * 2] = left;
        track.samples[frame * 2 + 1] = right;

        if frame & POLL_MASK == 0 {
            cancel.bail().map_err(LayoutError::from)?;
            progress(frame as f32 / frame_count as f32);
        }
    }

    track.samples.truncate(frame_count * 2);
    track.samples.shrink_to_fit();
    track.set_channel_layout(&[ChannelPlacement::FrontLeft, ChannelPlacement::FrontRight]);
    Ok(())
}

/// Downmix a 7.1 track to 5.1 in the Vorbis order.
///
/// Front channels and the LFE are carried over unchanged; the rear outputs
/// average the side and back channel of their side.
pub fn downmix_71_to_51(
    track: &mut Track,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    if track.channel_count() != 8 {
        return Err(LayoutError::InvalidChannelCount {
            count: track.channel_count(),
            expected: "8".into(),
        });
    }

    let mut front_left = None;
    let mut front_center = None;
    let mut front_right = None;
    let mut lfe = None;
    let mut side_left = None;
    let mut back_left = None;
    let mut side_right = None;
    let mut back_right = None;
    for (index, channel) in track.channels.iter().enumerate() {
        match channel.placement {
            ChannelPlacement::FrontLeft => front_left = Some(index),
            ChannelPlacement::FrontCenter => front_center = Some(index),
            ChannelPlacement::FrontRight => front_right = Some(index),
            ChannelPlacement::Lfe => lfe = Some(index),
            ChannelPlacement::SideLeft => side_left = Some(index),
            ChannelPlacement::BackLeft => back_left = Some(index),
            ChannelPlacement::SideRight => side_right = Some(index),
            ChannelPlacement::BackRight => back_right = Some(index),
            _ => {}
        }
    }

    let require = |slot: Option<usize>, name: &str| {
        slot.ok_or_else(|| LayoutError::MissingChannel(name.to_string()))
    };
    let front_left = require(front_left, "FL")?;
    let front_center = require(front_center, "FC")?;
    let front_right = require(front_right, "FR")?;
    let lfe = require(lfe, "LFE")?;
    let side_left = require(side_left, "SL")?;
    let back_left = require(back_left, "BL")?;
    let side_right = require(side_right, "SR")?;
    let back_right = require(back_right, "BR")?;

    let frame_count = track.frame_count();
    for frame in 0..frame_count {
        let read_base = frame * 8;
        let write_base = frame * 6;

        // Pull the whole frame out first; for the first few frames the
        // write window overlaps the read window.
        let mut scratch = [0.0f32; 8];
        scratch.copy_from_slice(&track.samples[read_base..read_base + 8]);

        track.samples[write_base] = scratch[front_left];
        track.samples[write_base + 1] = scratch[front_center];
        track.samples[write_base + 2] = scratch[front_right];
        track.samples[write_base + 3] = (scratch[side_left] + scratch[back_left]) / 2.0;
        track.samples[write_base + 4] = (scratch[side_right] + scratch[back_right]) / 2.0;
        track.samples[write_base + 5] = scratch[lfe];

        if frame & POLL_MASK == 0 {
            cancel.bail().map_err(LayoutError::from)?;
            progress(frame as f32 / frame_count as f32);
        }
    }

    track.samples.truncate(frame_count * 6);
    track.samples.shrink_to_fit();
    track.set_channel_layout(&[
        ChannelPlacement::FrontLeft,
        ChannelPlacement::FrontCenter,
        ChannelPlacement::FrontRight,
        ChannelPlacement::BackLeft,
        ChannelPlacement::BackRight,
        ChannelPlacement::Lfe,
    ]);
    Ok(())
}

/// Reorder a 5.1 track into the Vorbis interleave order.
///
/// Side and back channels are treated as interchangeable when locating the
/// rear slots, so a 5.1(side) source reweaves the same way as 5.1(back).
pub fn reweave_51_to_vorbis(
    track: &mut Track,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<()> {
    if track.channel_count() != 6 {
        return Err(LayoutError::InvalidChannelCount {
            count: track.channel_count(),
            expected: "6".into(),
        });
    }

    // mapping[target slot] = source offset within the frame
    let mut mapping: [Option<usize>; 6] = [None; 6];
    for (index, channel) in track.channels.iter().enumerate() {
        match channel.placement {
            ChannelPlacement::FrontLeft => mapping[0] = Some(index),
            ChannelPlacement::FrontCenter => mapping[1] = Some(index),
            ChannelPlacement::FrontRight => mapping[2] = Some(index),
            ChannelPlacement::SideLeft | ChannelPlacement::BackLeft => mapping[3] = Some(index),
            ChannelPlacement::SideRight | ChannelPlacement::BackRight => mapping[4] = Some(index),
            ChannelPlacement::Lfe => mapping[5] = Some(index),
            _ => {}
        }
    }
    let mapping: [usize; 6] = {
        let mut resolved = [0usize; 6];
        for (slot, source) in mapping.iter().enumerate() {
            resolved[slot] = source.ok_or_else(|| {
                LayoutError::unsupported(
                    "non-standard 5.1 surround channel layout cannot be re-weaved",
                )
            })?;
        }
        resolved
    };

    let frame_count = track.frame_count();
    for frame in 0..frame_count {
        let base = frame * 6;

        // Scratch copy keeps the permutation alias-free.
        let mut scratch = [0.0f32; 6];
        scratch.copy_from_slice(&track.samples[base..base + 6]);
        for (slot, source) in mapping.iter().enumerate() {
            track.samples[base + slot] = scratch[*source];
        }

        if frame & POLL_MASK == 0 {
            cancel.bail().map_err(LayoutError::from)?;
            progress(frame as f32 / frame_count as f32);
        }
    }

    track.set_channel_layout(&[
        ChannelPlacement::FrontLeft,
        ChannelPlacement::FrontCenter,
        ChannelPlacement::FrontRight,
        ChannelPlacement::BackLeft,
        ChannelPlacement::BackRight,
        ChannelPlacement::Lfe,
    ]);
    Ok(())
}
