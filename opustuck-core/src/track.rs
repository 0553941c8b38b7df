//! Audio track data model.
//!
//! A [`Track`] owns one interleaved sample buffer plus a description of the
//! channels woven into it. The hierarchy is straightforward:
//!
//! ```text
//! Media file                   (for example .wav, .opus, .mka)
//!   -> contains tracks         (for example german stereo, english 5.1)
//!      -> contains channels    (for example left, right, center, LFE)
//!         -> contains samples  (one vertex of the waveform, 48000 each second)
//! ```

use crate::error::{Error, Result};
use crate::halfwave::ClippingHalfwave;
use std::fmt;

/// Spatial placement of an audio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelPlacement {
    /// Front Left
    FrontLeft,
    /// Front Right
    FrontRight,
    /// Front Center
    FrontCenter,
    /// Low Frequency Effects (subwoofer)
    Lfe,
    /// Back Left (Rear Left)
    BackLeft,
    /// Back Right (Rear Right)
    BackRight,
    /// Side Left
    SideLeft,
    /// Side Right
    SideRight,
    /// Back Center (Rear Center)
    BackCenter,
    /// Top Front Left, carried through for display only
    TopFrontLeft,
    /// Top Front Right, carried through for display only
    TopFrontRight,
    /// Top Front Center, carried through for display only
    TopFrontCenter,
    /// Top Center, carried through for display only
    TopCenter,
    /// Placement the source format did not identify
    Unknown,
}

impl ChannelPlacement {
    /// Get the abbreviated name for this placement.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::FrontLeft => "FL",
            Self::FrontRight => "FR",
            Self::FrontCenter => "FC",
            Self::Lfe => "LFE",
            Self::BackLeft => "BL",
            Self::BackRight => "BR",
            Self::SideLeft => "SL",
            Self::SideRight => "SR",
            Self::BackCenter => "BC",
            Self::TopFrontLeft => "TFL",
            Self::TopFrontRight => "TFR",
            Self::TopFrontCenter => "TFC",
            Self::TopCenter => "TC",
            Self::Unknown => "?",
        }
    }

    /// Check if this is the low frequency effects channel.
    pub fn is_lfe(&self) -> bool {
        matches!(self, Self::Lfe)
    }
}

impl fmt::Display for ChannelPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// One channel woven into a track's interleaved sample buffer.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Position of this channel in the interleaved buffer.
    pub input_order: usize,
    /// Spatial placement of this channel.
    pub placement: ChannelPlacement,
    /// Clipping half-waves found in this channel, ordered by start frame,
    /// non-overlapping and non-touching.
    pub clipping_halfwaves: Vec<ClippingHalfwave>,
}

impl Channel {
    /// Create a channel at the given interleave position.
    pub fn new(input_order: usize, placement: ChannelPlacement) -> Self {
        Self {
            input_order,
            placement,
            clipping_halfwaves: Vec::new(),
        }
    }
}

/// An audio track: one interleaved float sample buffer plus channel metadata.
///
/// The sample for (channel `c`, frame `f`) lives at index
/// `f * channel_count + c`. The buffer length is always
/// `frame_count * channel_count`.
#[derive(Debug, Clone)]
pub struct Track {
    /// Interleaved samples for all channels.
    pub samples: Vec<f32>,
    /// Playback sample rate in Hz.
    pub sample_rate: u32,
    /// Channels woven into the sample buffer, in interleave order.
    pub channels: Vec<Channel>,
}

impl Track {
    /// Create a track with a zeroed sample buffer for the given geometry.
    ///
    /// Fails with [`Error::AllocationFailed`] if the buffer cannot be
    /// reserved. Sample buffers for long movie tracks can run into
    /// gigabytes, so this is a failure mode worth surfacing instead of
    /// aborting.
    pub fn new(
        placements: &[ChannelPlacement],
        frame_count: u64,
        sample_rate: u32,
    ) -> Result<Self> {
        let total = (frame_count as usize)
            .checked_mul(placements.len())
            .ok_or(Error::AllocationFailed { needed: usize::MAX })?;

        let mut samples = Vec::new();
        samples
            .try_reserve_exact(total)
            .map_err(|_| Error::AllocationFailed {
                needed: total * std::mem::size_of::<f32>(),
            })?;
        samples.resize(total, 0.0);

        let channels = placements
            .iter()
            .enumerate()
            .map(|(index, placement)| Channel::new(index, *placement))
            .collect();

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Number of channels in the track.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames in the track.
    pub fn frame_count(&self) -> usize {
        if self.channels.is_empty() {
            0
        } else {
            self.samples.len() / self.channels.len()
        }
    }

    /// Flat buffer index of the sample at (channel, frame).
    #[inline]
    pub fn sample_index(&self, channel: usize, frame: usize) -> usize {
        frame * self.channels.len() + channel
    }

    /// Sample value at (channel, frame).
    #[inline]
    pub fn sample_at(&self, channel: usize, frame: usize) -> f32 {
        self.samples[self.sample_index(channel, frame)]
    }

    /// Ordered placements of all channels.
    pub fn placements(&self) -> Vec<ChannelPlacement> {
        self.channels.iter().map(|c| c.placement).collect()
    }

    /// Replace the channel descriptions after a layout transform.
    ///
    /// Clipping metadata is discarded; it refers to the previous weave.
    pub fn set_channel_layout(&mut self, placements: &[ChannelPlacement]) {
        self.channels = placements
            .iter()
            .enumerate()
            .map(|(index, placement)| Channel::new(index, *placement))
            .collect();
    }

    /// Verify the structural invariants of the track.
    ///
    /// Returns [`Error::InvalidState`] when the buffer length does not match
    /// the channel geometry, an `input_order` disagrees with its index, or a
    /// placement other than `Unknown` appears twice.
    pub fn verify_invariants(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(Error::invalid_state("track has no channels"));
        }
        if self.samples.len() % self.channels.len() != 0 {
            return Err(Error::invalid_state(format!(
                "sample buffer length {} is not a multiple of the channel count {}",
                self.samples.len(),
                self.channels.len()
            )));
        }
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.input_order != index {
                return Err(Error::invalid_state(format!(
                    "channel {} carries input order {}",
                    index, channel.input_order
                )));
            }
            let duplicated = self.channels[..index]
                .iter()
                .any(|c| c.placement == channel.placement && c.placement != ChannelPlacement::Unknown);
            if duplicated {
                return Err(Error::invalid_state(format!(
                    "placement {} appears more than once",
                    channel.placement
                )));
            }
        }
        Ok(())
    }
}
