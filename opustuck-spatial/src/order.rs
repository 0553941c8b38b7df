//! Interleave orders mandated by the Vorbis I specification.
//!
//! Opus mapping families 0 and 1 reuse the Vorbis channel order, so every
//! track handed to the encoder has to be woven this way first.

use crate::error::{LayoutError, Result};
use opustuck_core::ChannelPlacement;

/// Build the Vorbis interleave order for a channel count between 1 and 8.
pub fn vorbis_order(channel_count: usize) -> Result<Vec<ChannelPlacement>> {
    use ChannelPlacement::*;

    let order: &[ChannelPlacement] = match channel_count {
        1 => &[FrontCenter],
        2 => &[FrontLeft, FrontRight],
        3 => &[FrontLeft, FrontCenter, FrontRight],
        4 => &[FrontLeft, FrontRight, BackLeft, BackRight],
        5 => &[FrontLeft, FrontCenter, FrontRight, BackLeft, BackRight],
        6 => &[
            FrontLeft,
            FrontCenter,
            FrontRight,
            BackLeft,
            BackRight,
            Lfe,
        ],
        7 => &[
            FrontLeft,
            FrontCenter,
            FrontRight,
            SideLeft,
            SideRight,
            BackCenter,
            Lfe,
        ],
        8 => &[
            FrontLeft,
            FrontCenter,
            FrontRight,
            SideLeft,
            SideRight,
            BackLeft,
            BackRight,
            Lfe,
        ],
        count => {
            return Err(LayoutError::InvalidChannelCount {
                count,
                expected: "1 through 8".into(),
            })
        }
    };

    Ok(order.to_vec())
}
