//! Property tests for the clipping detector's structural guarantees.

use opustuck_core::{CancelToken, ChannelPlacement, Track};
use opustuck_declip::{find_clipping_halfwaves, tuck_halfwaves, verify_consistency};
use proptest::prelude::*;

fn mono_track(samples: Vec<f32>) -> Track {
    let mut track = Track::new(&[ChannelPlacement::FrontCenter], samples.len() as u64, 48000)
        .unwrap();
    track.samples.copy_from_slice(&samples);
    track
}

proptest! {
    /// Half-wave lists are sorted, disjoint, in bounds, and every recorded
    /// wave actually contains a clipping sample.
    #[test]
    fn detected_halfwaves_are_sorted_disjoint_and_clipping(
        samples in prop::collection::vec(-2.0f32..2.0, 1..512),
    ) {
        let mut track = mono_track(samples.clone());
        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        verify_consistency(&track).unwrap();

        for wave in &track.channels[0].clipping_halfwaves {
            prop_assert!(wave.prior_zero_crossing_index < wave.next_zero_crossing_index);
            prop_assert!(wave.next_zero_crossing_index <= samples.len());
            prop_assert!(wave.peak_index >= wave.prior_zero_crossing_index);
            prop_assert!(wave.peak_index < wave.next_zero_crossing_index);

            let clips = samples[wave.range()].iter().any(|s| s.abs() > 1.0);
            prop_assert!(clips, "recorded wave {:?} contains no clipping sample", wave.range());

            let peak = samples[wave.range()].iter().fold(0.0f32, |a, s| a.max(s.abs()));
            prop_assert!((peak - wave.peak_amplitude).abs() < 1e-6);
        }
    }

    /// Detect then tuck then detect again finds nothing: single-pass
    /// de-clipping leaves no sample above full scale.
    #[test]
    fn tucking_removes_all_detected_clipping(
        samples in prop::collection::vec(-3.0f32..3.0, 1..512),
    ) {
        let mut track = mono_track(samples);
        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();
        tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();
        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        prop_assert!(track.channels[0].clipping_halfwaves.is_empty());
        let peak = track.samples.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        prop_assert!(peak <= 1.0);
    }

    /// Samples outside every recorded half-wave survive tucking bit-exactly.
    #[test]
    fn tucking_never_touches_samples_outside_halfwaves(
        samples in prop::collection::vec(-2.0f32..2.0, 1..256),
    ) {
        let mut track = mono_track(samples.clone());
        find_clipping_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();
        let waves: Vec<_> = track.channels[0].clipping_halfwaves.iter().map(|w| w.range()).collect();
        tuck_halfwaves(&mut track, &CancelToken::new(), &mut |_| {}).unwrap();

        for (index, original) in samples.iter().enumerate() {
            if !waves.iter().any(|range| range.contains(&index)) {
                prop_assert_eq!(track.samples[index], *original);
            }
        }
    }
}
