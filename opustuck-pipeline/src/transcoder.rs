//! The transcode coordinator.
//!
//! One background worker thread runs the whole pipeline: decode, optional
//! normalization, layout transform, optional de-clipping, encode, optional
//! iterative re-tucking, and finally the atomic write of the output file.
//! Observers on other threads read a consistent status triple through the
//! shared [`StatusBoard`] and can cancel at any time.

use crate::config::{OutputLayout, TranscodeConfig};
use crate::error::{Result, TranscodeError};
use crate::status::{Outcome, StatusBoard};
use crate::writer::write_blob;
use opustuck_codec::{encode_track, read_track, AudioLoader, EncoderParams, OpusEncoderFactory};
use opustuck_core::{CancelToken, Error as CoreError, MemoryBlob, Track};
use opustuck_declip::{
    copy_and_tuck, find_clipping_halfwaves, integrate_clipping_halfwaves, tuck_halfwaves,
    update_clipping_halfwaves,
};
use opustuck_loudness::normalize_track;
use opustuck_spatial::{
    downmix_71_to_51, downmix_to_stereo, reweave_51_to_vorbis, upmix_mono_to_stereo,
    vorbis_order, LayoutError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on encode/decode/re-tuck passes of the iterative de-clipper.
pub const MAX_DECLIP_PASSES: usize = 10;

/// Coordinates a transcode on a background worker thread.
///
/// The external collaborators (container decoding and the Opus encoder) are
/// injected once; each [`transcode`](Self::transcode) call then runs the
/// configured pipeline for one input/output pair. Dropping the coordinator
/// cancels and joins a still-running worker.
pub struct Transcoder {
    loader: Arc<dyn AudioLoader>,
    encoder_factory: Arc<dyn OpusEncoderFactory>,
    config: TranscodeConfig,
    status: Arc<StatusBoard>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl Transcoder {
    /// Create a coordinator over the given collaborators.
    pub fn new(
        loader: Arc<dyn AudioLoader>,
        encoder_factory: Arc<dyn OpusEncoderFactory>,
        config: TranscodeConfig,
    ) -> Self {
        Self {
            loader,
            encoder_factory,
            config,
            status: Arc::new(StatusBoard::new()),
            cancel: CancelToken::new(),
            worker: None,
        }
    }

    /// Replace the configuration used by the next transcode.
    pub fn set_config(&mut self, config: TranscodeConfig) {
        self.config = config;
    }

    /// The configuration used by the next transcode.
    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Start transcoding `input_path` into `output_path` on the worker.
    ///
    /// Returns immediately once the worker is running. Fails with
    /// [`TranscodeError::AlreadyRunning`] while a previous transcode is
    /// still in flight, or with [`TranscodeError::InvalidConfig`] when the
    /// configuration does not validate.
    pub fn transcode(&mut self, input_path: PathBuf, output_path: PathBuf) -> Result<()> {
        self.config.validate()?;

        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                return Err(TranscodeError::AlreadyRunning);
            }
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        self.cancel = CancelToken::new();
        self.status.reset();

        let loader = self.loader.clone();
        let encoder_factory = self.encoder_factory.clone();
        let config = self.config.clone();
        let status = self.status.clone();
        let cancel = self.cancel.clone();

        info!(input = %input_path.display(), output = %output_path.display(), "starting transcode");

        self.worker = Some(std::thread::spawn(move || {
            let result = run_transcode(
                loader.as_ref(),
                encoder_factory.as_ref(),
                &config,
                &input_path,
                &output_path,
                &cancel,
                &status,
            );
            match result {
                Ok(()) => {
                    info!("transcode finished");
                    status.finish(Outcome::Success, "Transcoding complete!");
                }
                Err(error) if error.is_cancelled() => {
                    info!("transcode cancelled");
                    status.finish(Outcome::Cancelled, "Transcoding cancelled");
                }
                Err(error) => {
                    warn!(%error, "transcode failed");
                    status.finish(
                        Outcome::Failed(error.to_string()),
                        format!("Transcoding failed: {error}"),
                    );
                }
            }
        }));

        Ok(())
    }

    /// Ask a running transcode to stop at its next cancellation poll.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker to finish and return the outcome.
    pub fn join(&mut self) -> Option<Outcome> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.status.outcome()
    }

    /// Human-readable description of the current step.
    pub fn current_step_message(&self) -> String {
        self.status.message()
    }

    /// Progress of the current step in [0, 1], or
    /// [`INDETERMINATE`](crate::status::INDETERMINATE).
    pub fn current_step_progress(&self) -> f32 {
        self.status.progress()
    }

    /// Terminal outcome of the last transcode, `None` while running.
    pub fn outcome(&self) -> Option<Outcome> {
        self.status.outcome()
    }

    /// Block until the status changes or the timeout elapses.
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        self.status.wait_for_change(timeout)
    }
}

impl Drop for Transcoder {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// The worker-side pipeline. Every error unwinds here and is converted to
/// an outcome by the caller.
fn run_transcode(
    loader: &dyn AudioLoader,
    encoder_factory: &dyn OpusEncoderFactory,
    config: &TranscodeConfig,
    input_path: &Path,
    output_path: &Path,
    cancel: &CancelToken,
    status: &StatusBoard,
) -> Result<()> {
    status.begin_step("Opening input audio file...");
    let mut source = loader.open_path(input_path)?;

    status.begin_step("Decoding input audio file...");
    let mut track = read_track(source.as_mut(), cancel, &mut |p| status.set_progress(p))?;
    drop(source);

    // Normalization runs before any downmix so the gain is applied at the
    // highest precision the samples will ever have.
    if config.normalize {
        status.begin_step("Normalizing track volume...");
        normalize_track(&mut track, false, cancel, &mut |p| status.set_progress(p))?;
    }

    transform_to_output_layout(&mut track, config, cancel, status)?;

    if config.declip {
        status.begin_step("Checking audio track for clipping...");
        find_clipping_halfwaves(&mut track, cancel, &mut |p| status.set_progress(p))?;

        // Single-pass de-clipping fixes the track itself. The iterative
        // mode holds off: it wants to hear the codec's output first.
        if !config.iterative_declip {
            status.begin_step("Tucking in clipping segments...");
            tuck_halfwaves(&mut track, cancel, &mut |p| status.set_progress(p))?;
        }
    }

    let params = EncoderParams::for_track(&track, config.target_bitrate_kbps, config.effort);

    status.begin_step("Encoding Opus audio stream...");
    let mut encoded = encode_track(
        &track,
        &track.samples,
        encoder_factory,
        &params,
        cancel,
        &mut |p| status.set_progress(p),
    )?;

    if config.declip && config.iterative_declip {
        encoded = iterative_declip(
            loader,
            encoder_factory,
            &params,
            &mut track,
            encoded,
            cancel,
            status,
        )?;
    }

    status.begin_step("Writing Opus file...");
    write_blob(&encoded, output_path).map_err(TranscodeError::from)?;
    Ok(())
}

/// Bring the track from its input channel order into the Vorbis order of
/// the configured output layout. A track already in the right order is
/// left untouched.
fn transform_to_output_layout(
    track: &mut Track,
    config: &TranscodeConfig,
    cancel: &CancelToken,
    status: &StatusBoard,
) -> Result<()> {
    let output_order = vorbis_order(config.output_layout.channel_count())?;
    let input_count = track.channel_count();

    match config.output_layout {
        OutputLayout::Stereo => {
            if input_count < 2 {
                status.begin_step("Upmixing to stereo...");
                upmix_mono_to_stereo(track, cancel, &mut |p| status.set_progress(p))?;
            } else if input_count > 2 {
                status.begin_step("Downmixing to stereo...");
                downmix_to_stereo(track, config.nightmode_level, cancel, &mut |p| {
                    status.set_progress(p)
                })?;
            } else if track.placements() != output_order {
                status.begin_step("Reordering audio channels...");
                reweave_51_to_vorbis(track, cancel, &mut |p| status.set_progress(p))?;
            }
        }
        OutputLayout::Surround51 => {
            if input_count > 6 {
                status.begin_step("Downmixing 7.1 to 5.1...");
                downmix_71_to_51(track, cancel, &mut |p| status.set_progress(p))?;
            } else if input_count < 6 {
                return Err(LayoutError::unsupported(
                    "only 7.1 sources can be transformed to a 5.1 output",
                )
                .into());
            } else if track.placements() != output_order {
                status.begin_step("Reordering audio channels...");
                reweave_51_to_vorbis(track, cancel, &mut |p| status.set_progress(p))?;
            }
        }
    }

    debug_assert!(track.verify_invariants().is_ok());
    Ok(())
}

/// The encode/decode/re-tuck loop.
///
/// Each pass decodes the current encoded stream back, folds the clipping it
/// finds into the source track's half-wave records, and checks how many
/// waves still clip. While any remain, the pass re-tucks a fresh copy of
/// the source and encodes that. The source buffer itself is never scaled
/// twice; the decoded buffer from this pass is reused as the scratch copy,
/// so each encode starts from the pristine source and quantization loss
/// cannot accumulate.
fn iterative_declip(
    loader: &dyn AudioLoader,
    encoder_factory: &dyn OpusEncoderFactory,
    params: &EncoderParams,
    track: &mut Track,
    mut encoded: MemoryBlob,
    cancel: &CancelToken,
    status: &StatusBoard,
) -> Result<MemoryBlob> {
    let mut pass = 1usize;
    loop {
        status.begin_step(format!("Step {pass}: Decoding Opus audio stream..."));
        let mut decoded_source = loader.open_blob(&encoded)?;
        let mut decoded = read_track(decoded_source.as_mut(), cancel, &mut |p| {
            status.set_progress(p)
        })?;
        drop(decoded_source);

        if decoded.channel_count() != track.channel_count() {
            return Err(CoreError::invalid_state(format!(
                "decoded stream has {} channels, the source has {}",
                decoded.channel_count(),
                track.channel_count()
            ))
            .into());
        }

        status.begin_step(format!("Step {pass}: Checking audio track for clipping..."));
        find_clipping_halfwaves(&mut decoded, cancel, &mut |p| status.set_progress(p))?;
        integrate_clipping_halfwaves(track, &decoded)?;
        #[cfg(debug_assertions)]
        opustuck_declip::verify_consistency(track)?;

        let remaining =
            update_clipping_halfwaves(track, &decoded.samples, cancel, &mut |p| {
                status.set_progress(p)
            })?;
        if remaining == 0 {
            debug!(pass, "decoded stream is free of clipping");
            return Ok(encoded);
        }
        if pass >= MAX_DECLIP_PASSES {
            warn!(
                pass,
                remaining, "clipping remains after the final pass, keeping the last encode"
            );
            return Ok(encoded);
        }

        // Reuse the decoded buffer as the tucked working copy; the source
        // track stays pristine for the next pass.
        let mut scratch = decoded.samples;
        status.begin_step(format!(
            "Step {pass} ({remaining} issues): Tucking in clipping segments..."
        ));
        copy_and_tuck(track, &mut scratch, cancel, &mut |p| status.set_progress(p))?;

        status.begin_step(format!(
            "Step {pass} ({remaining} issues): Encoding Opus audio stream..."
        ));
        encoded = encode_track(track, &scratch, encoder_factory, params, cancel, &mut |p| {
            status.set_progress(p)
        })?;

        pass += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opustuck_core::ChannelPlacement::{self, *};

    fn track_with(placements: &[ChannelPlacement], frames: &[&[f32]]) -> Track {
        let mut track = Track::new(placements, frames.len() as u64, 48000).unwrap();
        for (frame_index, frame) in frames.iter().enumerate() {
            for (channel, sample) in frame.iter().enumerate() {
                let index = track.sample_index(channel, frame_index);
                track.samples[index] = *sample;
            }
        }
        track
    }

    #[test]
    fn test_transform_noop_for_matching_stereo() {
        let mut track = track_with(&[FrontLeft, FrontRight], &[&[0.1, 0.2]]);
        let before = track.samples.clone();
        let config = TranscodeConfig::default();

        transform_to_output_layout(&mut track, &config, &CancelToken::new(), &StatusBoard::new())
            .unwrap();

        assert_eq!(track.samples, before);
        assert_eq!(track.channel_count(), 2);
    }

    #[test]
    fn test_transform_dispatches_upmix() {
        let mut track = track_with(&[FrontCenter], &[&[0.5]]);
        let config = TranscodeConfig::default();

        transform_to_output_layout(&mut track, &config, &CancelToken::new(), &StatusBoard::new())
            .unwrap();

        assert_eq!(track.placements(), vec![FrontLeft, FrontRight]);
        assert_eq!(track.samples, vec![0.5, 0.5]);
    }

    #[test]
    fn test_transform_dispatches_downmix() {
        let mut track = track_with(
            &[FrontLeft, FrontRight, FrontCenter, Lfe, BackLeft, BackRight],
            &[&[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]],
        );
        let config = TranscodeConfig::default().with_nightmode_level(1.0);

        transform_to_output_layout(&mut track, &config, &CancelToken::new(), &StatusBoard::new())
            .unwrap();

        // Nightmode 1.0 carries the center at unity and drops the LFE
        assert_eq!(track.channel_count(), 2);
        assert!((track.samples[0] - 1.0).abs() < 1e-6);
        assert!((track.samples[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_transform_rejects_stereo_to_51() {
        let mut track = track_with(&[FrontLeft, FrontRight], &[&[0.1, 0.2]]);
        let config = TranscodeConfig::default().with_output_layout(OutputLayout::Surround51);

        let result = transform_to_output_layout(
            &mut track,
            &config,
            &CancelToken::new(),
            &StatusBoard::new(),
        );
        assert!(matches!(
            result,
            Err(TranscodeError::Layout(LayoutError::Unsupported(_)))
        ));
    }

    #[test]
    fn test_transform_reweaves_wav_order_51() {
        let mut track = track_with(
            &[FrontLeft, FrontRight, FrontCenter, Lfe, BackLeft, BackRight],
            &[&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]],
        );
        let config = TranscodeConfig::default().with_output_layout(OutputLayout::Surround51);

        transform_to_output_layout(&mut track, &config, &CancelToken::new(), &StatusBoard::new())
            .unwrap();

        assert_eq!(
            track.placements(),
            vec![FrontLeft, FrontCenter, FrontRight, BackLeft, BackRight, Lfe]
        );
        assert_eq!(track.samples, vec![0.1, 0.3, 0.2, 0.5, 0.6, 0.4]);
    }
}
