//! Transcode configuration.

use crate::error::{Result, TranscodeError};

/// Channel layout of the produced Opus stream.
///
/// Only stereo and 5.1 in the Vorbis order are supported as outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputLayout {
    /// Two channels, left and right.
    #[default]
    Stereo,
    /// Six channels in the Vorbis 5.1 order.
    Surround51,
}

impl OutputLayout {
    /// Number of channels in this layout.
    pub fn channel_count(&self) -> usize {
        match self {
            Self::Stereo => 2,
            Self::Surround51 => 6,
        }
    }
}

/// Options consumed once per [`Transcoder::transcode`](crate::Transcoder::transcode) call.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TranscodeConfig {
    /// Tuck clipping half-waves below full scale before encoding.
    pub declip: bool,
    /// Re-decode the encoded stream and keep tucking until the output
    /// stays clean. Requires `declip`.
    pub iterative_declip: bool,
    /// Downmix weighting between cinematic (0.0) and speech-forward (1.0).
    pub nightmode_level: f32,
    /// Channel layout of the output stream.
    pub output_layout: OutputLayout,
    /// Target Opus bitrate in kilobits per second.
    pub target_bitrate_kbps: f32,
    /// Raise too-quiet tracks to full scale before any other processing.
    pub normalize: bool,
    /// Encoder effort in [0, 1], mapped onto the Opus complexity scale.
    pub effort: f32,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            declip: false,
            iterative_declip: false,
            nightmode_level: 0.5,
            output_layout: OutputLayout::Stereo,
            target_bitrate_kbps: 192.0,
            normalize: false,
            effort: 1.0,
        }
    }
}

impl TranscodeConfig {
    /// Enable half-wave tucking before the encode.
    pub fn with_declip(mut self, enable: bool) -> Self {
        self.declip = enable;
        self
    }

    /// Enable the encode/decode/re-tuck loop.
    pub fn with_iterative_declip(mut self, enable: bool) -> Self {
        self.iterative_declip = enable;
        self
    }

    /// Set the nightmode downmix weighting.
    pub fn with_nightmode_level(mut self, level: f32) -> Self {
        self.nightmode_level = level;
        self
    }

    /// Set the output channel layout.
    pub fn with_output_layout(mut self, layout: OutputLayout) -> Self {
        self.output_layout = layout;
        self
    }

    /// Set the target bitrate in kilobits per second.
    pub fn with_target_bitrate_kbps(mut self, kbps: f32) -> Self {
        self.target_bitrate_kbps = kbps;
        self
    }

    /// Enable pre-encode loudness normalization.
    pub fn with_normalize(mut self, enable: bool) -> Self {
        self.normalize = enable;
        self
    }

    /// Set the encoder effort in [0, 1].
    pub fn with_effort(mut self, effort: f32) -> Self {
        self.effort = effort;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.iterative_declip && !self.declip {
            return Err(TranscodeError::InvalidConfig(
                "iterative de-clipping requires de-clipping to be enabled".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.nightmode_level) {
            return Err(TranscodeError::InvalidConfig(format!(
                "nightmode level {} is outside [0, 1]",
                self.nightmode_level
            )));
        }
        if !(0.0..=1.0).contains(&self.effort) {
            return Err(TranscodeError::InvalidConfig(format!(
                "effort {} is outside [0, 1]",
                self.effort
            )));
        }
        if !self.target_bitrate_kbps.is_finite() || self.target_bitrate_kbps <= 0.0 {
            return Err(TranscodeError::InvalidConfig(format!(
                "target bitrate {} kbps is not positive",
                self.target_bitrate_kbps
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranscodeConfig::default();
        assert!(!config.declip);
        assert!(!config.iterative_declip);
        assert_eq!(config.nightmode_level, 0.5);
        assert_eq!(config.output_layout, OutputLayout::Stereo);
        assert_eq!(config.target_bitrate_kbps, 192.0);
        assert!(!config.normalize);
        assert_eq!(config.effort, 1.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_builder() {
        let config = TranscodeConfig::default()
            .with_declip(true)
            .with_iterative_declip(true)
            .with_nightmode_level(0.25)
            .with_output_layout(OutputLayout::Surround51)
            .with_target_bitrate_kbps(320.0)
            .with_normalize(true)
            .with_effort(0.5);

        config.validate().unwrap();
        assert!(config.iterative_declip);
        assert_eq!(config.output_layout.channel_count(), 6);
    }

    #[test]
    fn test_iterative_requires_declip() {
        let config = TranscodeConfig::default().with_iterative_declip(true);
        assert!(matches!(
            config.validate(),
            Err(TranscodeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_range_checks() {
        assert!(TranscodeConfig::default()
            .with_nightmode_level(1.5)
            .validate()
            .is_err());
        assert!(TranscodeConfig::default().with_effort(-0.1).validate().is_err());
        assert!(TranscodeConfig::default()
            .with_target_bitrate_kbps(0.0)
            .validate()
            .is_err());
    }
}
