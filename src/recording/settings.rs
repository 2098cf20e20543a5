// SPDX-License-Identifier: GPL-3.0-only

//! Resolution of recording settings
//!
//! Settings come from three places, in precedence order: explicit caller
//! options, the platform's recommended settings for the output/container
//! combination, and bitrate presets scaled by resolution tier.

use crate::recording::options::RecordVideoOptions;
use crate::recording::writer::VideoTrackSettings;

/// Video bitrate presets
///
/// Used when neither the caller nor the platform supplies a bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitratePreset {
    /// Smaller files, reduced quality
    Low,
    /// Balanced quality and file size (default)
    #[default]
    Medium,
    /// Larger files, better quality
    High,
}

/// Resolution tier for bitrate scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolutionTier {
    Sd,
    Hd,
    FullHd,
    TwoK,
    FourK,
}

fn resolution_tier(width: u32) -> ResolutionTier {
    if width <= 640 {
        ResolutionTier::Sd
    } else if width <= 1280 {
        ResolutionTier::Hd
    } else if width <= 1920 {
        ResolutionTier::FullHd
    } else if width <= 2560 {
        ResolutionTier::TwoK
    } else {
        ResolutionTier::FourK
    }
}

impl BitratePreset {
    pub const ALL: [BitratePreset; 3] =
        [BitratePreset::Low, BitratePreset::Medium, BitratePreset::High];

    /// Target bit rate in bits per second for a given resolution
    pub fn bit_rate(&self, width: u32, _height: u32) -> u64 {
        let kbps: u64 = match (resolution_tier(width), self) {
            (ResolutionTier::Sd, BitratePreset::Low) => 1_000,
            (ResolutionTier::Sd, BitratePreset::Medium) => 2_000,
            (ResolutionTier::Sd, BitratePreset::High) => 4_000,
            (ResolutionTier::Hd, BitratePreset::Low) => 2_500,
            (ResolutionTier::Hd, BitratePreset::Medium) => 5_000,
            (ResolutionTier::Hd, BitratePreset::High) => 10_000,
            (ResolutionTier::FullHd, BitratePreset::Low) => 4_000,
            (ResolutionTier::FullHd, BitratePreset::Medium) => 8_000,
            (ResolutionTier::FullHd, BitratePreset::High) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::Low) => 8_000,
            (ResolutionTier::TwoK, BitratePreset::Medium) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::High) => 32_000,
            (ResolutionTier::FourK, BitratePreset::Low) => 15_000,
            (ResolutionTier::FourK, BitratePreset::Medium) => 30_000,
            (ResolutionTier::FourK, BitratePreset::High) => 50_000,
        };
        kbps * 1_000
    }
}

/// Apply caller overrides on top of the platform-recommended video settings
///
/// The caller's bit rate (Mbps) takes precedence; a bit rate of zero in the
/// recommendation falls back to the medium preset for the resolution.
pub fn resolve_video_settings(
    recommended: VideoTrackSettings,
    options: &RecordVideoOptions,
) -> VideoTrackSettings {
    let mut settings = recommended;

    if let Some(codec) = options.video_codec {
        settings.codec = codec;
    }

    if let Some(mbps) = options.video_bit_rate_mbps {
        settings.average_bit_rate = (mbps * 1_000_000.0) as u64;
    } else if settings.average_bit_rate == 0 {
        settings.average_bit_rate =
            BitratePreset::default().bit_rate(settings.width, settings.height);
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::options::VideoCodec;

    fn recommended() -> VideoTrackSettings {
        VideoTrackSettings {
            codec: VideoCodec::H264,
            width: 1920,
            height: 1080,
            pixel_format: "NV12".into(),
            average_bit_rate: 0,
        }
    }

    #[test]
    fn test_preset_ordering() {
        let mut previous = 0u64;
        for preset in BitratePreset::ALL {
            let rate = preset.bit_rate(1920, 1080);
            assert!(rate > previous, "presets should be ordered low to high");
            previous = rate;
        }
    }

    #[test]
    fn test_preset_scales_with_resolution() {
        let hd = BitratePreset::Medium.bit_rate(1280, 720);
        let full_hd = BitratePreset::Medium.bit_rate(1920, 1080);
        let uhd = BitratePreset::Medium.bit_rate(3840, 2160);
        assert!(hd < full_hd);
        assert!(full_hd < uhd);
    }

    #[test]
    fn test_caller_bit_rate_takes_precedence() {
        let options = RecordVideoOptions {
            video_bit_rate_mbps: Some(12.5),
            ..Default::default()
        };
        let settings = resolve_video_settings(recommended(), &options);
        assert_eq!(settings.average_bit_rate, 12_500_000);
    }

    #[test]
    fn test_preset_fallback_when_unspecified() {
        let settings = resolve_video_settings(recommended(), &RecordVideoOptions::default());
        assert_eq!(
            settings.average_bit_rate,
            BitratePreset::Medium.bit_rate(1920, 1080)
        );
    }

    #[test]
    fn test_codec_override() {
        let options = RecordVideoOptions {
            video_codec: Some(VideoCodec::Hevc),
            ..Default::default()
        };
        let settings = resolve_video_settings(recommended(), &options);
        assert_eq!(settings.codec, VideoCodec::Hevc);
    }
}
