// SPDX-License-Identifier: GPL-3.0-only

//! Recording options supplied by the host when starting a recording

use crate::errors::{CameraError, ParameterError};
use serde::{Deserialize, Serialize};

/// Container file type for a video recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoFileType {
    /// QuickTime movie (default)
    #[default]
    #[serde(rename = "mov")]
    Mov,
    #[serde(rename = "mp4")]
    Mp4,
    #[serde(rename = "m4v")]
    M4v,
    #[serde(rename = "avci")]
    Avci,
}

impl VideoFileType {
    /// Parse from the wire union used by host applications
    pub fn parse(value: &str) -> Result<Self, CameraError> {
        match value {
            "mov" => Ok(Self::Mov),
            "mp4" => Ok(Self::Mp4),
            "m4v" => Ok(Self::M4v),
            "avci" => Ok(Self::Avci),
            other => Err(ParameterError::Invalid {
                name: "fileType".into(),
                value: other.into(),
            }
            .into()),
        }
    }

    /// File extension for paths of this type
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mov => "mov",
            Self::Mp4 => "mp4",
            Self::M4v => "m4v",
            Self::Avci => "avci",
        }
    }
}

impl std::fmt::Display for VideoFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Video codec for a recording
///
/// One variant per platform codec name; codecs the recording pipeline cannot
/// write are still parseable so the host gets a precise "unsupported" error
/// instead of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    #[serde(rename = "h264")]
    H264,
    #[serde(rename = "hevc")]
    Hevc,
    #[serde(rename = "hevc-alpha")]
    HevcAlpha,
    #[serde(rename = "jpeg")]
    Jpeg,
    #[serde(rename = "pro-res-4444")]
    ProRes4444,
    #[serde(rename = "pro-res-422")]
    ProRes422,
    #[serde(rename = "pro-res-422-hq")]
    ProRes422Hq,
    #[serde(rename = "pro-res-422-lt")]
    ProRes422Lt,
    #[serde(rename = "pro-res-422-proxy")]
    ProRes422Proxy,
}

impl VideoCodec {
    /// Parse from the wire union used by host applications
    pub fn parse(value: &str) -> Result<Self, CameraError> {
        match value {
            "h264" => Ok(Self::H264),
            "hevc" => Ok(Self::Hevc),
            "hevc-alpha" => Ok(Self::HevcAlpha),
            "jpeg" => Ok(Self::Jpeg),
            "pro-res-4444" => Ok(Self::ProRes4444),
            "pro-res-422" => Ok(Self::ProRes422),
            "pro-res-422-hq" => Ok(Self::ProRes422Hq),
            "pro-res-422-lt" => Ok(Self::ProRes422Lt),
            "pro-res-422-proxy" => Ok(Self::ProRes422Proxy),
            other => Err(ParameterError::Invalid {
                name: "videoCodec".into(),
                value: other.into(),
            }
            .into()),
        }
    }

    /// The wire name of this codec
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::HevcAlpha => "hevc-alpha",
            Self::Jpeg => "jpeg",
            Self::ProRes4444 => "pro-res-4444",
            Self::ProRes422 => "pro-res-422",
            Self::ProRes422Hq => "pro-res-422-hq",
            Self::ProRes422Lt => "pro-res-422-lt",
            Self::ProRes422Proxy => "pro-res-422-proxy",
        }
    }

    /// Whether the recording pipeline can encode this codec
    pub fn supported_for_recording(&self) -> bool {
        matches!(self, Self::H264 | Self::Hevc)
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Flash behavior for a video recording
///
/// Video has no true flash; `On`/`Auto` are implemented by overriding the
/// torch for the duration of the recording and restoring it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlashMode {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "on")]
    On,
    #[serde(rename = "auto")]
    Auto,
}

impl FlashMode {
    /// Parse from the wire union used by host applications
    pub fn parse(value: &str) -> Result<Self, CameraError> {
        match value {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            "auto" => Ok(Self::Auto),
            other => Err(ParameterError::Invalid {
                name: "flash".into(),
                value: other.into(),
            }
            .into()),
        }
    }

    /// The torch mode implementing this flash behavior while recording
    pub fn as_torch_mode(&self) -> crate::session::types::TorchMode {
        use crate::session::types::TorchMode;
        match self {
            FlashMode::Off => TorchMode::Off,
            FlashMode::On => TorchMode::On,
            FlashMode::Auto => TorchMode::Auto,
        }
    }
}

/// Options for [`CameraController::start_recording`]
///
/// [`CameraController::start_recording`]: crate::session::CameraController::start_recording
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordVideoOptions {
    /// Override the torch for the duration of the recording
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<FlashMode>,
    /// Container file type, defaults to `mov`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<VideoFileType>,
    /// Video codec, defaults to the platform recommendation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<VideoCodec>,
    /// Average video bit rate in megabits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bit_rate_mbps: Option<f64>,
    /// Record an audio track alongside the video
    #[serde(default)]
    pub audio_enabled: bool,
}

impl RecordVideoOptions {
    /// Validate fields that can be rejected before any file is created
    pub fn validate(&self) -> Result<(), CameraError> {
        if let Some(codec) = self.video_codec
            && !codec.supported_for_recording()
        {
            return Err(ParameterError::UnsupportedOnOs {
                name: "videoCodec".into(),
                value: codec.wire_name().into(),
            }
            .into());
        }
        if let Some(bit_rate) = self.video_bit_rate_mbps
            && bit_rate <= 0.0
        {
            return Err(ParameterError::Invalid {
                name: "videoBitRate".into(),
                value: bit_rate.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_parsing() {
        assert_eq!(VideoFileType::parse("mov").unwrap(), VideoFileType::Mov);
        assert_eq!(VideoFileType::parse("mp4").unwrap(), VideoFileType::Mp4);
        let err = VideoFileType::parse("mkv").unwrap_err();
        assert_eq!(err.code(), "parameter/invalid");
    }

    #[test]
    fn test_codec_parsing() {
        assert_eq!(VideoCodec::parse("h264").unwrap(), VideoCodec::H264);
        assert_eq!(VideoCodec::parse("hevc").unwrap(), VideoCodec::Hevc);
        assert_eq!(
            VideoCodec::parse("pro-res-422-hq").unwrap(),
            VideoCodec::ProRes422Hq
        );
        assert!(VideoCodec::parse("av1").is_err());
    }

    #[test]
    fn test_recording_support() {
        assert!(VideoCodec::H264.supported_for_recording());
        assert!(VideoCodec::Hevc.supported_for_recording());
        assert!(!VideoCodec::ProRes4444.supported_for_recording());
    }

    #[test]
    fn test_options_validation() {
        let ok = RecordVideoOptions {
            video_codec: Some(VideoCodec::H264),
            video_bit_rate_mbps: Some(8.0),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let unsupported = RecordVideoOptions {
            video_codec: Some(VideoCodec::ProRes4444),
            ..Default::default()
        };
        assert_eq!(
            unsupported.validate().unwrap_err().code(),
            "parameter/unsupported-on-os"
        );

        let bad_rate = RecordVideoOptions {
            video_bit_rate_mbps: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(bad_rate.validate().unwrap_err().code(), "parameter/invalid");
    }

    #[test]
    fn test_options_deserialize_wire_shape() {
        let options: RecordVideoOptions = serde_json::from_str(
            r#"{ "flash": "on", "file_type": "mp4", "video_codec": "hevc", "audio_enabled": true }"#,
        )
        .unwrap();
        assert_eq!(options.flash, Some(FlashMode::On));
        assert_eq!(options.file_type, Some(VideoFileType::Mp4));
        assert_eq!(options.video_codec, Some(VideoCodec::Hevc));
        assert!(options.audio_enabled);
    }
}
