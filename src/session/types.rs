// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the capture session: outputs and per-frame request
//! parameters

use crate::errors::{CameraError, DeviceError, ParameterError};
use crate::orientation::Point;
use crate::platform::types::DeviceDetails;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Kind of target surface an output delivers frames into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    /// On-screen preview surface
    #[serde(rename = "preview")]
    Preview,
    /// Still photo capture
    #[serde(rename = "photo")]
    Photo,
    /// Continuous video frame stream (recording and frame consumers)
    #[serde(rename = "video")]
    Video,
    /// Machine-readable code scanning stream
    #[serde(rename = "code-scanner")]
    CodeScanner,
}

/// A caller-owned target surface the capture session writes frames into
///
/// The controller only references outputs; their lifetime is managed by the
/// host. Two outputs are the same iff all descriptor fields match, which is
/// what drives session re-creation on output changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    /// Stable identifier of the target surface in the host
    pub id: String,
    pub kind: OutputKind,
    pub width: u32,
    pub height: u32,
    /// FourCC pixel format code of the surface (e.g. "NV12", "420f")
    pub pixel_format: String,
}

impl Output {
    pub fn new(id: impl Into<String>, kind: OutputKind, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            width,
            height,
            pixel_format: "NV12".to_string(),
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({}, {}x{})", self.kind, self.id, self.width, self.height)
    }
}

/// Torch (continuous illumination) mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TorchMode {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "on")]
    On,
    #[serde(rename = "auto")]
    Auto,
}

impl TorchMode {
    /// Parse from the wire union used by host applications
    pub fn parse(value: &str) -> Result<Self, CameraError> {
        match value {
            "off" => Ok(TorchMode::Off),
            "on" => Ok(TorchMode::On),
            "auto" => Ok(TorchMode::Auto),
            other => Err(ParameterError::Invalid {
                name: "torch".into(),
                value: other.into(),
            }
            .into()),
        }
    }
}

impl std::fmt::Display for TorchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TorchMode::Off => write!(f, "off"),
            TorchMode::On => write!(f, "on"),
            TorchMode::Auto => write!(f, "auto"),
        }
    }
}

/// Video stabilization mode applied through the repeating request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoStabilizationMode {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "standard")]
    Standard,
    #[serde(rename = "cinematic")]
    Cinematic,
    #[serde(rename = "cinematic-extended")]
    CinematicExtended,
    /// Reported mode was not recognized
    #[serde(rename = "unsupported")]
    Unsupported,
}

impl VideoStabilizationMode {
    /// Parse from the wire union used by host applications
    pub fn parse(value: &str) -> Result<Self, CameraError> {
        match value {
            "off" => Ok(Self::Off),
            "standard" => Ok(Self::Standard),
            "cinematic" => Ok(Self::Cinematic),
            "cinematic-extended" => Ok(Self::CinematicExtended),
            other => Err(ParameterError::Invalid {
                name: "videoStabilizationMode".into(),
                value: other.into(),
            }
            .into()),
        }
    }
}

/// Desired per-frame capture parameters
///
/// Installed as the session's repeating request while the controller is
/// active. Values are validated and clamped against [`DeviceDetails`] at
/// install time, not at set time, so a device switch re-validates them.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingRequest {
    /// Zoom factor, 1.0 = neutral
    pub zoom: f64,
    /// Exposure bias in EV stops
    pub exposure_bias: f64,
    /// Metering point in normalized device coordinates, if any
    pub focus_point: Option<Point>,
    pub torch: TorchMode,
    pub stabilization: VideoStabilizationMode,
    /// Enable the platform's automatic low-light boost
    pub low_light_boost: bool,
}

impl Default for RepeatingRequest {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            exposure_bias: 0.0,
            focus_point: None,
            torch: TorchMode::Off,
            stabilization: VideoStabilizationMode::Off,
            low_light_boost: false,
        }
    }
}

impl RepeatingRequest {
    /// Copy of this request with a metering point set
    pub fn with_focus_point(&self, point: Point) -> Self {
        let mut request = self.clone();
        request.focus_point = Some(point);
        request
    }

    /// Validate and clamp this request against device capability metadata
    ///
    /// Zoom and exposure bias are clamped into the supported range. A torch
    /// or stabilization mode the device cannot do degrades to `Off` (the
    /// platform would silently ignore it anyway). Low-light boost on an
    /// unsupporting device is an error, since the host explicitly asked for
    /// a capability that does not exist.
    pub fn prepare(&self, details: &DeviceDetails) -> Result<PreparedRequest, CameraError> {
        if self.low_light_boost && !details.supports_low_light_boost {
            return Err(DeviceError::LowLightBoostUnsupported.into());
        }

        let torch = if self.torch != TorchMode::Off && !details.has_torch {
            warn!(device = %details.camera_id, "Torch requested but device has no torch, disabling");
            TorchMode::Off
        } else {
            self.torch
        };

        let stabilization = if details.supports_stabilization(self.stabilization) {
            self.stabilization
        } else {
            warn!(
                device = %details.camera_id,
                mode = ?self.stabilization,
                "Stabilization mode not supported by device, disabling"
            );
            VideoStabilizationMode::Off
        };

        let focus_point = match self.focus_point {
            Some(point) if !details.supports_focus => {
                warn!(device = %details.camera_id, "Focus point set but device has fixed focus");
                None
            }
            other => other,
        };

        Ok(PreparedRequest {
            zoom: details.clamp_zoom(self.zoom),
            exposure_bias: details.clamp_exposure_bias(self.exposure_bias),
            focus_point,
            torch,
            stabilization,
            low_light_boost: self.low_light_boost,
        })
    }
}

/// A repeating request resolved against one device's capabilities
///
/// This is what actually crosses the platform seam; all values are known to
/// be acceptable to the device it was prepared for.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub zoom: f64,
    pub exposure_bias: f64,
    pub focus_point: Option<Point>,
    pub torch: TorchMode,
    pub stabilization: VideoStabilizationMode,
    pub low_light_boost: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::Orientation;
    use crate::platform::types::{CameraPosition, HardwareLevel};

    fn details() -> DeviceDetails {
        DeviceDetails {
            camera_id: "back-wide".into(),
            name: "Back Wide".into(),
            position: CameraPosition::Back,
            hardware_level: HardwareLevel::Full,
            sensor_orientation: Orientation::LandscapeLeft,
            has_flash: false,
            has_torch: false,
            supports_focus: true,
            supports_low_light_boost: false,
            min_zoom: 1.0,
            max_zoom: 10.0,
            neutral_zoom: 1.0,
            min_exposure_bias: -2.0,
            max_exposure_bias: 2.0,
            supported_stabilization_modes: vec![VideoStabilizationMode::Standard],
        }
    }

    #[test]
    fn test_prepare_clamps_zoom_and_exposure() {
        let request = RepeatingRequest {
            zoom: 42.0,
            exposure_bias: -7.5,
            ..Default::default()
        };
        let prepared = request.prepare(&details()).unwrap();
        assert_eq!(prepared.zoom, 10.0);
        assert_eq!(prepared.exposure_bias, -2.0);
    }

    #[test]
    fn test_prepare_degrades_torch_without_hardware() {
        let request = RepeatingRequest {
            torch: TorchMode::On,
            ..Default::default()
        };
        let prepared = request.prepare(&details()).unwrap();
        assert_eq!(prepared.torch, TorchMode::Off);
    }

    #[test]
    fn test_prepare_rejects_low_light_boost() {
        let request = RepeatingRequest {
            low_light_boost: true,
            ..Default::default()
        };
        let err = request.prepare(&details()).unwrap_err();
        assert_eq!(err.code(), "device/low-light-boost-unsupported");
    }

    #[test]
    fn test_prepare_keeps_supported_stabilization() {
        let request = RepeatingRequest {
            stabilization: VideoStabilizationMode::Standard,
            ..Default::default()
        };
        let prepared = request.prepare(&details()).unwrap();
        assert_eq!(prepared.stabilization, VideoStabilizationMode::Standard);

        let request = RepeatingRequest {
            stabilization: VideoStabilizationMode::Cinematic,
            ..Default::default()
        };
        let prepared = request.prepare(&details()).unwrap();
        assert_eq!(prepared.stabilization, VideoStabilizationMode::Off);
    }

    #[test]
    fn test_torch_mode_parsing() {
        assert_eq!(TorchMode::parse("on").unwrap(), TorchMode::On);
        assert_eq!(TorchMode::parse("auto").unwrap(), TorchMode::Auto);
        assert!(TorchMode::parse("strobe").is_err());
    }
}
