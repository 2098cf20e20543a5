// SPDX-License-Identifier: GPL-3.0-only
// Shared types crossing the platform seam

//! Shared types for platform capture backends

use crate::orientation::Orientation;
use crate::session::types::VideoStabilizationMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Physical position of a camera on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraPosition {
    /// Rear-facing camera
    #[default]
    #[serde(rename = "back")]
    Back,
    /// User-facing camera
    #[serde(rename = "front")]
    Front,
    /// Externally attached camera (USB, continuity)
    #[serde(rename = "external")]
    External,
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::External => write!(f, "external"),
        }
    }
}

/// Capture hardware capability level reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HardwareLevel {
    /// Compatibility mode with a reduced feature set
    #[serde(rename = "legacy")]
    Legacy,
    /// Partial feature set
    #[default]
    #[serde(rename = "limited")]
    Limited,
    /// Full manual control support
    #[serde(rename = "full")]
    Full,
    /// Full support plus additional vendor capabilities
    #[serde(rename = "level-3")]
    Level3,
    /// Reported level was not recognized
    #[serde(rename = "unsupported")]
    Unsupported,
}

/// Capability metadata for one camera device
///
/// This carries only the state the controller needs to decide whether a
/// reconfiguration is required and to clamp/validate per-frame request
/// parameters. Full format enumeration stays behind the platform seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetails {
    pub camera_id: String,
    pub name: String,
    pub position: CameraPosition,
    pub hardware_level: HardwareLevel,
    /// Physical sensor mounting orientation
    pub sensor_orientation: Orientation,
    pub has_flash: bool,
    pub has_torch: bool,
    pub supports_focus: bool,
    pub supports_low_light_boost: bool,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// The zoom factor mapping 1:1 to the sensor (1.0 on most devices)
    pub neutral_zoom: f64,
    /// Exposure bias range in EV stops
    pub min_exposure_bias: f64,
    pub max_exposure_bias: f64,
    /// Stabilization modes the device accepts in a repeating request
    pub supported_stabilization_modes: Vec<VideoStabilizationMode>,
}

impl DeviceDetails {
    /// Clamp a zoom factor into the device's supported range
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Clamp an exposure bias into the device's supported range
    pub fn clamp_exposure_bias(&self, bias: f64) -> f64 {
        bias.clamp(self.min_exposure_bias, self.max_exposure_bias)
    }

    /// Check whether a stabilization mode can be applied on this device
    pub fn supports_stabilization(&self, mode: VideoStabilizationMode) -> bool {
        mode == VideoStabilizationMode::Off || self.supported_stabilization_modes.contains(&mode)
    }
}

/// Media kind of a sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Timestamp in a specific clock domain, nanosecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    nanos: i64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { nanos: 0 };

    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub fn from_micros(micros: i64) -> Self {
        Self { nanos: micros * 1_000 }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self { nanos: millis * 1_000_000 }
    }

    pub fn as_nanos(&self) -> i64 {
        self.nanos
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Difference `self - earlier`, saturating instead of wrapping
    pub fn saturating_since(&self, earlier: Timestamp) -> Timestamp {
        Timestamp { nanos: self.nanos.saturating_sub(earlier.nanos) }
    }

    /// Shift by a signed nanosecond offset
    pub fn offset_by(&self, nanos: i64) -> Timestamp {
        Timestamp { nanos: self.nanos.saturating_add(nanos) }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// Clock domain a timestamp is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockDomain {
    /// The capture session's master clock (video samples)
    Session,
    /// The audio subsystem's clock
    Audio,
    /// The host's monotonic clock
    Host,
}

/// Descriptor of one clock, relating its timestamps to host time
///
/// A timestamp `t` in this clock corresponds to host time
/// `t + offset_from_host_ns`. Two descriptors are enough to translate
/// timestamps across domains without consulting the platform again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaClock {
    pub domain: ClockDomain,
    pub offset_from_host_ns: i64,
}

impl MediaClock {
    pub fn new(domain: ClockDomain, offset_from_host_ns: i64) -> Self {
        Self { domain, offset_from_host_ns }
    }

    /// The host clock itself (zero offset)
    pub fn host() -> Self {
        Self { domain: ClockDomain::Host, offset_from_host_ns: 0 }
    }
}

/// A single audio or video sample delivered by the capture session
///
/// The payload is opaque to the controller; it is handed to the container
/// writer unmodified. Timestamps are in the clock domain of the producing
/// subsystem (session clock for video, audio clock for audio).
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub kind: MediaKind,
    pub timestamp: Timestamp,
    pub data: Arc<[u8]>,
}

impl SampleBuffer {
    pub fn new(kind: MediaKind, timestamp: Timestamp, data: impl Into<Arc<[u8]>>) -> Self {
        Self { kind, timestamp, data: data.into() }
    }
}

/// Autofocus convergence state extracted from a capture result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Inactive,
    Scanning,
    Focused,
    NotFocused,
}

impl FocusState {
    /// Whether this state is terminal for a precapture wait
    pub fn is_completed(&self) -> bool {
        matches!(self, FocusState::Focused | FocusState::NotFocused)
    }
}

/// Auto-exposure convergence state extracted from a capture result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposureState {
    #[default]
    Inactive,
    Searching,
    Precapture,
    Converged,
    FlashRequired,
    Locked,
}

impl ExposureState {
    /// Whether this state is terminal for a precapture wait
    pub fn is_completed(&self) -> bool {
        matches!(self, ExposureState::Converged | ExposureState::FlashRequired)
    }
}

/// Auto-white-balance convergence state extracted from a capture result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteBalanceState {
    #[default]
    Inactive,
    Searching,
    Converged,
    Locked,
}

impl WhiteBalanceState {
    /// Whether this state is terminal for a precapture wait
    pub fn is_completed(&self) -> bool {
        matches!(self, WhiteBalanceState::Converged)
    }
}

/// Per-frame metering metadata extracted from a completed capture result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureMetadata {
    pub focus_state: FocusState,
    pub exposure_state: ExposureState,
    pub white_balance_state: WhiteBalanceState,
}

/// Event delivered for each capture result on an active session
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A frame completed with the given metering metadata
    Completed(CaptureMetadata),
    /// The platform reported capture failure for the current request
    Failed { image_captured: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversions() {
        assert_eq!(Timestamp::from_millis(1500).as_nanos(), 1_500_000_000);
        assert_eq!(Timestamp::from_micros(250).as_nanos(), 250_000);
        assert!((Timestamp::from_millis(1500).as_secs_f64() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_timestamp_span() {
        let first = Timestamp::from_millis(100);
        let last = Timestamp::from_millis(850);
        assert_eq!(last.saturating_since(first), Timestamp::from_millis(750));
        // span never goes negative
        assert_eq!(first.saturating_since(last), Timestamp::ZERO);
    }

    #[test]
    fn test_completed_states() {
        assert!(FocusState::Focused.is_completed());
        assert!(FocusState::NotFocused.is_completed());
        assert!(!FocusState::Scanning.is_completed());

        assert!(ExposureState::Converged.is_completed());
        assert!(ExposureState::FlashRequired.is_completed());
        assert!(!ExposureState::Precapture.is_completed());

        assert!(WhiteBalanceState::Converged.is_completed());
        assert!(!WhiteBalanceState::Locked.is_completed());
    }

    #[test]
    fn test_clamping_against_details() {
        let details = DeviceDetails {
            camera_id: "0".into(),
            name: "test".into(),
            position: CameraPosition::Back,
            hardware_level: HardwareLevel::Full,
            sensor_orientation: crate::orientation::Orientation::Portrait,
            has_flash: true,
            has_torch: true,
            supports_focus: true,
            supports_low_light_boost: false,
            min_zoom: 1.0,
            max_zoom: 8.0,
            neutral_zoom: 1.0,
            min_exposure_bias: -4.0,
            max_exposure_bias: 4.0,
            supported_stabilization_modes: vec![VideoStabilizationMode::Standard],
        };
        assert_eq!(details.clamp_zoom(16.0), 8.0);
        assert_eq!(details.clamp_zoom(0.2), 1.0);
        assert_eq!(details.clamp_exposure_bias(-9.0), -4.0);
        assert!(details.supports_stabilization(VideoStabilizationMode::Off));
        assert!(!details.supports_stabilization(VideoStabilizationMode::CinematicExtended));
    }
}
