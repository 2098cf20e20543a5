// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture-session controller
//!
//! Errors are grouped by the component that raises them. Every error carries
//! a stable `code()` in `domain/name` form so host applications can match on
//! errors across a bridge boundary without string-parsing messages.

use std::fmt;

/// Result type alias using CameraError
pub type CameraResult<T> = Result<T, CameraError>;

/// Main controller error type
#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    /// Device-related errors (opening, configuring, capabilities)
    Device(DeviceError),
    /// Capture-session lifecycle errors
    Session(SessionError),
    /// Invalid or unsupported caller-supplied parameters
    Parameter(ParameterError),
    /// Capture/precapture errors
    Capture(CaptureError),
    /// Video recording errors
    Recording(RecordingError),
}

/// Device-specific errors
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// No camera device has been selected
    NoDevice,
    /// The selected camera id does not refer to a usable device
    Invalid(String),
    /// Applying device configuration failed
    ConfigureFailed(String),
    /// Low-light boost was requested but the device does not support it
    LowLightBoostUnsupported,
}

/// Capture-session lifecycle errors
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The session is not ready for the requested operation
    NotReady,
    /// The session was destroyed out-of-band by the platform
    Destroyed,
    /// A configuration writer was called outside an open transaction
    NotLocked(String),
}

/// Invalid caller-supplied parameter errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// A union/enum value could not be parsed
    Invalid { name: String, value: String },
    /// The value is valid but not supported on this OS/platform
    UnsupportedOnOs { name: String, value: String },
    /// The given input or output is not supported by the session
    UnsupportedInputOrOutput(String),
}

/// Capture and precapture errors
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Convergence was not reached within the precapture timeout
    TimedOut,
    /// The platform reported capture failure for the request
    Aborted { image_captured: bool },
    /// Recording was requested but no video output is configured
    VideoNotEnabled,
    /// Another precapture wait is already outstanding on this session
    AlreadyRunning,
}

/// Recording pipeline errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingError {
    /// pause/resume/stop was called with no recording in progress
    NoActiveRecording,
    /// start was called while a recording is in progress
    AlreadyRecording,
    /// Resolving/creating the temporary output file failed
    CreateTempFileFailed(String),
    /// Allocating the container writer failed
    CreateWriterFailed(String),
    /// The writer finished with an unrecognized failure status
    WriterFailedWithUnknownStatus(String),
}

impl CameraError {
    /// Stable `domain/name` error code for bridge consumers
    pub fn code(&self) -> &'static str {
        match self {
            CameraError::Device(e) => match e {
                DeviceError::NoDevice => "device/no-device",
                DeviceError::Invalid(_) => "device/invalid",
                DeviceError::ConfigureFailed(_) => "device/configure-failed",
                DeviceError::LowLightBoostUnsupported => "device/low-light-boost-unsupported",
            },
            CameraError::Session(e) => match e {
                SessionError::NotReady => "session/not-ready",
                SessionError::Destroyed => "session/destroyed",
                SessionError::NotLocked(_) => "session/not-locked",
            },
            CameraError::Parameter(e) => match e {
                ParameterError::Invalid { .. } => "parameter/invalid",
                ParameterError::UnsupportedOnOs { .. } => "parameter/unsupported-on-os",
                ParameterError::UnsupportedInputOrOutput(_) => {
                    "parameter/unsupported-input-or-output"
                }
            },
            CameraError::Capture(e) => match e {
                CaptureError::TimedOut => "capture/timed-out",
                CaptureError::Aborted { .. } => "capture/aborted",
                CaptureError::VideoNotEnabled => "capture/video-not-enabled",
                CaptureError::AlreadyRunning => "capture/already-running",
            },
            CameraError::Recording(e) => match e {
                RecordingError::NoActiveRecording => "recording/no-active-recording",
                RecordingError::AlreadyRecording => "recording/already-recording",
                RecordingError::CreateTempFileFailed(_) => "recording/create-temp-file-failed",
                RecordingError::CreateWriterFailed(_) => "recording/create-writer-failed",
                RecordingError::WriterFailedWithUnknownStatus(_) => {
                    "recording/writer-unknown-status"
                }
            },
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::Device(e) => write!(f, "Device error: {}", e),
            CameraError::Session(e) => write!(f, "Session error: {}", e),
            CameraError::Parameter(e) => write!(f, "Parameter error: {}", e),
            CameraError::Capture(e) => write!(f, "Capture error: {}", e),
            CameraError::Recording(e) => write!(f, "Recording error: {}", e),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NoDevice => write!(f, "No camera device selected"),
            DeviceError::Invalid(id) => write!(f, "Invalid camera device: {}", id),
            DeviceError::ConfigureFailed(msg) => write!(f, "Device configuration failed: {}", msg),
            DeviceError::LowLightBoostUnsupported => {
                write!(f, "Low-light boost is not supported by this device")
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotReady => write!(f, "Capture session is not ready"),
            SessionError::Destroyed => write!(f, "Capture session was destroyed by the platform"),
            SessionError::NotLocked(method) => write!(
                f,
                "Failed to call {}, session is not locked! Call begin_configuration() first.",
                method
            ),
        }
    }
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::Invalid { name, value } => {
                write!(f, "Invalid value \"{}\" for {}", value, name)
            }
            ParameterError::UnsupportedOnOs { name, value } => {
                write!(f, "Value \"{}\" for {} is not supported on this OS", value, name)
            }
            ParameterError::UnsupportedInputOrOutput(desc) => {
                write!(f, "Unsupported input or output: {}", desc)
            }
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::TimedOut => write!(f, "Capture timed out"),
            CaptureError::Aborted { image_captured } => {
                write!(f, "Capture aborted (image captured: {})", image_captured)
            }
            CaptureError::VideoNotEnabled => {
                write!(f, "Video is not enabled, add a video output first")
            }
            CaptureError::AlreadyRunning => {
                write!(f, "Another precapture wait is already running")
            }
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::NoActiveRecording => write!(f, "No active recording in progress"),
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::CreateTempFileFailed(msg) => {
                write!(f, "Failed to create temporary file: {}", msg)
            }
            RecordingError::CreateWriterFailed(msg) => {
                write!(f, "Failed to create container writer: {}", msg)
            }
            RecordingError::WriterFailedWithUnknownStatus(msg) => {
                write!(f, "Writer failed with unknown status: {}", msg)
            }
        }
    }
}

impl std::error::Error for CameraError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for SessionError {}
impl std::error::Error for ParameterError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RecordingError {}

// Conversions from sub-errors to CameraError
impl From<DeviceError> for CameraError {
    fn from(err: DeviceError) -> Self {
        CameraError::Device(err)
    }
}

impl From<SessionError> for CameraError {
    fn from(err: SessionError) -> Self {
        CameraError::Session(err)
    }
}

impl From<ParameterError> for CameraError {
    fn from(err: ParameterError) -> Self {
        CameraError::Parameter(err)
    }
}

impl From<CaptureError> for CameraError {
    fn from(err: CaptureError) -> Self {
        CameraError::Capture(err)
    }
}

impl From<RecordingError> for CameraError {
    fn from(err: RecordingError) -> Self {
        CameraError::Recording(err)
    }
}
