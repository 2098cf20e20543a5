// SPDX-License-Identifier: GPL-3.0-only

//! Platform capture backend abstraction
//!
//! The controller never talks to a concrete capture stack directly; it goes
//! through the traits in this module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   CameraController   │  ← Public API, transactions, recording
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  PersistentSession   │  ← Reconciliation, external-destroy guard
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CameraPlatform trait │  ← Common interface
//! └──────────┬───────────┘
//!            │
//!            ▼
//!      ┌───────────┐
//!      │  Virtual  │  ← Deterministic scriptable implementation
//!      └───────────┘
//! ```
//!
//! Closure callbacks are exactly-once: the platform invokes them from its own
//! task context (never re-entrantly from inside a controller call) when a
//! device or session is torn down, whether by the controller or out-of-band
//! by the OS (thermal shutdown, backgrounding, disconnect).

pub mod types;
pub mod virtual_device;

pub use types::*;
pub use virtual_device::{VirtualPlatform, VirtualPlatformHandle};

use crate::errors::CameraError;
use crate::recording::writer::{AudioTrackSettings, VideoTrackSettings};
use crate::recording::{VideoCodec, VideoFileType};
use crate::session::types::{Output, PreparedRequest, TorchMode};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Exactly-once callback fired when a device closes, with the error that
/// caused the closure if there was one
pub type DeviceClosedCallback = Box<dyn FnOnce(Option<CameraError>) + Send + 'static>;

/// Exactly-once callback fired when a capture session closes
pub type SessionClosedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Out-of-band notifications from the platform capture stack
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// The capture stack hit a runtime error outside any controller call
    RuntimeError(CameraError),
    /// Capture was interrupted (e.g. another process took the audio device)
    InterruptionBegan(InterruptionReason),
    /// A previous interruption ended
    InterruptionEnded,
}

/// Why a capture interruption began
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionReason {
    /// The audio device is in use by another client
    AudioInUseByOtherClient,
    /// The video device is in use by another client
    VideoInUseByOtherClient,
    /// Capture is not available while the app is in the background
    NotAvailableInBackground,
    /// The device is under system pressure (thermal, power)
    SystemPressure,
    /// Reason was not recognized
    Unknown,
}

/// Entry point to one platform capture stack
///
/// Exactly one controller owns a platform instance at a time; the physical
/// device and session are exclusively held through the handles it returns.
#[async_trait::async_trait]
pub trait CameraPlatform: Send + Sync {
    /// Open the physical capture device with the given id
    ///
    /// `on_closed` fires exactly once when the device closes, whether through
    /// [`PlatformDevice::close`] or out-of-band by the OS.
    async fn open_device(
        &self,
        camera_id: &str,
        on_closed: DeviceClosedCallback,
    ) -> Result<Arc<dyn PlatformDevice>, CameraError>;

    /// Capability metadata for a device, without opening it
    fn device_details(&self, camera_id: &str) -> Result<DeviceDetails, CameraError>;

    /// Activate the shared audio capture path (may be slow; runs off the
    /// capture path on the dedicated audio task)
    async fn activate_audio_session(&self) -> Result<(), CameraError>;

    /// Deactivate the shared audio capture path
    async fn deactivate_audio_session(&self);

    /// One-shot take of the platform's out-of-band event stream
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PlatformEvent>>;
}

/// One open physical capture device
#[async_trait::async_trait]
pub trait PlatformDevice: Send + Sync {
    /// The id this device was opened with
    fn id(&self) -> &str;

    /// Current torch mode of the device
    fn torch_mode(&self) -> TorchMode;

    /// Set the torch mode directly, outside the repeating request
    fn set_torch_mode(&self, mode: TorchMode) -> Result<(), CameraError>;

    /// Create a capture session binding this device to the given outputs
    ///
    /// `on_closed` fires exactly once when the session closes, independently
    /// of the device's own closure callback.
    async fn create_session(
        &self,
        outputs: &[Output],
        on_closed: SessionClosedCallback,
    ) -> Result<Arc<dyn PlatformSession>, CameraError>;

    /// Close the device. Closing also tears down any session bound to it.
    fn close(&self);
}

/// One active capture session bound to a device and output set
pub trait PlatformSession: Send + Sync {
    /// Install the request applied continuously to every frame
    fn set_repeating_request(&self, request: &PreparedRequest) -> Result<(), CameraError>;

    /// Remove the repeating request, stopping frame delivery
    fn stop_repeating(&self);

    /// Abort all in-flight captures so their failure handlers run
    fn abort_captures(&self);

    /// Close the session without closing its device. The closure callback
    /// fires asynchronously, like an out-of-band close.
    fn close(&self);

    /// One-shot take of the sample stream (video + audio sample buffers)
    fn take_samples(&self) -> Option<mpsc::Receiver<SampleBuffer>>;

    /// Subscribe to per-frame capture results (metering metadata, failures)
    fn capture_events(&self) -> broadcast::Receiver<CaptureEvent>;

    /// Clock descriptors for the session and audio clock domains
    fn clocks(&self) -> SessionClocks;

    /// Writer settings the platform recommends for a video output, container
    /// and codec combination
    fn recommended_video_settings(
        &self,
        output: &Output,
        file_type: VideoFileType,
        codec: Option<VideoCodec>,
    ) -> Option<VideoTrackSettings>;

    /// Writer settings the platform recommends for the audio path
    fn recommended_audio_settings(&self, file_type: VideoFileType) -> Option<AudioTrackSettings>;
}

/// The session and audio clocks of one capture session
///
/// Audio samples arrive stamped in the audio clock domain and are translated
/// into the session domain before being interleaved with video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClocks {
    pub session: MediaClock,
    pub audio: MediaClock,
}

impl SessionClocks {
    /// Translate an audio-domain timestamp into the session domain
    pub fn audio_to_session(&self, timestamp: Timestamp) -> Timestamp {
        crate::recording::clock::convert(timestamp, self.audio, self.session)
    }
}

impl Default for SessionClocks {
    fn default() -> Self {
        Self {
            session: MediaClock::new(ClockDomain::Session, 0),
            audio: MediaClock::new(ClockDomain::Audio, 0),
        }
    }
}
