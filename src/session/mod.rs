// SPDX-License-Identifier: GPL-3.0-only

//! Camera session controller
//!
//! The controller owns the lifecycle of one physical capture device, the
//! capture session bound to it, the precapture convergence protocol, and the
//! recording pipeline. It tolerates the platform closing the device or
//! session out-of-band at any time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  CameraController   │  ← focus, recording, events
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  PersistentSession  │  ← transactions, reconciliation
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CameraPlatform    │  ← device/session/sample delivery
//! └─────────────────────┘
//! ```

pub mod handles;
pub mod precapture;
pub(crate) mod router;
pub mod transaction;
pub mod types;

pub use handles::{DeviceHandle, SessionHandle};
pub use precapture::{PrecaptureResult, PrecaptureTrigger};
pub use transaction::{ConfigurationTransaction, PersistentSession};
pub use types::{Output, OutputKind, PreparedRequest, RepeatingRequest, TorchMode,
    VideoStabilizationMode};

use crate::errors::{
    CameraError, CameraResult, CaptureError, ParameterError, RecordingError, SessionError,
};
use crate::orientation::Point;
use crate::platform::types::SampleBuffer;
use crate::platform::{CameraPlatform, PlatformEvent, InterruptionReason};
use crate::recording::audio::AudioQueue;
use crate::recording::{
    RecordVideoOptions, RecordingState, TorchOverride, VideoFile, VideoRecorder, WriterFactory,
    resolve_video_settings,
};
use crate::storage;
use router::SampleRouter;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Notifications surfaced to the host application
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// An error outside any call the host made (device closed with error,
    /// audio activation failure)
    Error(CameraError),
    /// The capture stack hit a runtime error; `restarting` tells the host
    /// whether the controller is reconfiguring itself
    RuntimeError { error: CameraError, restarting: bool },
    /// Capture was interrupted by the platform
    InterruptionBegan(InterruptionReason),
    /// A previous interruption ended
    InterruptionEnded,
}

/// Controller for one camera device, its capture session and recordings
pub struct CameraController {
    session: Arc<PersistentSession>,
    router: Arc<SampleRouter>,
    recorder: Arc<StdMutex<Option<VideoRecorder>>>,
    writers: Arc<dyn WriterFactory>,
    audio: AudioQueue,
    torch: StdMutex<TorchOverride>,
    events_rx: StdMutex<Option<mpsc::UnboundedReceiver<CameraEvent>>>,
}

impl CameraController {
    /// Create a controller on top of a platform capture stack
    ///
    /// Must be called inside a tokio runtime; the controller spawns its
    /// event and audio tasks immediately.
    pub fn new(platform: Arc<dyn CameraPlatform>, writers: Arc<dyn WriterFactory>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let recorder = Arc::new(StdMutex::new(None));
        let router = Arc::new(SampleRouter::new(Arc::clone(&recorder)));
        let session = Arc::new(PersistentSession::new(
            Arc::clone(&platform),
            events_tx.clone(),
            Arc::clone(&router),
        ));
        let audio = AudioQueue::spawn(Arc::clone(&platform), events_tx.clone());

        if let Some(platform_events) = platform.take_events() {
            Self::spawn_event_loop(platform_events, Arc::clone(&session), events_tx.clone());
        }

        Self {
            session,
            router,
            recorder,
            writers,
            audio,
            torch: StdMutex::new(TorchOverride::new()),
            events_rx: StdMutex::new(Some(events_rx)),
        }
    }

    fn spawn_event_loop(
        mut platform_events: mpsc::UnboundedReceiver<PlatformEvent>,
        session: Arc<PersistentSession>,
        events: mpsc::UnboundedSender<CameraEvent>,
    ) {
        tokio::spawn(async move {
            while let Some(event) = platform_events.recv().await {
                match event {
                    PlatformEvent::RuntimeError(error) => {
                        warn!(error = %error, "Unexpected camera runtime error occurred!");
                        let restarting = session.is_active_requested();
                        let _ = events.send(CameraEvent::RuntimeError {
                            error,
                            restarting,
                        });
                        if restarting {
                            // Best-effort restart: re-run reconciliation with
                            // the current desired state.
                            if let Err(error) = session.with_configuration(|_| Ok(())).await {
                                warn!(error = %error, "Automatic capture restart failed");
                                let _ = events.send(CameraEvent::Error(error));
                            }
                        }
                    }
                    PlatformEvent::InterruptionBegan(reason) => {
                        info!(reason = ?reason, "Capture interruption began");
                        let _ = events.send(CameraEvent::InterruptionBegan(reason));
                    }
                    PlatformEvent::InterruptionEnded => {
                        info!("Capture interruption ended");
                        let _ = events.send(CameraEvent::InterruptionEnded);
                    }
                }
            }
        });
    }

    /// One-shot take of the controller's event stream
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<CameraEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    /// Install (or clear) the consumer that receives live video samples
    /// alongside any recording
    pub fn set_frame_sink(&self, sink: Option<mpsc::Sender<SampleBuffer>>) {
        self.router.set_frame_sink(sink);
    }

    /// The persistent session, for configuration transactions
    pub fn session(&self) -> &PersistentSession {
        &self.session
    }

    /// Open an exclusive configuration transaction
    pub async fn begin_configuration(&self) -> ConfigurationTransaction<'_> {
        self.session.begin_configuration().await
    }

    /// Run configuration writers inside a transaction and commit
    pub async fn configure<F>(&self, writers: F) -> CameraResult<()>
    where
        F: FnOnce(&PersistentSession) -> CameraResult<()>,
    {
        self.session.with_configuration(writers).await
    }

    /// Converge focus and exposure on a metering point
    ///
    /// `point` is in normalized device coordinates; use
    /// [`crate::orientation::view_point_to_device_point`] to convert a tap
    /// in view space. Resolves once autofocus and auto-exposure reach a
    /// terminal state, then restores the previous repeating request.
    pub async fn focus(&self, point: Point) -> CameraResult<PrecaptureResult> {
        let serial = self.session.lock_configuration().await;

        let handle = self
            .session
            .current_session()
            .filter(|s| s.is_valid())
            .ok_or(SessionError::NotReady)?;
        let installed = self.session.installed_request().ok_or(SessionError::NotReady)?;
        let details = self.session.device_details().ok_or(SessionError::NotReady)?;
        if !details.supports_focus {
            return Err(ParameterError::UnsupportedInputOrOutput("focus-point".into()).into());
        }

        let desired = self.session.desired_request().ok_or(SessionError::NotReady)?;
        let request = desired.with_focus_point(point).prepare(&details)?;

        info!(x = point.x, y = point.y, "Focusing...");
        precapture::wait_for_convergence(
            &self.session,
            &handle,
            &request,
            &installed,
            &[PrecaptureTrigger::Af, PrecaptureTrigger::Ae],
            serial,
        )
        .await
    }

    /// Start a video (and optionally audio) recording
    ///
    /// Returns once the recording is accepting samples. Everything that can
    /// fail does so here, before any file is created; later writer failures
    /// are reported by [`stop_recording`](Self::stop_recording).
    pub async fn start_recording(&self, options: RecordVideoOptions) -> CameraResult<()> {
        let _serial = self.session.lock_configuration().await;
        info!("Starting video recording...");

        if self.recorder.lock().unwrap().is_some() {
            return Err(RecordingError::AlreadyRecording.into());
        }
        options.validate()?;

        if !self.session.is_running() {
            return Err(SessionError::NotReady.into());
        }
        let handle = self
            .session
            .current_session()
            .filter(|s| s.is_valid())
            .ok_or(SessionError::NotReady)?;
        let video_output = handle
            .outputs()
            .iter()
            .find(|o| o.kind == OutputKind::Video)
            .cloned()
            .ok_or(CaptureError::VideoNotEnabled)?;
        let device = self.session.current_device().ok_or(SessionError::NotReady)?;

        // Use the torch as the video's flash for the recording's duration
        let flash_override = match options.flash {
            Some(flash) => {
                self.torch
                    .lock()
                    .unwrap()
                    .apply(device.platform_device(), flash.as_torch_mode())?;
                true
            }
            None => false,
        };

        let result = self.allocate_recording(&options, &handle, &video_output);
        match result {
            Ok(recorder) => {
                *self.recorder.lock().unwrap() = Some(recorder);
                info!("Recording started");
                Ok(())
            }
            Err(error) => {
                if flash_override {
                    self.torch.lock().unwrap().restore(device.platform_device());
                }
                Err(error)
            }
        }
    }

    fn allocate_recording(
        &self,
        options: &RecordVideoOptions,
        handle: &SessionHandle,
        video_output: &Output,
    ) -> CameraResult<VideoRecorder> {
        let file_type = options.file_type.unwrap_or_default();
        let path = storage::create_temp_recording_file(file_type)?;
        info!(path = %path.display(), "File path");

        let mut writer = self.writers.create_writer(path.clone(), file_type)?;

        let recommended = handle
            .platform_session()
            .recommended_video_settings(video_output, file_type, options.video_codec)
            .ok_or_else(|| {
                RecordingError::CreateWriterFailed("failed to get video settings".into())
            })?;
        let settings = resolve_video_settings(recommended, options);
        writer.initialize_video_track(&settings)?;

        let mut has_audio_track = false;
        if options.audio_enabled {
            // Activate the audio session off the capture path
            self.audio.activate();
            if let Some(audio_settings) =
                handle.platform_session().recommended_audio_settings(file_type)
            {
                writer.initialize_audio_track(&audio_settings)?;
                has_audio_track = true;
            }
        }

        writer.start()?;
        let mut recorder = VideoRecorder::new(
            writer,
            path,
            options.audio_enabled,
            has_audio_track,
            options.flash.is_some(),
        );
        recorder.mark_recording();
        Ok(recorder)
    }

    /// Suspend sample appends without finalizing the file
    pub async fn pause_recording(&self) -> CameraResult<()> {
        let _serial = self.session.lock_configuration().await;
        match self.recorder.lock().unwrap().as_mut() {
            Some(recorder) => recorder.pause(),
            None => Err(RecordingError::NoActiveRecording.into()),
        }
    }

    /// Resume sample appends after a pause
    pub async fn resume_recording(&self) -> CameraResult<()> {
        let _serial = self.session.lock_configuration().await;
        match self.recorder.lock().unwrap().as_mut() {
            Some(recorder) => recorder.resume(),
            None => Err(RecordingError::NoActiveRecording.into()),
        }
    }

    /// Finalize the recording and return the finished file
    pub async fn stop_recording(&self) -> CameraResult<VideoFile> {
        let _serial = self.session.lock_configuration().await;

        let recorder = self
            .recorder
            .lock()
            .unwrap()
            .take()
            .ok_or(RecordingError::NoActiveRecording)?;
        let audio_enabled = recorder.audio_enabled();
        let flash_override = recorder.has_flash_override();

        let result = recorder.finish().await;

        if audio_enabled {
            self.audio.deactivate();
        }
        if flash_override
            && let Some(device) = self.session.current_device()
        {
            self.torch.lock().unwrap().restore(device.platform_device());
        }

        result
    }

    /// Current recording lifecycle state
    pub fn recording_state(&self) -> RecordingState {
        match self.recorder.lock().unwrap().as_ref() {
            Some(recorder) => recorder.state(),
            None => RecordingState::Idle,
        }
    }

    /// Tear down the device and session
    pub fn close(&self) {
        self.session.close();
    }
}
