// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture platform
//!
//! A deterministic, fully scriptable implementation of the platform traits.
//! Hosts use it to develop against the controller without hardware; the
//! integration tests use it to script sample delivery, metering convergence,
//! capture failures and out-of-band device destruction.

use crate::errors::{CameraError, CameraResult, DeviceError, RecordingError, SessionError};
use crate::platform::types::{
    CaptureEvent, CaptureMetadata, ClockDomain, DeviceDetails, MediaClock, MediaKind,
    SampleBuffer, Timestamp,
};
use crate::platform::{
    CameraPlatform, DeviceClosedCallback, PlatformDevice, PlatformEvent, PlatformSession,
    SessionClosedCallback, SessionClocks,
};
use crate::recording::writer::{
    AudioTrackSettings, ContainerWriter, TrackKind, VideoTrackSettings, WriterError, WriterFactory,
};
use crate::recording::{BitratePreset, VideoCodec, VideoFileType};
use crate::session::types::{Output, PreparedRequest, TorchMode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Capacity of the per-session sample channel
const SAMPLE_QUEUE_DEPTH: usize = 64;

struct VirtualDeviceState {
    id: String,
    torch: StdMutex<TorchMode>,
    closed: AtomicBool,
    on_closed: StdMutex<Option<DeviceClosedCallback>>,
}

impl VirtualDeviceState {
    /// Fire the closure callback exactly once
    fn fire_closed(&self, error: Option<CameraError>) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(callback) = self.on_closed.lock().unwrap().take() {
            callback(error);
        }
    }
}

struct VirtualSessionState {
    outputs: Vec<Output>,
    repeating: StdMutex<Option<PreparedRequest>>,
    repeating_active: AtomicBool,
    install_log: StdMutex<Vec<PreparedRequest>>,
    aborted_captures: AtomicU64,
    closed: AtomicBool,
    on_closed: StdMutex<Option<SessionClosedCallback>>,
    samples_tx: StdMutex<Option<mpsc::Sender<SampleBuffer>>>,
    samples_rx: StdMutex<Option<mpsc::Receiver<SampleBuffer>>>,
    capture_events: broadcast::Sender<CaptureEvent>,
    clocks: SessionClocks,
}

impl VirtualSessionState {
    /// Fire the closure callback exactly once and end the sample stream
    fn fire_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.samples_tx.lock().unwrap().take();
        if let Some(callback) = self.on_closed.lock().unwrap().take() {
            callback();
        }
    }
}

struct VirtualState {
    details: StdMutex<HashMap<String, DeviceDetails>>,
    current_device: StdMutex<Option<Arc<VirtualDeviceState>>>,
    current_session: StdMutex<Option<Arc<VirtualSessionState>>>,
    events_tx: mpsc::UnboundedSender<PlatformEvent>,
    events_rx: StdMutex<Option<mpsc::UnboundedReceiver<PlatformEvent>>>,
    fail_next_open: StdMutex<Option<CameraError>>,
    audio_clock_offset_ns: AtomicI64,
    audio_active: AtomicBool,
    audio_activations: AtomicU64,
    opened_devices: AtomicU64,
}

/// Scriptable in-process capture platform
pub struct VirtualPlatform {
    state: Arc<VirtualState>,
}

impl VirtualPlatform {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(VirtualState {
                details: StdMutex::new(HashMap::new()),
                current_device: StdMutex::new(None),
                current_session: StdMutex::new(None),
                events_tx,
                events_rx: StdMutex::new(Some(events_rx)),
                fail_next_open: StdMutex::new(None),
                audio_clock_offset_ns: AtomicI64::new(0),
                audio_active: AtomicBool::new(false),
                audio_activations: AtomicU64::new(0),
                opened_devices: AtomicU64::new(0),
            }),
        }
    }

    /// A platform pre-seeded with one back camera, `"back-wide"`
    pub fn with_default_device() -> Self {
        let platform = Self::new();
        platform.handle().add_device(default_device_details("back-wide"));
        platform
    }

    /// Scripting handle for tests and host development
    pub fn handle(&self) -> VirtualPlatformHandle {
        VirtualPlatformHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for VirtualPlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasonable capability metadata for a scripted device
pub fn default_device_details(camera_id: &str) -> DeviceDetails {
    use crate::orientation::Orientation;
    use crate::platform::types::{CameraPosition, HardwareLevel};
    use crate::session::types::VideoStabilizationMode;

    DeviceDetails {
        camera_id: camera_id.to_string(),
        name: format!("Virtual Camera ({})", camera_id),
        position: CameraPosition::Back,
        hardware_level: HardwareLevel::Full,
        sensor_orientation: Orientation::LandscapeLeft,
        has_flash: true,
        has_torch: true,
        supports_focus: true,
        supports_low_light_boost: false,
        min_zoom: 1.0,
        max_zoom: 16.0,
        neutral_zoom: 1.0,
        min_exposure_bias: -4.0,
        max_exposure_bias: 4.0,
        supported_stabilization_modes: vec![VideoStabilizationMode::Standard],
    }
}

#[async_trait::async_trait]
impl CameraPlatform for VirtualPlatform {
    async fn open_device(
        &self,
        camera_id: &str,
        on_closed: DeviceClosedCallback,
    ) -> Result<Arc<dyn PlatformDevice>, CameraError> {
        if let Some(error) = self.state.fail_next_open.lock().unwrap().take() {
            return Err(error);
        }
        if !self.state.details.lock().unwrap().contains_key(camera_id) {
            return Err(DeviceError::Invalid(camera_id.to_string()).into());
        }

        info!(camera_id = %camera_id, "Opening virtual device");
        let device = Arc::new(VirtualDeviceState {
            id: camera_id.to_string(),
            torch: StdMutex::new(TorchMode::Off),
            closed: AtomicBool::new(false),
            on_closed: StdMutex::new(Some(on_closed)),
        });
        *self.state.current_device.lock().unwrap() = Some(Arc::clone(&device));
        self.state.opened_devices.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(VirtualDevice {
            state: device,
            platform: Arc::clone(&self.state),
        }))
    }

    fn device_details(&self, camera_id: &str) -> Result<DeviceDetails, CameraError> {
        self.state
            .details
            .lock()
            .unwrap()
            .get(camera_id)
            .cloned()
            .ok_or_else(|| DeviceError::Invalid(camera_id.to_string()).into())
    }

    async fn activate_audio_session(&self) -> Result<(), CameraError> {
        self.state.audio_active.store(true, Ordering::SeqCst);
        self.state.audio_activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deactivate_audio_session(&self) {
        self.state.audio_active.store(false, Ordering::SeqCst);
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PlatformEvent>> {
        self.state.events_rx.lock().unwrap().take()
    }
}

struct VirtualDevice {
    state: Arc<VirtualDeviceState>,
    platform: Arc<VirtualState>,
}

#[async_trait::async_trait]
impl PlatformDevice for VirtualDevice {
    fn id(&self) -> &str {
        &self.state.id
    }

    fn torch_mode(&self) -> TorchMode {
        *self.state.torch.lock().unwrap()
    }

    fn set_torch_mode(&self, mode: TorchMode) -> Result<(), CameraError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(DeviceError::ConfigureFailed("device is closed".into()).into());
        }
        *self.state.torch.lock().unwrap() = mode;
        Ok(())
    }

    async fn create_session(
        &self,
        outputs: &[Output],
        on_closed: SessionClosedCallback,
    ) -> Result<Arc<dyn PlatformSession>, CameraError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Destroyed.into());
        }

        info!(outputs = outputs.len(), "Creating virtual session");
        let (samples_tx, samples_rx) = mpsc::channel(SAMPLE_QUEUE_DEPTH);
        let (capture_events, _) = broadcast::channel(SAMPLE_QUEUE_DEPTH);
        let audio_offset = self.platform.audio_clock_offset_ns.load(Ordering::SeqCst);

        let session = Arc::new(VirtualSessionState {
            outputs: outputs.to_vec(),
            repeating: StdMutex::new(None),
            repeating_active: AtomicBool::new(false),
            install_log: StdMutex::new(Vec::new()),
            aborted_captures: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            on_closed: StdMutex::new(Some(on_closed)),
            samples_tx: StdMutex::new(Some(samples_tx)),
            samples_rx: StdMutex::new(Some(samples_rx)),
            capture_events,
            clocks: SessionClocks {
                session: MediaClock::new(ClockDomain::Session, 0),
                audio: MediaClock::new(ClockDomain::Audio, audio_offset),
            },
        });
        *self.platform.current_session.lock().unwrap() = Some(Arc::clone(&session));

        Ok(Arc::new(VirtualSession { state: session }))
    }

    fn close(&self) {
        debug!(camera_id = %self.state.id, "Closing virtual device");
        // Closing the device also closes any session bound to it. Snapshot
        // the session now; callbacks fire from the platform's own task,
        // never re-entrantly inside the caller.
        let session = self.platform.current_session.lock().unwrap().clone();
        let state = Arc::clone(&self.state);
        spawn_platform_callback(move || {
            if let Some(session) = session {
                session.fire_closed();
            }
            state.fire_closed(None);
        });
    }
}

/// Run a closure-callback off the caller's stack, like a real platform would
fn spawn_platform_callback(callback: impl FnOnce() + Send + 'static) {
    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        runtime.spawn(async move { callback() });
    } else {
        std::thread::spawn(callback);
    }
}

struct VirtualSession {
    state: Arc<VirtualSessionState>,
}

impl PlatformSession for VirtualSession {
    fn set_repeating_request(&self, request: &PreparedRequest) -> Result<(), CameraError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Destroyed.into());
        }
        debug!(zoom = request.zoom, torch = %request.torch, "Installing repeating request");
        *self.state.repeating.lock().unwrap() = Some(request.clone());
        self.state.install_log.lock().unwrap().push(request.clone());
        self.state.repeating_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_repeating(&self) {
        debug!("Stopping repeating request");
        self.state.repeating_active.store(false, Ordering::SeqCst);
    }

    fn abort_captures(&self) {
        self.state.aborted_captures.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        let state = Arc::clone(&self.state);
        spawn_platform_callback(move || state.fire_closed());
    }

    fn take_samples(&self) -> Option<mpsc::Receiver<SampleBuffer>> {
        self.state.samples_rx.lock().unwrap().take()
    }

    fn capture_events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.state.capture_events.subscribe()
    }

    fn clocks(&self) -> SessionClocks {
        self.state.clocks
    }

    fn recommended_video_settings(
        &self,
        output: &Output,
        file_type: VideoFileType,
        codec: Option<VideoCodec>,
    ) -> Option<VideoTrackSettings> {
        // AVC-I containers are not writable by the virtual stack
        if file_type == VideoFileType::Avci {
            return None;
        }
        Some(VideoTrackSettings {
            codec: codec.unwrap_or(VideoCodec::H264),
            width: output.width,
            height: output.height,
            pixel_format: output.pixel_format.clone(),
            average_bit_rate: BitratePreset::Medium.bit_rate(output.width, output.height),
        })
    }

    fn recommended_audio_settings(&self, _file_type: VideoFileType) -> Option<AudioTrackSettings> {
        Some(AudioTrackSettings::default())
    }
}

/// Scripting interface to a [`VirtualPlatform`]
///
/// All methods act on the *current* device/session, i.e. whatever the
/// controller opened last.
#[derive(Clone)]
pub struct VirtualPlatformHandle {
    state: Arc<VirtualState>,
}

impl VirtualPlatformHandle {
    /// Register a device the controller can open
    pub fn add_device(&self, details: DeviceDetails) {
        self.state
            .details
            .lock()
            .unwrap()
            .insert(details.camera_id.clone(), details);
    }

    /// Make the next `open_device` call fail with `error`
    pub fn fail_next_open(&self, error: CameraError) {
        *self.state.fail_next_open.lock().unwrap() = Some(error);
    }

    /// Skew the audio clock relative to the session clock for sessions
    /// created afterwards
    pub fn set_audio_clock_offset_ms(&self, millis: i64) {
        self.state
            .audio_clock_offset_ns
            .store(millis * 1_000_000, Ordering::SeqCst);
    }

    /// How many devices have been opened over the platform's lifetime
    pub fn opened_device_count(&self) -> u64 {
        self.state.opened_devices.load(Ordering::SeqCst)
    }

    /// Id of the currently open device, if any
    pub fn current_device_id(&self) -> Option<String> {
        self.state
            .current_device
            .lock()
            .unwrap()
            .as_ref()
            .map(|d| d.id.clone())
    }

    /// Torch mode of the currently open device
    pub fn device_torch_mode(&self) -> Option<TorchMode> {
        self.state
            .current_device
            .lock()
            .unwrap()
            .as_ref()
            .map(|d| *d.torch.lock().unwrap())
    }

    /// Whether a repeating request is currently installed and streaming
    pub fn is_repeating_active(&self) -> bool {
        self.state
            .current_session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.repeating_active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Every request installed on the current session, oldest first
    pub fn installed_requests(&self) -> Vec<PreparedRequest> {
        self.state
            .current_session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.install_log.lock().unwrap().clone())
            .unwrap_or_default()
    }

    /// How often in-flight captures were aborted on the current session
    pub fn aborted_capture_count(&self) -> u64 {
        self.state
            .current_session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.aborted_captures.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Whether the audio session is active
    pub fn audio_session_active(&self) -> bool {
        self.state.audio_active.load(Ordering::SeqCst)
    }

    /// How often the audio session has been activated
    pub fn audio_activation_count(&self) -> u64 {
        self.state.audio_activations.load(Ordering::SeqCst)
    }

    /// Deliver one video sample on the current session
    pub async fn push_video_sample(&self, timestamp: Timestamp) {
        self.push_sample(MediaKind::Video, timestamp).await;
    }

    /// Deliver one audio sample on the current session, stamped in the
    /// audio clock domain
    pub async fn push_audio_sample(&self, timestamp: Timestamp) {
        self.push_sample(MediaKind::Audio, timestamp).await;
    }

    async fn push_sample(&self, kind: MediaKind, timestamp: Timestamp) {
        let sender = self
            .state
            .current_session
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|s| s.samples_tx.lock().unwrap().clone());
        if let Some(sender) = sender {
            let _ = sender
                .send(SampleBuffer::new(kind, timestamp, vec![0u8; 16]))
                .await;
        }
    }

    /// Deliver one capture result with the given metering metadata
    pub fn push_capture_metadata(&self, metadata: CaptureMetadata) {
        if let Some(session) = self.state.current_session.lock().unwrap().as_ref() {
            let _ = session.capture_events.send(CaptureEvent::Completed(metadata));
        }
    }

    /// Report capture failure for the current request
    pub fn push_capture_failure(&self, image_captured: bool) {
        if let Some(session) = self.state.current_session.lock().unwrap().as_ref() {
            let _ = session
                .capture_events
                .send(CaptureEvent::Failed { image_captured });
        }
    }

    /// Destroy the current device out-of-band, as the OS would on thermal
    /// shutdown or disconnect
    pub fn disconnect_device(&self, error: Option<CameraError>) {
        let session = self.state.current_session.lock().unwrap().take();
        if let Some(session) = session {
            session.fire_closed();
        }
        let device = self.state.current_device.lock().unwrap().take();
        if let Some(device) = device {
            device.fire_closed(error);
        }
    }

    /// Destroy the current session out-of-band, keeping the device open
    pub fn close_session(&self) {
        let session = self.state.current_session.lock().unwrap().take();
        if let Some(session) = session {
            session.fire_closed();
        }
    }

    /// Emit an out-of-band platform event (runtime error, interruption)
    pub fn emit(&self, event: PlatformEvent) {
        let _ = self.state.events_tx.send(event);
    }
}

// ===== Virtual container writer =====

/// Everything a virtual writer observed for one recording
#[derive(Debug, Default)]
pub struct RecordedMedia {
    pub path: PathBuf,
    pub video_settings: Option<VideoTrackSettings>,
    pub audio_settings: Option<AudioTrackSettings>,
    pub video_timestamps: Vec<Timestamp>,
    pub audio_timestamps: Vec<Timestamp>,
    pub started: bool,
    pub finalized: bool,
}

#[derive(Default)]
struct VirtualWriterScript {
    fail_create: Option<String>,
    fail_appends: bool,
    abort_on_finalize: bool,
}

/// Factory for in-memory container writers with failure injection
#[derive(Default)]
pub struct VirtualWriterFactory {
    recordings: StdMutex<Vec<Arc<StdMutex<RecordedMedia>>>>,
    script: StdMutex<VirtualWriterScript>,
}

impl VirtualWriterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recording most recently allocated, if any
    pub fn last_recording(&self) -> Option<Arc<StdMutex<RecordedMedia>>> {
        self.recordings.lock().unwrap().last().cloned()
    }

    /// Make the next `create_writer` call fail
    pub fn fail_next_create(&self, message: &str) {
        self.script.lock().unwrap().fail_create = Some(message.to_string());
    }

    /// Make writers reject every append
    pub fn fail_appends(&self) {
        self.script.lock().unwrap().fail_appends = true;
    }

    /// Make finalize report an explicit abort
    pub fn abort_on_finalize(&self) {
        self.script.lock().unwrap().abort_on_finalize = true;
    }
}

impl WriterFactory for VirtualWriterFactory {
    fn create_writer(
        &self,
        path: PathBuf,
        _file_type: VideoFileType,
    ) -> Result<Box<dyn ContainerWriter>, CameraError> {
        let script = self.script.lock().unwrap();
        if let Some(message) = &script.fail_create {
            return Err(RecordingError::CreateWriterFailed(message.clone()).into());
        }

        let media = Arc::new(StdMutex::new(RecordedMedia {
            path: path.clone(),
            ..Default::default()
        }));
        self.recordings.lock().unwrap().push(Arc::clone(&media));

        Ok(Box::new(VirtualWriter {
            path,
            media,
            fail_appends: script.fail_appends,
            abort_on_finalize: script.abort_on_finalize,
        }))
    }
}

struct VirtualWriter {
    path: PathBuf,
    media: Arc<StdMutex<RecordedMedia>>,
    fail_appends: bool,
    abort_on_finalize: bool,
}

impl ContainerWriter for VirtualWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_video_track(&mut self, settings: &VideoTrackSettings) -> CameraResult<()> {
        self.media.lock().unwrap().video_settings = Some(settings.clone());
        Ok(())
    }

    fn initialize_audio_track(&mut self, settings: &AudioTrackSettings) -> CameraResult<()> {
        self.media.lock().unwrap().audio_settings = Some(settings.clone());
        Ok(())
    }

    fn start(&mut self) -> CameraResult<()> {
        self.media.lock().unwrap().started = true;
        Ok(())
    }

    fn append(
        &mut self,
        track: TrackKind,
        timestamp: Timestamp,
        _data: &[u8],
    ) -> Result<(), WriterError> {
        if self.fail_appends {
            return Err(WriterError::Failed("injected append failure".into()));
        }
        let mut media = self.media.lock().unwrap();
        match track {
            TrackKind::Video => media.video_timestamps.push(timestamp),
            TrackKind::Audio => media.audio_timestamps.push(timestamp),
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), WriterError> {
        if self.abort_on_finalize {
            return Err(WriterError::Aborted);
        }
        let mut media = self.media.lock().unwrap();
        media.finalized = true;

        // Leave a manifest in the container file so the output is inspectable
        let manifest = serde_json::json!({
            "video_samples": media.video_timestamps.len(),
            "audio_samples": media.audio_timestamps.len(),
        });
        std::fs::write(&self.path, manifest.to_string())
            .map_err(|e| WriterError::Failed(e.to_string()))?;
        Ok(())
    }
}
