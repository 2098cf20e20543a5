// SPDX-License-Identifier: GPL-3.0-only

//! The persistent capture session and its configuration transaction
//!
//! All mutation of desired state (camera id, outputs, repeating request,
//! active flag) happens inside an exclusive configuration transaction;
//! committing reconciles the platform device and capture session against the
//! desired state. Device and session are kept allocated while inactive so a
//! background/foreground toggle does not pay the multi-hundred-millisecond
//! device reopen cost.
//!
//! The platform can close the device or session out-of-band at any time.
//! That race is modeled as an explicit `destroyed_from_outside` flag checked
//! before and after every reconciliation step, never as a nulled reference.

use crate::errors::{CameraError, CameraResult, DeviceError, SessionError};
use crate::platform::{CameraPlatform, DeviceClosedCallback, SessionClosedCallback};
use crate::platform::types::DeviceDetails;
use crate::session::handles::{DeviceHandle, SessionHandle};
use crate::session::router::SampleRouter;
use crate::session::types::{Output, PreparedRequest, RepeatingRequest};
use crate::session::CameraEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Desired state written by configuration transactions
#[derive(Default)]
struct DesiredState {
    camera_id: Option<String>,
    outputs: Vec<Output>,
    repeating: Option<RepeatingRequest>,
    active: bool,
}

/// Platform-backed state reconciled against the desired state
#[derive(Default)]
struct RuntimeState {
    device: Option<DeviceHandle>,
    session: Option<SessionHandle>,
    details: Option<DeviceDetails>,
    /// The request currently installed as the session's repeating request
    last_installed: Option<PreparedRequest>,
}

pub(crate) struct SessionInner {
    platform: Arc<dyn CameraPlatform>,
    /// The single configuration lock; every public mutation serializes here
    config_lock: tokio::sync::Mutex<()>,
    /// True while a configuration transaction is open
    locked: AtomicBool,
    desired: StdMutex<DesiredState>,
    runtime: StdMutex<RuntimeState>,
    /// Set by platform closure callbacks racing with reconciliation
    destroyed_from_outside: AtomicBool,
    /// Generation counter distinguishing replaced handles from current ones
    generations: AtomicU64,
    events: mpsc::UnboundedSender<CameraEvent>,
    router: Arc<SampleRouter>,
}

/// A capture session that survives interruptions and stays open whenever
/// possible
pub struct PersistentSession {
    inner: Arc<SessionInner>,
}

impl PersistentSession {
    pub(crate) fn new(
        platform: Arc<dyn CameraPlatform>,
        events: mpsc::UnboundedSender<CameraEvent>,
        router: Arc<SampleRouter>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                platform,
                config_lock: tokio::sync::Mutex::new(()),
                locked: AtomicBool::new(false),
                desired: StdMutex::new(DesiredState::default()),
                runtime: StdMutex::new(RuntimeState::default()),
                destroyed_from_outside: AtomicBool::new(false),
                generations: AtomicU64::new(0),
                events,
                router,
            }),
        }
    }

    /// Open an exclusive configuration transaction
    ///
    /// Waits until any other transaction (or serialized operation) finishes.
    pub async fn begin_configuration(&self) -> ConfigurationTransaction<'_> {
        let guard = self.inner.config_lock.lock().await;
        self.inner.locked.store(true, Ordering::SeqCst);
        ConfigurationTransaction {
            session: self,
            _guard: guard,
        }
    }

    /// Run `writers` inside a transaction and commit
    pub async fn with_configuration<F>(&self, writers: F) -> CameraResult<()>
    where
        F: FnOnce(&PersistentSession) -> CameraResult<()>,
    {
        let transaction = self.begin_configuration().await;
        writers(self)?;
        transaction.commit().await
    }

    /// Serialize an operation behind the configuration lock without opening
    /// a transaction (recording control, focus)
    pub(crate) async fn lock_configuration(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.config_lock.lock().await
    }

    /// Whether the host currently wants the session active
    pub fn is_active_requested(&self) -> bool {
        self.inner.desired.lock().unwrap().active
    }

    /// Whether the session is actively streaming frames
    pub fn is_running(&self) -> bool {
        let runtime = self.inner.runtime.lock().unwrap();
        let desired = self.inner.desired.lock().unwrap();
        desired.active
            && runtime.device.is_some()
            && runtime.session.is_some()
            && !self.inner.destroyed_from_outside.load(Ordering::SeqCst)
    }

    /// The currently open device, if any
    pub fn current_device(&self) -> Option<DeviceHandle> {
        self.inner.runtime.lock().unwrap().device.clone()
    }

    /// The currently allocated capture session, if any
    pub fn current_session(&self) -> Option<SessionHandle> {
        self.inner.runtime.lock().unwrap().session.clone()
    }

    /// The request installed as the session's repeating request, if active
    pub fn installed_request(&self) -> Option<PreparedRequest> {
        self.inner.runtime.lock().unwrap().last_installed.clone()
    }

    /// The desired repeating request as last written by a transaction
    pub fn desired_request(&self) -> Option<RepeatingRequest> {
        self.inner.desired.lock().unwrap().repeating.clone()
    }

    /// Capability metadata for the currently open device
    pub fn device_details(&self) -> Option<DeviceDetails> {
        self.inner.runtime.lock().unwrap().details.clone()
    }

    // ===== Configuration writers =====
    //
    // Writers mutate desired state only; nothing touches the platform until
    // commit. The exceptions mirror the platform contract: changing input or
    // outputs immediately invalidates dependants so their in-flight captures
    // fail fast instead of landing on a stale target.

    /// Select the camera device to open on commit
    pub fn set_input(&self, camera_id: &str) -> CameraResult<()> {
        self.assert_locked("set_input")?;
        debug!(camera_id = %camera_id, "--> set_input");

        let current_id = {
            let runtime = self.inner.runtime.lock().unwrap();
            runtime.device.as_ref().map(|d| d.id().to_string())
        };
        let mut desired = self.inner.desired.lock().unwrap();
        if desired.camera_id.as_deref() != Some(camera_id)
            || current_id.as_deref() != Some(camera_id)
        {
            desired.camera_id = Some(camera_id.to_string());
            drop(desired);

            let mut runtime = self.inner.runtime.lock().unwrap();
            if let Some(session) = runtime.session.take() {
                session.try_abort_captures();
                session.invalidate();
            }
            // Closing the device also tears down any session bound to it
            if let Some(device) = runtime.device.take() {
                device.close();
            }
            runtime.details = None;
            runtime.last_installed = None;
        }
        Ok(())
    }

    /// Replace the output set bound into the session on commit
    pub fn set_outputs(&self, outputs: Vec<Output>) -> CameraResult<()> {
        self.assert_locked("set_outputs")?;
        debug!(count = outputs.len(), "--> set_outputs");

        let mut desired = self.inner.desired.lock().unwrap();
        if desired.outputs != outputs {
            let keep_warm = !outputs.is_empty();
            desired.outputs = outputs;
            drop(desired);

            let mut runtime = self.inner.runtime.lock().unwrap();
            if let Some(session) = runtime.session.take() {
                if keep_warm {
                    // The next session takes over the outputs; abort so
                    // outstanding captures get their failure handlers.
                    session.try_abort_captures();
                } else {
                    session.platform_session().close();
                }
                session.invalidate();
            }
            runtime.last_installed = None;
        }
        Ok(())
    }

    /// Set the per-frame request installed while active
    pub fn set_repeating_request(&self, request: RepeatingRequest) -> CameraResult<()> {
        self.assert_locked("set_repeating_request")?;
        debug!("--> set_repeating_request");
        let mut desired = self.inner.desired.lock().unwrap();
        if desired.repeating.as_ref() != Some(&request) {
            desired.repeating = Some(request);
        }
        Ok(())
    }

    /// Start or stop frame streaming on commit
    pub fn set_active(&self, active: bool) -> CameraResult<()> {
        self.assert_locked("set_active")?;
        debug!(active, "--> set_active");
        let mut desired = self.inner.desired.lock().unwrap();
        desired.active = active;
        if active {
            // Re-activating is the signal to reconcile after an external
            // destruction.
            self.inner.destroyed_from_outside.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    fn assert_locked(&self, method: &str) -> CameraResult<()> {
        if !self.inner.locked.load(Ordering::SeqCst) {
            return Err(SessionError::NotLocked(method.to_string()).into());
        }
        Ok(())
    }

    // ===== Reconciliation =====

    pub(crate) async fn configure(&self) -> CameraResult<()> {
        let inner = &self.inner;

        let (camera_id, outputs, repeating, active) = {
            let desired = inner.desired.lock().unwrap();
            (
                desired.camera_id.clone(),
                desired.outputs.clone(),
                desired.repeating.clone(),
                desired.active,
            )
        };

        if inner.destroyed_from_outside.load(Ordering::SeqCst) && !active {
            debug!(
                "Session has been destroyed by the platform, skipping configuration until \
                 set_active(true)"
            );
            return Ok(());
        }
        debug!(active, camera_id = ?camera_id, "Configure()");

        let camera_id = camera_id.ok_or(DeviceError::NoDevice)?;
        inner.destroyed_from_outside.store(false, Ordering::SeqCst);

        let result = self
            .reconcile(&camera_id, &outputs, repeating.as_ref(), active)
            .await;
        match result {
            Err(error) if inner.destroyed_from_outside.load(Ordering::SeqCst) => {
                // The device was destroyed while we were reconciling; that's
                // fine, the next active transition reconciles again.
                debug!(error = %error, "Configure() canceled, session destroyed in the meantime");
                Ok(())
            }
            other => other,
        }
    }

    async fn reconcile(
        &self,
        camera_id: &str,
        outputs: &[Output],
        repeating: Option<&RepeatingRequest>,
        active: bool,
    ) -> CameraResult<()> {
        let inner = &self.inner;

        let device = self.get_or_create_device(camera_id).await?;
        if inner.destroyed_from_outside.load(Ordering::SeqCst) {
            return Ok(());
        }

        if outputs.is_empty() {
            debug!("No outputs configured, leaving device open without a session");
            return Ok(());
        }

        let session = self.get_or_create_session(&device, outputs).await?;
        if inner.destroyed_from_outside.load(Ordering::SeqCst) {
            return Ok(());
        }

        if active {
            debug!("Updating repeating request...");
            let details = self.get_or_create_details(&device)?;
            let repeating = repeating.ok_or(SessionError::NotReady)?;
            let prepared = repeating.prepare(&details)?;
            session.platform_session().set_repeating_request(&prepared)?;
            inner.runtime.lock().unwrap().last_installed = Some(prepared);
        } else {
            debug!("Stopping repeating request...");
            session.platform_session().stop_repeating();
            inner.runtime.lock().unwrap().last_installed = None;
        }

        debug!(active, camera_id = %camera_id, "Configure() done");
        Ok(())
    }

    async fn get_or_create_device(&self, camera_id: &str) -> CameraResult<DeviceHandle> {
        let inner = &self.inner;
        {
            let runtime = inner.runtime.lock().unwrap();
            if let Some(device) = &runtime.device
                && device.id() == camera_id
                && device.is_valid()
            {
                return Ok(device.clone());
            }
        }

        info!(camera_id = %camera_id, "Creating new device...");
        {
            let mut runtime = inner.runtime.lock().unwrap();
            if let Some(session) = runtime.session.take() {
                session.try_abort_captures();
                session.invalidate();
            }
            if let Some(device) = runtime.device.take() {
                device.close();
            }
            runtime.details = None;
            runtime.last_installed = None;
        }

        let generation = inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(inner);
        let on_closed: DeviceClosedCallback = Box::new(move |error| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_device_closed(generation, error);
            }
        });

        let platform_device = inner.platform.open_device(camera_id, on_closed).await?;
        let handle = DeviceHandle::new(platform_device, generation);
        inner.runtime.lock().unwrap().device = Some(handle.clone());
        Ok(handle)
    }

    async fn get_or_create_session(
        &self,
        device: &DeviceHandle,
        outputs: &[Output],
    ) -> CameraResult<SessionHandle> {
        let inner = &self.inner;
        {
            let runtime = inner.runtime.lock().unwrap();
            if let Some(session) = &runtime.session
                && session.is_valid()
                && session.device_generation() == device.generation()
            {
                return Ok(session.clone());
            }
        }

        info!("Creating new session...");
        {
            let runtime = inner.runtime.lock().unwrap();
            if let Some(session) = &runtime.session {
                session.try_abort_captures();
            }
        }

        let generation = inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(inner);
        let on_closed: SessionClosedCallback = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.handle_session_closed(generation);
            }
        });

        let platform_session = device
            .platform_device()
            .create_session(outputs, on_closed)
            .await?;
        let handle = SessionHandle::new(
            platform_session,
            device.generation(),
            generation,
            outputs.to_vec(),
        );

        // Route the session's sample stream into the fan-out task
        if let Some(samples) = handle.platform_session().take_samples() {
            let clocks = handle.platform_session().clocks();
            inner.router.attach(samples, clocks);
        }

        inner.runtime.lock().unwrap().session = Some(handle.clone());
        Ok(handle)
    }

    fn get_or_create_details(&self, device: &DeviceHandle) -> CameraResult<DeviceDetails> {
        let inner = &self.inner;
        {
            let runtime = inner.runtime.lock().unwrap();
            if let Some(details) = &runtime.details
                && details.camera_id == device.id()
            {
                return Ok(details.clone());
            }
        }

        let details = inner.platform.device_details(device.id())?;
        inner.runtime.lock().unwrap().details = Some(details.clone());
        Ok(details)
    }

    /// Install a request directly, bypassing desired state. Used by the
    /// precapture coordinator to override and restore the stream.
    pub(crate) fn install_request_now(
        &self,
        session: &SessionHandle,
        request: &PreparedRequest,
    ) -> CameraResult<()> {
        session.platform_session().set_repeating_request(request)?;
        self.inner.runtime.lock().unwrap().last_installed = Some(request.clone());
        Ok(())
    }

    /// Tear down the device and session. The platform's closure callbacks
    /// still fire, but generation checks make them no-ops.
    pub fn close(&self) {
        let mut runtime = self.inner.runtime.lock().unwrap();
        if let Some(session) = runtime.session.take() {
            session.try_abort_captures();
            session.invalidate();
        }
        if let Some(device) = runtime.device.take() {
            device.close();
        }
        runtime.last_installed = None;
    }
}

impl SessionInner {
    fn handle_device_closed(&self, generation: u64, error: Option<CameraError>) {
        info!(generation, "Camera device closed");
        {
            let mut runtime = self.runtime.lock().unwrap();
            let is_current = runtime
                .device
                .as_ref()
                .map(|d| d.generation() == generation)
                .unwrap_or(false);
            if is_current {
                self.destroyed_from_outside.store(true, Ordering::SeqCst);
                if let Some(session) = runtime.session.take() {
                    session.try_abort_captures();
                    session.invalidate();
                }
                if let Some(device) = runtime.device.take() {
                    device.invalidate();
                }
                runtime.last_installed = None;
                self.desired.lock().unwrap().active = false;
            }
        }
        if let Some(error) = error {
            warn!(error = %error, "Device closed with error");
            let _ = self.events.send(CameraEvent::Error(error));
        }
    }

    fn handle_session_closed(&self, generation: u64) {
        info!(generation, "Capture session closed");
        let mut runtime = self.runtime.lock().unwrap();
        let is_current = runtime
            .session
            .as_ref()
            .map(|s| s.generation() == generation)
            .unwrap_or(false);
        if is_current {
            self.destroyed_from_outside.store(true, Ordering::SeqCst);
            if let Some(session) = runtime.session.take() {
                session.try_abort_captures();
                session.invalidate();
            }
            runtime.last_installed = None;
            self.desired.lock().unwrap().active = false;
        }
    }
}

/// Exclusive handle to an open configuration transaction
///
/// Holds the configuration lock; dropping without committing discards
/// nothing (desired state writes are kept) but skips reconciliation.
pub struct ConfigurationTransaction<'a> {
    session: &'a PersistentSession,
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

impl ConfigurationTransaction<'_> {
    /// Reconcile the platform against the desired state
    pub async fn commit(self) -> CameraResult<()> {
        let result = self.session.configure().await;
        // unlock happens in Drop
        result
    }
}

impl Drop for ConfigurationTransaction<'_> {
    fn drop(&mut self) {
        self.session.inner.locked.store(false, Ordering::SeqCst);
    }
}
