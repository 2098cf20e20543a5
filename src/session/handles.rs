// SPDX-License-Identifier: GPL-3.0-only

//! Validity-tracked wrappers for the platform device and capture session
//!
//! Both handles can be invalidated out-of-band by the platform's closure
//! callbacks; every holder must check validity before acting. Generations
//! distinguish "the handle I opened" from "whatever is current now" so a
//! late closure callback for a replaced handle cannot clobber its successor.

use crate::platform::{PlatformDevice, PlatformSession};
use crate::session::types::Output;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One open physical capture device
#[derive(Clone)]
pub struct DeviceHandle {
    device: Arc<dyn PlatformDevice>,
    generation: u64,
    valid: Arc<AtomicBool>,
}

impl DeviceHandle {
    pub(crate) fn new(device: Arc<dyn PlatformDevice>, generation: u64) -> Self {
        Self {
            device,
            generation,
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        self.device.id()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub(crate) fn platform_device(&self) -> &Arc<dyn PlatformDevice> {
        &self.device
    }

    /// Close the underlying device. The closure callback fires asynchronously.
    pub(crate) fn close(&self) {
        self.invalidate();
        self.device.close();
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id())
            .field("generation", &self.generation)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// One active capture session bound to a device and output set
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<dyn PlatformSession>,
    device_generation: u64,
    generation: u64,
    outputs: Vec<Output>,
    valid: Arc<AtomicBool>,
    precapture_active: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new(
        session: Arc<dyn PlatformSession>,
        device_generation: u64,
        generation: u64,
        outputs: Vec<Output>,
    ) -> Self {
        Self {
            session,
            device_generation,
            generation,
            outputs,
            valid: Arc::new(AtomicBool::new(true)),
            precapture_active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Generation of the device this session is bound to
    pub(crate) fn device_generation(&self) -> u64 {
        self.device_generation
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub(crate) fn platform_session(&self) -> &Arc<dyn PlatformSession> {
        &self.session
    }

    /// Abort in-flight captures, tolerating an already-closed session
    pub(crate) fn try_abort_captures(&self) {
        self.session.abort_captures();
    }

    /// Claim the single outstanding precapture slot for this session.
    /// Returns false if another wait is already running.
    pub(crate) fn try_begin_precapture(&self) -> bool {
        self.precapture_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn end_precapture(&self) {
        self.precapture_active.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("generation", &self.generation)
            .field("device_generation", &self.device_generation)
            .field("outputs", &self.outputs.len())
            .field("valid", &self.is_valid())
            .finish()
    }
}
