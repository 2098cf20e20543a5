// SPDX-License-Identifier: GPL-3.0-only

//! Precapture convergence protocol
//!
//! Installs a trigger request as the session's repeating request, then
//! observes capture results until every requested metering system reaches a
//! terminal state. Whatever the outcome, the session's prior repeating
//! request is reinstalled so normal streaming resumes.

use crate::errors::{CameraResult, CaptureError, SessionError};
use crate::platform::types::{CaptureEvent, ExposureState, FocusState, WhiteBalanceState};
use crate::session::handles::SessionHandle;
use crate::session::transaction::PersistentSession;
use crate::session::types::PreparedRequest;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// Convergence is abandoned if not reached within this window
const PRECAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which metering systems a precapture waits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecaptureTrigger {
    /// Auto-exposure
    Ae,
    /// Autofocus
    Af,
    /// Auto-white-balance
    Awb,
}

/// Final per-system metering states after a successful precapture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecaptureResult {
    pub focus: FocusState,
    pub exposure: ExposureState,
    pub white_balance: WhiteBalanceState,
}

/// Per-trigger completion bookkeeping
#[derive(Default)]
struct Progress {
    ae_done: bool,
    af_done: bool,
    awb_done: bool,
}

impl Progress {
    fn update(&mut self, triggers: &[PrecaptureTrigger], result: &PrecaptureResult) {
        if triggers.contains(&PrecaptureTrigger::Af) && !self.af_done {
            if result.focus.is_completed() {
                self.af_done = true;
                info!(state = ?result.focus, "AF precapture completed");
            } else {
                debug!(state = ?result.focus, "AF state");
            }
        }
        if triggers.contains(&PrecaptureTrigger::Ae) && !self.ae_done {
            if result.exposure.is_completed() {
                self.ae_done = true;
                info!(state = ?result.exposure, "AE precapture completed");
            } else {
                debug!(state = ?result.exposure, "AE state");
            }
        }
        if triggers.contains(&PrecaptureTrigger::Awb) && !self.awb_done {
            if result.white_balance.is_completed() {
                self.awb_done = true;
                info!(state = ?result.white_balance, "AWB precapture completed");
            } else {
                debug!(state = ?result.white_balance, "AWB state");
            }
        }
    }

    fn all_done(&self, triggers: &[PrecaptureTrigger]) -> bool {
        (!triggers.contains(&PrecaptureTrigger::Ae) || self.ae_done)
            && (!triggers.contains(&PrecaptureTrigger::Af) || self.af_done)
            && (!triggers.contains(&PrecaptureTrigger::Awb) || self.awb_done)
    }
}

/// Clears the session's single-precapture slot on every exit path
struct PrecaptureSlot<'a>(&'a SessionHandle);

impl Drop for PrecaptureSlot<'_> {
    fn drop(&mut self) {
        self.0.end_precapture();
    }
}

/// Install `request` as the repeating request and wait until all requested
/// metering systems converge
///
/// Fails with [`CaptureError::TimedOut`] after five seconds and with
/// [`CaptureError::Aborted`] if the platform reports capture failure. The
/// prior repeating request (`restore`) is reinstalled on every terminal
/// outcome. Only one wait may be outstanding per session.
pub(crate) async fn wait_for_convergence(
    session: &PersistentSession,
    handle: &SessionHandle,
    request: &PreparedRequest,
    restore: &PreparedRequest,
    triggers: &[PrecaptureTrigger],
    setup_guard: tokio::sync::MutexGuard<'_, ()>,
) -> CameraResult<PrecaptureResult> {
    if !handle.try_begin_precapture() {
        return Err(CaptureError::AlreadyRunning.into());
    }
    let _slot = PrecaptureSlot(handle);

    // Subscribe before installing so the first result cannot be missed
    let mut events = handle.platform_session().capture_events();
    session.install_request_now(handle, request)?;
    // The configuration lock only covers validation and the trigger install;
    // holding it through a five-second wait would block every other caller.
    drop(setup_guard);
    debug!(triggers = ?triggers, "Waiting for precapture convergence...");

    let deadline = tokio::time::Instant::now() + PRECAPTURE_TIMEOUT;
    let mut progress = Progress::default();

    let outcome = loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_) => {
                error!("Precapture timed out after 5 seconds!");
                break Err(CaptureError::TimedOut.into());
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                debug!(skipped, "Capture result stream lagged");
            }
            Ok(Err(RecvError::Closed)) => {
                break Err(SessionError::Destroyed.into());
            }
            Ok(Ok(CaptureEvent::Failed { image_captured })) => {
                break Err(CaptureError::Aborted { image_captured }.into());
            }
            Ok(Ok(CaptureEvent::Completed(metadata))) => {
                let result = PrecaptureResult {
                    focus: metadata.focus_state,
                    exposure: metadata.exposure_state,
                    white_balance: metadata.white_balance_state,
                };
                progress.update(triggers, &result);
                if progress.all_done(triggers) {
                    break Ok(result);
                }
            }
        }
    };

    // Hand the stream back to normal streaming no matter how we finished
    if let Err(error) = session.install_request_now(handle, restore) {
        // session might have already been closed
        warn!(error = %error, "Error resetting session repeating request");
    }

    outcome
}
