// SPDX-License-Identifier: GPL-3.0-only

//! Torch override bookkeeping for recordings
//!
//! `flash` on a video recording is implemented by forcing the torch on for
//! the duration of the recording. The override must be undone exactly once
//! when the recording fully finishes, regardless of how it ended.

use crate::errors::CameraError;
use crate::platform::PlatformDevice;
use crate::session::types::TorchMode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Records the torch mode in effect before a recording and restores it once
/// the recording is over
#[derive(Default)]
pub struct TorchOverride {
    previous: Option<TorchMode>,
}

impl TorchOverride {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Apply `mode` for the duration of a recording, remembering the current
    /// mode for restoration. A second apply without an intervening restore
    /// keeps the originally saved mode.
    pub fn apply(
        &mut self,
        device: &Arc<dyn PlatformDevice>,
        mode: TorchMode,
    ) -> Result<(), CameraError> {
        if self.previous.is_none() {
            self.previous = Some(device.torch_mode());
        }
        debug!(mode = %mode, "Overriding torch for recording");
        device.set_torch_mode(mode)
    }

    /// Restore the saved torch mode. Idempotent: only the first call after
    /// an apply does anything.
    pub fn restore(&mut self, device: &Arc<dyn PlatformDevice>) {
        if let Some(previous) = self.previous.take() {
            debug!(mode = %previous, "Restoring torch after recording");
            if let Err(error) = device.set_torch_mode(previous) {
                warn!(error = %error, "Failed to restore torch mode");
            }
        }
    }

    /// Whether an override is currently in effect
    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }
}
