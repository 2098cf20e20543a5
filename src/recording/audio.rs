// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated audio-session task
//!
//! Audio activation can take long enough to drop frames, so it runs on its
//! own task decoupled from the capture path; the recording pipeline only
//! enqueues commands.

use crate::platform::CameraPlatform;
use crate::session::CameraEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub(crate) enum AudioCommand {
    Activate,
    Deactivate,
}

/// Handle to the audio-session task
pub(crate) struct AudioQueue {
    tx: mpsc::UnboundedSender<AudioCommand>,
}

impl AudioQueue {
    pub(crate) fn spawn(
        platform: Arc<dyn CameraPlatform>,
        events: mpsc::UnboundedSender<CameraEvent>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            debug!("Audio session task started");
            while let Some(command) = rx.recv().await {
                match command {
                    AudioCommand::Activate => {
                        debug!("Activating audio session...");
                        if let Err(error) = platform.activate_audio_session().await {
                            warn!(error = %error, "Failed to activate audio session");
                            let _ = events.send(CameraEvent::Error(error));
                        }
                    }
                    AudioCommand::Deactivate => {
                        debug!("Deactivating audio session...");
                        platform.deactivate_audio_session().await;
                    }
                }
            }
            debug!("Audio session task ended");
        });
        Self { tx }
    }

    pub(crate) fn activate(&self) {
        let _ = self.tx.send(AudioCommand::Activate);
    }

    pub(crate) fn deactivate(&self) {
        let _ = self.tx.send(AudioCommand::Deactivate);
    }
}
