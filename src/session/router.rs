// SPDX-License-Identifier: GPL-3.0-only

//! Sample fan-out from the capture session
//!
//! One task per live session consumes the platform's sample stream and fans
//! each buffer out to the frame consumer (if installed) and the active
//! recording (if any). The task ends when the platform drops the sample
//! sender, so a destroyed session cleans up its own fan-out.

use crate::platform::SessionClocks;
use crate::platform::types::{MediaKind, SampleBuffer};
use crate::recording::VideoRecorder;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Shared frame-consumer sender, written by the host and read by the
/// fan-out task independent of which session is live.
type SharedFrameSender = StdMutex<Option<mpsc::Sender<SampleBuffer>>>;

pub(crate) struct SampleRouter {
    recorder: Arc<StdMutex<Option<VideoRecorder>>>,
    frame_sink: SharedFrameSender,
}

impl SampleRouter {
    pub(crate) fn new(recorder: Arc<StdMutex<Option<VideoRecorder>>>) -> Self {
        Self {
            recorder,
            frame_sink: StdMutex::new(None),
        }
    }

    /// Install (or clear) the frame consumer for video samples
    pub(crate) fn set_frame_sink(&self, sink: Option<mpsc::Sender<SampleBuffer>>) {
        *self.frame_sink.lock().unwrap() = sink;
    }

    /// Spawn the fan-out task for a freshly created session
    pub(crate) fn attach(
        self: &Arc<Self>,
        mut samples: mpsc::Receiver<SampleBuffer>,
        clocks: SessionClocks,
    ) {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            debug!("Sample fan-out task started");
            while let Some(sample) = samples.recv().await {
                router.dispatch(sample, &clocks);
            }
            debug!("Sample fan-out task ended");
        });
    }

    fn dispatch(&self, sample: SampleBuffer, clocks: &SessionClocks) {
        if sample.kind == MediaKind::Video
            && let Some(sink) = self.frame_sink.lock().unwrap().as_ref()
        {
            // Frame consumers run at their own pace; a full queue drops the
            // frame rather than stalling recording.
            let _ = sink.try_send(sample.clone());
        }

        if let Some(recorder) = self.recorder.lock().unwrap().as_mut() {
            recorder.append(sample, clocks);
        }
    }
}
