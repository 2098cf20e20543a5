// SPDX-License-Identifier: GPL-3.0-only

//! Video recording pipeline
//!
//! Consumes the live sample stream of an active capture session and muxes
//! it into a container file through a [`ContainerWriter`]. Pause and resume
//! never touch the writer; paused samples are dropped, not buffered, so the
//! output container stays well-formed.

use crate::errors::{CameraError, CaptureError, CameraResult, RecordingError};
use crate::platform::SessionClocks;
use crate::platform::types::{MediaKind, SampleBuffer, Timestamp};
use crate::recording::writer::{ContainerWriter, TrackKind, WriterError};
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// No recording exists
    Idle,
    /// Writer allocated, tracks initialized, not yet accepting samples
    Starting,
    /// Samples are being appended
    Recording,
    /// Samples are dropped until resume
    Paused,
    /// Writer is being finalized
    Finishing,
    /// Finalized successfully and reported
    Finished,
    /// A writer error ended the recording
    Failed,
}

/// A finished recording on disk
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFile {
    pub path: PathBuf,
    /// Span of the appended sample timestamps, in seconds
    pub duration_seconds: f64,
}

/// One in-progress recording
pub struct VideoRecorder {
    state: RecordingState,
    writer: Option<Box<dyn ContainerWriter>>,
    path: PathBuf,
    audio_enabled: bool,
    has_audio_track: bool,
    flash_override: bool,
    first_timestamp: Option<Timestamp>,
    last_timestamp: Option<Timestamp>,
    video_samples: u64,
    audio_samples: u64,
    failure: Option<WriterError>,
}

impl VideoRecorder {
    pub(crate) fn new(
        writer: Box<dyn ContainerWriter>,
        path: PathBuf,
        audio_enabled: bool,
        has_audio_track: bool,
        flash_override: bool,
    ) -> Self {
        Self {
            state: RecordingState::Starting,
            writer: Some(writer),
            path,
            audio_enabled,
            has_audio_track,
            flash_override,
            first_timestamp: None,
            last_timestamp: None,
            video_samples: 0,
            audio_samples: 0,
            failure: None,
        }
    }

    pub(crate) fn mark_recording(&mut self) {
        self.state = RecordingState::Recording;
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub(crate) fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub(crate) fn has_flash_override(&self) -> bool {
        self.flash_override
    }

    /// Stop appending samples without touching the writer
    pub(crate) fn pause(&mut self) -> CameraResult<()> {
        match self.state {
            RecordingState::Starting | RecordingState::Recording | RecordingState::Paused => {
                debug!("Recording paused");
                self.state = RecordingState::Paused;
                Ok(())
            }
            _ => Err(RecordingError::NoActiveRecording.into()),
        }
    }

    /// Resume appending samples
    pub(crate) fn resume(&mut self) -> CameraResult<()> {
        match self.state {
            RecordingState::Starting | RecordingState::Recording | RecordingState::Paused => {
                debug!("Recording resumed");
                self.state = RecordingState::Recording;
                Ok(())
            }
            _ => Err(RecordingError::NoActiveRecording.into()),
        }
    }

    /// Append one sample from the capture stream
    ///
    /// Samples are dropped unless the state is Recording. Audio timestamps
    /// are translated into the session clock domain so both tracks share one
    /// monotonic timeline.
    pub(crate) fn append(&mut self, sample: SampleBuffer, clocks: &SessionClocks) {
        if self.state != RecordingState::Recording {
            trace!(kind = ?sample.kind, state = ?self.state, "Dropping sample");
            return;
        }

        let (track, timestamp) = match sample.kind {
            MediaKind::Video => (TrackKind::Video, sample.timestamp),
            MediaKind::Audio => {
                if !self.has_audio_track {
                    return;
                }
                (TrackKind::Audio, clocks.audio_to_session(sample.timestamp))
            }
        };

        let Some(writer) = self.writer.as_mut() else {
            warn!("Sample arrived with no writer allocated");
            return;
        };

        match writer.append(track, timestamp, &sample.data) {
            Ok(()) => {
                if self.first_timestamp.is_none_or(|first| timestamp < first) {
                    self.first_timestamp = Some(timestamp);
                }
                if self.last_timestamp.is_none_or(|last| timestamp > last) {
                    self.last_timestamp = Some(timestamp);
                }
                match track {
                    TrackKind::Video => self.video_samples += 1,
                    TrackKind::Audio => self.audio_samples += 1,
                }
            }
            Err(error) => {
                warn!(error = %error, "Writer rejected sample, failing recording");
                self.state = RecordingState::Failed;
                self.failure = Some(error);
            }
        }
    }

    /// Finalize the writer and report the outcome
    pub(crate) async fn finish(mut self) -> CameraResult<VideoFile> {
        if self.state == RecordingState::Failed {
            let failure = self
                .failure
                .take()
                .unwrap_or(WriterError::Failed("unknown".into()));
            return Err(map_writer_error(failure));
        }

        self.state = RecordingState::Finishing;
        info!(
            video_samples = self.video_samples,
            audio_samples = self.audio_samples,
            "Finishing recording"
        );

        let Some(mut writer) = self.writer.take() else {
            return Err(RecordingError::WriterFailedWithUnknownStatus(
                "writer already finalized".into(),
            )
            .into());
        };

        // Finalizing flushes tracks and the container; keep it off the
        // async executor.
        let finalize_result = tokio::task::spawn_blocking(move || writer.finalize())
            .await
            .map_err(|e| {
                CameraError::from(RecordingError::WriterFailedWithUnknownStatus(format!(
                    "writer task panicked: {}",
                    e
                )))
            })?;
        finalize_result.map_err(map_writer_error)?;

        self.state = RecordingState::Finished;
        let duration_seconds = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last.saturating_since(first).as_secs_f64(),
            _ => 0.0,
        };

        info!(
            path = %self.path.display(),
            duration_seconds,
            "Recording saved"
        );
        Ok(VideoFile {
            path: self.path,
            duration_seconds,
        })
    }
}

fn map_writer_error(error: WriterError) -> CameraError {
    match error {
        WriterError::Aborted => CaptureError::Aborted {
            image_captured: false,
        }
        .into(),
        WriterError::Failed(message) => {
            RecordingError::WriterFailedWithUnknownStatus(message).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::{ClockDomain, MediaClock};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingWriter {
        video: Arc<Mutex<Vec<Timestamp>>>,
        audio: Arc<Mutex<Vec<Timestamp>>>,
        finalized: Arc<Mutex<bool>>,
        path: PathBuf,
    }

    impl ContainerWriter for CountingWriter {
        fn path(&self) -> &Path {
            &self.path
        }

        fn initialize_video_track(
            &mut self,
            _settings: &crate::recording::writer::VideoTrackSettings,
        ) -> CameraResult<()> {
            Ok(())
        }

        fn initialize_audio_track(
            &mut self,
            _settings: &crate::recording::writer::AudioTrackSettings,
        ) -> CameraResult<()> {
            Ok(())
        }

        fn start(&mut self) -> CameraResult<()> {
            Ok(())
        }

        fn append(
            &mut self,
            track: TrackKind,
            timestamp: Timestamp,
            _data: &[u8],
        ) -> Result<(), WriterError> {
            match track {
                TrackKind::Video => self.video.lock().unwrap().push(timestamp),
                TrackKind::Audio => self.audio.lock().unwrap().push(timestamp),
            }
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), WriterError> {
            *self.finalized.lock().unwrap() = true;
            Ok(())
        }
    }

    fn clocks() -> SessionClocks {
        SessionClocks {
            session: MediaClock::new(ClockDomain::Session, 0),
            audio: MediaClock::new(ClockDomain::Audio, 0),
        }
    }

    fn video_sample(ms: i64) -> SampleBuffer {
        SampleBuffer::new(MediaKind::Video, Timestamp::from_millis(ms), vec![0u8; 4])
    }

    #[tokio::test]
    async fn test_paused_samples_are_dropped_not_buffered() {
        let writer = CountingWriter::default();
        let video = writer.video.clone();

        let mut recorder =
            VideoRecorder::new(Box::new(writer), PathBuf::from("/tmp/x.mov"), false, false, false);
        recorder.mark_recording();

        recorder.append(video_sample(0), &clocks());
        recorder.pause().unwrap();
        recorder.append(video_sample(33), &clocks());
        recorder.append(video_sample(66), &clocks());
        recorder.resume().unwrap();
        recorder.append(video_sample(99), &clocks());

        assert_eq!(video.lock().unwrap().len(), 2);
        let file = recorder.finish().await.unwrap();
        // span covers first to last appended sample, pause gap included
        assert!((file.duration_seconds - 0.099).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_audio_without_track_is_ignored() {
        let writer = CountingWriter::default();
        let audio = writer.audio.clone();

        let mut recorder =
            VideoRecorder::new(Box::new(writer), PathBuf::from("/tmp/x.mov"), true, false, false);
        recorder.mark_recording();
        recorder.append(
            SampleBuffer::new(MediaKind::Audio, Timestamp::from_millis(5), vec![0u8; 4]),
            &clocks(),
        );
        assert!(audio.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audio_timestamps_are_translated() {
        let writer = CountingWriter::default();
        let audio = writer.audio.clone();

        let mut recorder =
            VideoRecorder::new(Box::new(writer), PathBuf::from("/tmp/x.mov"), true, true, false);
        recorder.mark_recording();

        let skewed = SessionClocks {
            session: MediaClock::new(ClockDomain::Session, 0),
            audio: MediaClock::new(ClockDomain::Audio, 25_000_000),
        };
        recorder.append(
            SampleBuffer::new(MediaKind::Audio, Timestamp::from_millis(100), vec![0u8; 4]),
            &skewed,
        );
        assert_eq!(audio.lock().unwrap()[0], Timestamp::from_millis(125));
    }

    #[tokio::test]
    async fn test_failed_recording_reports_writer_error() {
        struct RejectingWriter {
            path: PathBuf,
        }
        impl ContainerWriter for RejectingWriter {
            fn path(&self) -> &Path {
                &self.path
            }
            fn initialize_video_track(
                &mut self,
                _s: &crate::recording::writer::VideoTrackSettings,
            ) -> CameraResult<()> {
                Ok(())
            }
            fn initialize_audio_track(
                &mut self,
                _s: &crate::recording::writer::AudioTrackSettings,
            ) -> CameraResult<()> {
                Ok(())
            }
            fn start(&mut self) -> CameraResult<()> {
                Ok(())
            }
            fn append(
                &mut self,
                _t: TrackKind,
                _ts: Timestamp,
                _d: &[u8],
            ) -> Result<(), WriterError> {
                Err(WriterError::Failed("disk full".into()))
            }
            fn finalize(&mut self) -> Result<(), WriterError> {
                Ok(())
            }
        }

        let mut recorder = VideoRecorder::new(
            Box::new(RejectingWriter { path: PathBuf::from("/tmp/x.mov") }),
            PathBuf::from("/tmp/x.mov"),
            false,
            false,
            false,
        );
        recorder.mark_recording();
        recorder.append(video_sample(0), &clocks());
        assert_eq!(recorder.state(), RecordingState::Failed);
        assert!(recorder.pause().is_err());

        let err = recorder.finish().await.unwrap_err();
        assert_eq!(err.code(), "recording/writer-unknown-status");
    }
}
