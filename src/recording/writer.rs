// SPDX-License-Identifier: GPL-3.0-only

//! Container writer abstraction
//!
//! The recording pipeline appends interleaved sample buffers to a
//! [`ContainerWriter`], which owns the output file for the lifetime of one
//! recording. Concrete writers are provided by the GStreamer module (feature
//! `gstreamer`) and by the virtual platform for deterministic tests.

use crate::errors::CameraError;
use crate::platform::types::Timestamp;
use crate::recording::options::{VideoCodec, VideoFileType};
use std::path::{Path, PathBuf};

/// Which track of the container a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Resolved settings for the video track of a recording
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTrackSettings {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// FourCC pixel format of the incoming sample buffers
    pub pixel_format: String,
    /// Average bit rate in bits per second
    pub average_bit_rate: u64,
}

/// Resolved settings for the audio track of a recording
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrackSettings {
    pub sample_rate: u32,
    pub channels: u16,
    /// Average bit rate in bits per second
    pub bit_rate: u64,
}

impl Default for AudioTrackSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            bit_rate: 128_000,
        }
    }
}

/// Failure reported by a container writer
#[derive(Debug, Clone, PartialEq)]
pub enum WriterError {
    /// The writer was explicitly aborted
    Aborted,
    /// The writer failed with an unrecognized status
    Failed(String),
}

impl std::fmt::Display for WriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterError::Aborted => write!(f, "writer aborted"),
            WriterError::Failed(msg) => write!(f, "writer failed: {}", msg),
        }
    }
}

impl std::error::Error for WriterError {}

/// Writes interleaved audio/video samples into one container file
///
/// Lifecycle: initialize tracks, `start`, any number of `append` calls with
/// monotonically non-decreasing per-track timestamps, then exactly one
/// `finalize` which flushes and closes all tracks and the container.
pub trait ContainerWriter: Send {
    /// Path of the container file being written
    fn path(&self) -> &Path;

    /// Add the video track with the given resolved settings
    fn initialize_video_track(&mut self, settings: &VideoTrackSettings) -> Result<(), CameraError>;

    /// Add the audio track with the given resolved settings
    fn initialize_audio_track(&mut self, settings: &AudioTrackSettings) -> Result<(), CameraError>;

    /// Begin the container; tracks can no longer be added afterwards
    fn start(&mut self) -> Result<(), CameraError>;

    /// Append one sample to a track. Timestamps are in the session clock
    /// domain by the time they reach the writer.
    fn append(
        &mut self,
        track: TrackKind,
        timestamp: Timestamp,
        data: &[u8],
    ) -> Result<(), WriterError>;

    /// Flush and close all tracks and the container
    fn finalize(&mut self) -> Result<(), WriterError>;
}

/// Allocates container writers for the recording pipeline
pub trait WriterFactory: Send + Sync {
    fn create_writer(
        &self,
        path: PathBuf,
        file_type: VideoFileType,
    ) -> Result<Box<dyn ContainerWriter>, CameraError>;
}
