// SPDX-License-Identifier: GPL-3.0-only

//! Audio/video recording pipeline
//!
//! Recording consumes the live sample stream of the active capture session
//! and muxes it into a container file:
//!
//! ```text
//! capture session ──► sample fan-out ──► VideoRecorder ──► ContainerWriter
//!                          │                  │
//!                          ▼                  ▼
//!                    frame consumer     torch override,
//!                                       audio session task
//! ```

pub(crate) mod audio;
pub mod clock;
pub mod options;
pub mod recorder;
pub mod settings;
pub mod torch;
pub mod writer;

pub use options::{FlashMode, RecordVideoOptions, VideoCodec, VideoFileType};
pub use recorder::{RecordingState, VideoFile, VideoRecorder};
pub use settings::{BitratePreset, resolve_video_settings};
pub use torch::TorchOverride;
pub use writer::{
    AudioTrackSettings, ContainerWriter, TrackKind, VideoTrackSettings, WriterError, WriterFactory,
};
