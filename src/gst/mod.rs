// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer-backed container writer
//!
//! Feeds the recording pipeline's sample buffers into a GStreamer encoding
//! pipeline and muxes them into a real container file:
//!
//! ```text
//! appsrc (video) ─► videoconvert ─► encoder ─► parser ─┐
//!                                                      ├─► muxer ─► filesink
//! appsrc (audio) ─► audioconvert ─► audioresample ─► aac ┘
//! ```

use crate::errors::{CameraError, CameraResult, RecordingError};
use crate::platform::types::Timestamp;
use crate::recording::writer::{
    AudioTrackSettings, ContainerWriter, TrackKind, VideoTrackSettings, WriterError, WriterFactory,
};
use crate::recording::{VideoCodec, VideoFileType};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How long finalize waits for the muxer to flush after EOS
const FINALIZE_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(10);

/// Allocates [`GstContainerWriter`] instances
pub struct GstWriterFactory;

impl GstWriterFactory {
    pub fn new() -> Result<Self, CameraError> {
        gst::init()
            .map_err(|e| RecordingError::CreateWriterFailed(format!("gst init failed: {}", e)))?;
        Ok(Self)
    }
}

impl WriterFactory for GstWriterFactory {
    fn create_writer(
        &self,
        path: PathBuf,
        file_type: VideoFileType,
    ) -> Result<Box<dyn ContainerWriter>, CameraError> {
        Ok(Box::new(GstContainerWriter::new(path, file_type)?))
    }
}

/// Writes sample buffers into a container file through GStreamer
pub struct GstContainerWriter {
    path: PathBuf,
    file_type: VideoFileType,
    video_settings: Option<VideoTrackSettings>,
    audio_settings: Option<AudioTrackSettings>,
    pipeline: Option<gst::Pipeline>,
    video_src: Option<gst_app::AppSrc>,
    audio_src: Option<gst_app::AppSrc>,
}

impl GstContainerWriter {
    fn new(path: PathBuf, file_type: VideoFileType) -> CameraResult<Self> {
        if file_type == VideoFileType::Avci {
            return Err(RecordingError::CreateWriterFailed(
                "AVC-I containers are not supported by the GStreamer writer".into(),
            )
            .into());
        }
        Ok(Self {
            path,
            file_type,
            video_settings: None,
            audio_settings: None,
            pipeline: None,
            video_src: None,
            audio_src: None,
        })
    }

    fn make_element(factory: &str) -> CameraResult<gst::Element> {
        gst::ElementFactory::make(factory)
            .build()
            .map_err(|e| {
                RecordingError::CreateWriterFailed(format!("failed to create {}: {}", factory, e))
                    .into()
            })
    }

    fn make_muxer(&self) -> CameraResult<gst::Element> {
        let factory = match self.file_type {
            VideoFileType::Mov => "qtmux",
            VideoFileType::Mp4 | VideoFileType::M4v => "mp4mux",
            VideoFileType::Avci => unreachable!("rejected in new()"),
        };
        let muxer = Self::make_element(factory)?;
        // Non-streamable output writes duration and indexes for seekable
        // playback.
        if muxer.has_property("streamable") {
            muxer.set_property("streamable", false);
        }
        Ok(muxer)
    }

    fn make_video_branch(
        &self,
        settings: &VideoTrackSettings,
    ) -> CameraResult<(gst_app::AppSrc, Vec<gst::Element>)> {
        let appsrc = Self::make_element("appsrc")?
            .dynamic_cast::<gst_app::AppSrc>()
            .map_err(|_| {
                CameraError::from(RecordingError::CreateWriterFailed(
                    "failed to cast to AppSrc".into(),
                ))
            })?;
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(true);

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", settings.pixel_format.as_str())
            .field("width", settings.width as i32)
            .field("height", settings.height as i32)
            .build();
        appsrc.set_caps(Some(&caps));

        let videoconvert = Self::make_element("videoconvert")?;

        let (encoder, parser) = match settings.codec {
            VideoCodec::H264 => {
                let encoder = Self::make_element("x264enc")?;
                // x264enc takes kbit/s
                encoder
                    .set_property_from_str("bitrate", &(settings.average_bit_rate / 1000).to_string());
                (encoder, Self::make_element("h264parse")?)
            }
            VideoCodec::Hevc => {
                let encoder = Self::make_element("x265enc")?;
                encoder
                    .set_property_from_str("bitrate", &(settings.average_bit_rate / 1000).to_string());
                (encoder, Self::make_element("h265parse")?)
            }
            other => {
                return Err(RecordingError::CreateWriterFailed(format!(
                    "codec {} is not encodable",
                    other
                ))
                .into());
            }
        };

        let elements = vec![
            appsrc.clone().upcast::<gst::Element>(),
            videoconvert,
            encoder,
            parser,
        ];
        Ok((appsrc, elements))
    }

    fn make_audio_branch(
        &self,
        settings: &AudioTrackSettings,
    ) -> CameraResult<(gst_app::AppSrc, Vec<gst::Element>)> {
        let appsrc = Self::make_element("appsrc")?
            .dynamic_cast::<gst_app::AppSrc>()
            .map_err(|_| {
                CameraError::from(RecordingError::CreateWriterFailed(
                    "failed to cast to AppSrc".into(),
                ))
            })?;
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(true);

        let caps = gst::Caps::builder("audio/x-raw")
            .field("format", "S16LE")
            .field("rate", settings.sample_rate as i32)
            .field("channels", settings.channels as i32)
            .field("layout", "interleaved")
            .build();
        appsrc.set_caps(Some(&caps));

        let convert = Self::make_element("audioconvert")?;
        let resample = Self::make_element("audioresample")?;

        // AAC encoders in preference order, first available wins
        let encoder = ["avenc_aac", "faac", "voaacenc"]
            .iter()
            .find_map(|name| gst::ElementFactory::make(name).build().ok())
            .ok_or_else(|| {
                CameraError::from(RecordingError::CreateWriterFailed(
                    "no AAC encoder available".into(),
                ))
            })?;
        encoder.set_property_from_str("bitrate", &settings.bit_rate.to_string());

        let elements = vec![
            appsrc.clone().upcast::<gst::Element>(),
            convert,
            resample,
            encoder,
        ];
        Ok((appsrc, elements))
    }

    fn link_chain(elements: &[gst::Element]) -> CameraResult<()> {
        for pair in elements.windows(2) {
            pair[0].link(&pair[1]).map_err(|_| {
                CameraError::from(RecordingError::CreateWriterFailed(format!(
                    "failed to link {} to {}",
                    pair[0].name(),
                    pair[1].name()
                )))
            })?;
        }
        Ok(())
    }

    fn appsrc_for(&self, track: TrackKind) -> Option<&gst_app::AppSrc> {
        match track {
            TrackKind::Video => self.video_src.as_ref(),
            TrackKind::Audio => self.audio_src.as_ref(),
        }
    }
}

impl ContainerWriter for GstContainerWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_video_track(&mut self, settings: &VideoTrackSettings) -> CameraResult<()> {
        if self.pipeline.is_some() {
            return Err(RecordingError::CreateWriterFailed(
                "tracks cannot be added after start".into(),
            )
            .into());
        }
        self.video_settings = Some(settings.clone());
        Ok(())
    }

    fn initialize_audio_track(&mut self, settings: &AudioTrackSettings) -> CameraResult<()> {
        if self.pipeline.is_some() {
            return Err(RecordingError::CreateWriterFailed(
                "tracks cannot be added after start".into(),
            )
            .into());
        }
        self.audio_settings = Some(settings.clone());
        Ok(())
    }

    fn start(&mut self) -> CameraResult<()> {
        let video_settings = self.video_settings.clone().ok_or_else(|| {
            CameraError::from(RecordingError::CreateWriterFailed(
                "no video track initialized".into(),
            ))
        })?;

        info!(
            path = %self.path.display(),
            codec = %video_settings.codec,
            audio = self.audio_settings.is_some(),
            "Starting GStreamer recording pipeline"
        );

        let pipeline = gst::Pipeline::new();
        let muxer = self.make_muxer()?;
        let filesink = Self::make_element("filesink")?;
        filesink.set_property("location", self.path.to_string_lossy().as_ref());

        pipeline.add_many([&muxer, &filesink]).map_err(|e| {
            CameraError::from(RecordingError::CreateWriterFailed(format!(
                "failed to add muxer: {}",
                e
            )))
        })?;
        muxer.link(&filesink).map_err(|_| {
            CameraError::from(RecordingError::CreateWriterFailed(
                "failed to link muxer to filesink".into(),
            ))
        })?;

        let (video_src, video_chain) = self.make_video_branch(&video_settings)?;
        pipeline.add_many(video_chain.iter()).map_err(|e| {
            CameraError::from(RecordingError::CreateWriterFailed(format!(
                "failed to add video branch: {}",
                e
            )))
        })?;
        Self::link_chain(&video_chain)?;
        video_chain
            .last()
            .expect("video chain is never empty")
            .link(&muxer)
            .map_err(|_| {
                CameraError::from(RecordingError::CreateWriterFailed(
                    "failed to link video branch to muxer".into(),
                ))
            })?;
        self.video_src = Some(video_src);

        if let Some(audio_settings) = self.audio_settings.clone() {
            let (audio_src, audio_chain) = self.make_audio_branch(&audio_settings)?;
            pipeline.add_many(audio_chain.iter()).map_err(|e| {
                CameraError::from(RecordingError::CreateWriterFailed(format!(
                    "failed to add audio branch: {}",
                    e
                )))
            })?;
            Self::link_chain(&audio_chain)?;
            audio_chain
                .last()
                .expect("audio chain is never empty")
                .link(&muxer)
                .map_err(|_| {
                    CameraError::from(RecordingError::CreateWriterFailed(
                        "failed to link audio branch to muxer".into(),
                    ))
                })?;
            self.audio_src = Some(audio_src);
        }

        pipeline.set_state(gst::State::Playing).map_err(|e| {
            CameraError::from(RecordingError::CreateWriterFailed(format!(
                "failed to start pipeline: {}",
                e
            )))
        })?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn append(
        &mut self,
        track: TrackKind,
        timestamp: Timestamp,
        data: &[u8],
    ) -> Result<(), WriterError> {
        let Some(appsrc) = self.appsrc_for(track) else {
            return Err(WriterError::Failed(format!(
                "no {:?} track in this container",
                track
            )));
        };

        let mut buffer = gst::Buffer::from_slice(data.to_vec());
        {
            let buffer = buffer.get_mut().ok_or_else(|| {
                WriterError::Failed("buffer is not writable".into())
            })?;
            buffer.set_pts(gst::ClockTime::from_nseconds(timestamp.as_nanos().max(0) as u64));
        }

        appsrc
            .push_buffer(buffer)
            .map_err(|e| WriterError::Failed(format!("push_buffer failed: {}", e)))?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), WriterError> {
        let Some(pipeline) = self.pipeline.take() else {
            return Err(WriterError::Failed("pipeline never started".into()));
        };

        debug!("Sending EOS to recording pipeline");
        if let Some(video_src) = self.video_src.take() {
            let _ = video_src.end_of_stream();
        }
        if let Some(audio_src) = self.audio_src.take() {
            let _ = audio_src.end_of_stream();
        }

        // Wait for the muxer to flush indexes and duration before tearing
        // the pipeline down.
        let result = match pipeline.bus() {
            Some(bus) => {
                match bus.timed_pop_filtered(
                    FINALIZE_TIMEOUT,
                    &[gst::MessageType::Eos, gst::MessageType::Error],
                ) {
                    Some(message) => match message.view() {
                        gst::MessageView::Error(error) => Err(WriterError::Failed(format!(
                            "pipeline error: {}",
                            error.error()
                        ))),
                        _ => Ok(()),
                    },
                    None => Err(WriterError::Failed("timed out waiting for EOS".into())),
                }
            }
            None => Err(WriterError::Failed("pipeline has no bus".into())),
        };

        if let Err(e) = pipeline.set_state(gst::State::Null) {
            warn!(error = %e, "Failed to stop recording pipeline");
        }

        result.map(|()| {
            info!(path = %self.path.display(), "Container finalized");
        })
    }
}

impl Drop for GstContainerWriter {
    fn drop(&mut self) {
        // A writer dropped without finalize still releases its pipeline
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gst::State::Null);
        }
    }
}
