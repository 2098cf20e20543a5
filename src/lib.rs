// SPDX-License-Identifier: GPL-3.0-only

//! camera-core - a persistent camera capture-session controller
//!
//! This library owns the lifecycle of one physical capture device, the
//! capture session bound to it, the precapture (focus/exposure/white-balance
//! convergence) protocol, and the audio/video recording pipeline that muxes
//! live sample buffers into a container file.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: The controller, persistent session and configuration
//!   transactions
//! - [`platform`]: Trait seam to the concrete capture stack, plus the
//!   scriptable virtual platform
//! - [`recording`]: Recording pipeline, container writer seam, torch and
//!   clock handling
//! - [`orientation`]: Interface orientation and focus-point geometry
//! - [`errors`]: Error taxonomy shared across the crate
//!
//! # Example
//!
//! ```no_run
//! use camera_core::platform::{VirtualPlatform, virtual_device::VirtualWriterFactory};
//! use camera_core::session::{CameraController, Output, OutputKind, RepeatingRequest};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), camera_core::errors::CameraError> {
//! let platform = Arc::new(VirtualPlatform::with_default_device());
//! let controller = CameraController::new(platform, Arc::new(VirtualWriterFactory::new()));
//!
//! controller
//!     .configure(|session| {
//!         session.set_input("back-wide")?;
//!         session.set_outputs(vec![Output::new("preview-1", OutputKind::Video, 1920, 1080)])?;
//!         session.set_repeating_request(RepeatingRequest::default())?;
//!         session.set_active(true)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod orientation;
pub mod platform;
pub mod recording;
pub mod session;
pub mod storage;

#[cfg(feature = "gstreamer")]
pub mod gst;

// Re-export commonly used types
pub use errors::{CameraError, CameraResult};
pub use orientation::{Orientation, Point};
pub use recording::{RecordVideoOptions, RecordingState, VideoFile};
pub use session::{CameraController, CameraEvent, Output, OutputKind, RepeatingRequest};
