// SPDX-License-Identifier: GPL-3.0-only

//! Shared helpers for integration tests
#![allow(dead_code)]

use camera_core::errors::CameraResult;
use camera_core::platform::virtual_device::{
    VirtualWriterFactory, default_device_details,
};
use camera_core::platform::{VirtualPlatform, VirtualPlatformHandle};
use camera_core::recording::WriterFactory;
use camera_core::session::{CameraController, Output, OutputKind, RepeatingRequest};
use std::sync::Arc;
use std::time::Duration;

/// Controller wired to a scripted platform and virtual writers
pub struct TestRig {
    pub controller: Arc<CameraController>,
    pub platform: VirtualPlatformHandle,
    pub writers: Arc<VirtualWriterFactory>,
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn rig() -> TestRig {
    init_tracing();
    let platform = Arc::new(VirtualPlatform::new());
    let handle = platform.handle();
    handle.add_device(default_device_details("back-wide"));

    let writers = Arc::new(VirtualWriterFactory::new());
    let writers_factory: Arc<dyn WriterFactory> = Arc::clone(&writers) as Arc<dyn WriterFactory>;
    let controller = Arc::new(CameraController::new(platform, writers_factory));

    TestRig {
        controller,
        platform: handle,
        writers,
    }
}

pub fn video_output() -> Output {
    Output::new("video-1", OutputKind::Video, 1920, 1080)
}

pub fn preview_output() -> Output {
    Output::new("preview-1", OutputKind::Preview, 1280, 720)
}

/// Configure the controller with one device, the given outputs and an
/// installed repeating request, then activate it
pub async fn configure_active(
    controller: &CameraController,
    camera_id: &str,
    outputs: Vec<Output>,
) -> CameraResult<()> {
    controller
        .configure(|session| {
            session.set_input(camera_id)?;
            session.set_outputs(outputs)?;
            session.set_repeating_request(RepeatingRequest::default())?;
            session.set_active(true)
        })
        .await
}

/// Let spawned tasks (sample fan-out, closure callbacks) run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}
