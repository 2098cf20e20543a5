// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the recording pipeline

mod common;

use camera_core::platform::types::Timestamp;
use camera_core::recording::{FlashMode, RecordVideoOptions, RecordingState, VideoCodec};
use camera_core::session::TorchMode;
use common::{configure_active, preview_output, rig, settle, video_output};

fn ms(millis: i64) -> Timestamp {
    Timestamp::from_millis(millis)
}

async fn push_pair(rig: &common::TestRig, millis: i64) {
    rig.platform.push_video_sample(ms(millis)).await;
    rig.platform.push_audio_sample(ms(millis)).await;
}

#[tokio::test]
async fn test_pause_drops_samples_and_duration_spans_appended_only() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    rig.controller
        .start_recording(RecordVideoOptions {
            audio_enabled: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rig.controller.recording_state(), RecordingState::Recording);

    // 10 video + 10 audio samples while recording
    for i in 0..10 {
        push_pair(&rig, i * 100).await;
    }
    settle().await;

    rig.controller.pause_recording().await.unwrap();
    assert_eq!(rig.controller.recording_state(), RecordingState::Paused);

    // 5 more of each while paused: dropped, not buffered
    for i in 10..15 {
        push_pair(&rig, i * 100).await;
    }
    settle().await;

    rig.controller.resume_recording().await.unwrap();
    assert_eq!(rig.controller.recording_state(), RecordingState::Recording);

    // 5 more of each after resume: appended
    for i in 15..20 {
        push_pair(&rig, i * 100).await;
    }
    settle().await;

    let video = rig.controller.stop_recording().await.unwrap();

    let media = rig.writers.last_recording().unwrap();
    let media = media.lock().unwrap();
    assert_eq!(media.video_timestamps.len(), 15);
    assert_eq!(media.audio_timestamps.len(), 15);
    assert!(media.started);
    assert!(media.finalized);

    // duration is the span of appended timestamps (0ms .. 1900ms); the
    // pause gap lies inside the span and is not subtracted
    assert!((video.duration_seconds - 1.9).abs() < 1e-9);
    assert_eq!(video.path, media.path);
    assert_eq!(rig.controller.recording_state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_audio_timestamps_are_translated_into_session_domain() {
    let rig = rig();
    rig.platform.set_audio_clock_offset_ms(40);
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    rig.controller
        .start_recording(RecordVideoOptions {
            audio_enabled: true,
            ..Default::default()
        })
        .await
        .unwrap();

    rig.platform.push_video_sample(ms(100)).await;
    rig.platform.push_audio_sample(ms(100)).await;
    settle().await;
    rig.controller.stop_recording().await.unwrap();

    let media = rig.writers.last_recording().unwrap();
    let media = media.lock().unwrap();
    assert_eq!(media.video_timestamps[0], ms(100));
    // audio clock is 40ms ahead of the session clock
    assert_eq!(media.audio_timestamps[0], ms(140));
}

#[tokio::test]
async fn test_pause_resume_stop_without_recording_fail() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    assert_eq!(rig.controller.recording_state(), RecordingState::Idle);
    let err = rig.controller.pause_recording().await.unwrap_err();
    assert_eq!(err.code(), "recording/no-active-recording");
    let err = rig.controller.resume_recording().await.unwrap_err();
    assert_eq!(err.code(), "recording/no-active-recording");
    let err = rig.controller.stop_recording().await.unwrap_err();
    assert_eq!(err.code(), "recording/no-active-recording");
}

#[tokio::test]
async fn test_start_while_recording_fails() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    rig.controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap();
    let err = rig
        .controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "recording/already-recording");

    // still recording after the rejected start
    assert_eq!(rig.controller.recording_state(), RecordingState::Recording);
    rig.controller.stop_recording().await.unwrap();

    // paused recordings reject a new start the same way
    rig.controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap();
    rig.controller.pause_recording().await.unwrap();
    let err = rig
        .controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "recording/already-recording");
    rig.controller.stop_recording().await.unwrap();
}

#[tokio::test]
async fn test_torch_restored_after_flash_recording() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();
    assert_eq!(rig.platform.device_torch_mode(), Some(TorchMode::Off));

    rig.controller
        .start_recording(RecordVideoOptions {
            flash: Some(FlashMode::On),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rig.platform.device_torch_mode(), Some(TorchMode::On));

    rig.platform.push_video_sample(ms(0)).await;
    settle().await;
    rig.controller.stop_recording().await.unwrap();

    // torch is back to what it was before start_recording
    assert_eq!(rig.platform.device_torch_mode(), Some(TorchMode::Off));
}

#[tokio::test]
async fn test_video_not_enabled_without_video_output() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![preview_output()])
        .await
        .unwrap();

    let err = rig
        .controller
        .start_recording(RecordVideoOptions {
            flash: Some(FlashMode::On),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "capture/video-not-enabled");

    // the failed start did not leak the torch override
    assert_eq!(rig.platform.device_torch_mode(), Some(TorchMode::Off));
    assert_eq!(rig.controller.recording_state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_start_requires_running_session() {
    let rig = rig();

    let err = rig
        .controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "session/not-ready");

    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();
    rig.controller
        .configure(|session| session.set_active(false))
        .await
        .unwrap();

    let err = rig
        .controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "session/not-ready");
}

#[tokio::test]
async fn test_audio_session_follows_recording_lifecycle() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    rig.controller
        .start_recording(RecordVideoOptions {
            audio_enabled: true,
            ..Default::default()
        })
        .await
        .unwrap();
    settle().await;
    assert!(rig.platform.audio_session_active());
    assert_eq!(rig.platform.audio_activation_count(), 1);

    rig.controller.stop_recording().await.unwrap();
    settle().await;
    assert!(!rig.platform.audio_session_active());
}

#[tokio::test]
async fn test_audio_disabled_recording_never_touches_audio_session() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    rig.controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap();
    rig.platform.push_audio_sample(ms(0)).await;
    rig.platform.push_video_sample(ms(0)).await;
    settle().await;
    rig.controller.stop_recording().await.unwrap();
    settle().await;

    assert_eq!(rig.platform.audio_activation_count(), 0);
    let media = rig.writers.last_recording().unwrap();
    let media = media.lock().unwrap();
    // no audio track was initialized, so the audio sample was ignored
    assert!(media.audio_settings.is_none());
    assert!(media.audio_timestamps.is_empty());
    assert_eq!(media.video_timestamps.len(), 1);
}

#[tokio::test]
async fn test_unsupported_codec_is_rejected_before_any_file() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    let err = rig
        .controller
        .start_recording(RecordVideoOptions {
            video_codec: Some(VideoCodec::ProRes4444),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "parameter/unsupported-on-os");
    assert!(rig.writers.last_recording().is_none());
}

#[tokio::test]
async fn test_writer_allocation_failure_fails_fast() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();
    rig.writers.fail_next_create("no writer for you");

    let err = rig
        .controller
        .start_recording(RecordVideoOptions {
            flash: Some(FlashMode::On),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "recording/create-writer-failed");
    assert_eq!(rig.controller.recording_state(), RecordingState::Idle);
    // torch override rolled back on the failed start
    assert_eq!(rig.platform.device_torch_mode(), Some(TorchMode::Off));
}

#[tokio::test]
async fn test_finalize_abort_maps_to_capture_aborted() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();
    rig.writers.abort_on_finalize();

    rig.controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap();
    rig.platform.push_video_sample(ms(0)).await;
    settle().await;

    let err = rig.controller.stop_recording().await.unwrap_err();
    assert_eq!(err.code(), "capture/aborted");
    assert_eq!(rig.controller.recording_state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_append_failure_fails_the_recording() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();
    rig.writers.fail_appends();

    rig.controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap();
    rig.platform.push_video_sample(ms(0)).await;
    settle().await;

    assert_eq!(rig.controller.recording_state(), RecordingState::Failed);
    let err = rig.controller.pause_recording().await.unwrap_err();
    assert_eq!(err.code(), "recording/no-active-recording");

    let err = rig.controller.stop_recording().await.unwrap_err();
    assert_eq!(err.code(), "recording/writer-unknown-status");
}

#[tokio::test]
async fn test_avci_has_no_recommended_settings() {
    use camera_core::recording::VideoFileType;

    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    let err = rig
        .controller
        .start_recording(RecordVideoOptions {
            file_type: Some(VideoFileType::Avci),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "recording/create-writer-failed");
}

#[tokio::test]
async fn test_finalized_container_manifest_is_on_disk() {
    let rig = rig();
    configure_active(&rig.controller, "back-wide", vec![video_output()])
        .await
        .unwrap();

    rig.controller
        .start_recording(RecordVideoOptions::default())
        .await
        .unwrap();
    rig.platform.push_video_sample(ms(0)).await;
    rig.platform.push_video_sample(ms(33)).await;
    settle().await;
    let video = rig.controller.stop_recording().await.unwrap();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&video.path).unwrap()).unwrap();
    assert_eq!(manifest["video_samples"], 2);
    std::fs::remove_file(&video.path).unwrap();
}
