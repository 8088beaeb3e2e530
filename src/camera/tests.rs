use super::*;
use crate::config::{CameraBackend, WatchcamConfig};
use crate::error::{CameraError, WatchcamError};
use crate::schedule::TimeState;
use std::time::Duration;

fn create_test_settings(state: TimeState) -> CameraSettings {
    let mut config = WatchcamConfig::default();
    config.camera.resolution_x = 64;
    config.camera.resolution_y = 48;
    CameraSettings::for_time_state(&config, state).unwrap()
}

#[tokio::test]
async fn test_synthetic_camera_requires_configure() {
    let mut camera = SyntheticCamera::new();

    let result = camera.capture_frame().await;
    assert!(matches!(
        result,
        Err(WatchcamError::Camera(CameraError::Configuration { .. }))
    ));
    assert!(camera.applied_settings().is_none());
}

#[tokio::test]
async fn test_synthetic_camera_serves_script_then_static_scene() {
    let mut camera = SyntheticCamera::new();
    let handle = camera.clone();
    camera
        .configure(&create_test_settings(TimeState::Day))
        .await
        .unwrap();

    handle.push_frame(SyntheticCamera::uniform_frame(42, 64, 48, 10));
    handle.push_frame_error(CameraError::FrameTimeout {
        timeout: Duration::from_secs(1),
    });

    assert_eq!(camera.capture_frame().await.unwrap().id, 42);
    let err = camera.capture_frame().await.unwrap_err();
    assert!(!err.is_fatal_device());

    let generated = camera.capture_frame().await.unwrap();
    assert!(generated.validate_size());
    assert!(generated.data.iter().all(|&p| p == 128));
}

#[tokio::test]
async fn test_synthetic_stream_lifecycle() {
    let mut camera = SyntheticCamera::new().with_chunk_size(16);
    camera
        .configure(&create_test_settings(TimeState::Night))
        .await
        .unwrap();

    // Reading before the stream is opened is a transient stream error
    let err = camera.read_stream(Duration::from_secs(1)).await.unwrap_err();
    assert!(!err.is_fatal_device());

    camera.open_segment_stream().await.unwrap();
    camera.push_stream_chunk(vec![1, 2, 3]);
    assert_eq!(camera.read_stream(Duration::from_secs(1)).await.unwrap(), vec![1, 2, 3]);
    let generated = camera.read_stream(Duration::from_secs(1)).await.unwrap();
    assert_eq!(generated.len(), 16);
    assert!(crate::segment::starts_with_keyframe(&generated));

    camera.close_segment_stream().await.unwrap();
    camera.shutdown().await.unwrap();
    assert_eq!(camera.streams_opened(), 1);
    assert_eq!(camera.shutdown_count(), 1);
    assert!(!camera.is_open());
}

#[tokio::test]
async fn test_synthetic_configure_failure_is_recorded_once() {
    let mut camera = SyntheticCamera::new();
    camera.fail_next_configure(CameraError::DeviceOpen {
        details: "no sensor".to_string(),
    });

    let settings = create_test_settings(TimeState::Day);
    let err = camera.configure(&settings).await.unwrap_err();
    assert!(err.is_fatal_device());

    camera.configure(&settings).await.unwrap();
    assert_eq!(camera.configured_settings(), vec![settings]);
}

#[tokio::test(start_paused = true)]
async fn test_paced_synthetic_camera_waits_a_frame_interval() {
    let mut camera = SyntheticCamera::new().paced(true);
    camera
        .configure(&create_test_settings(TimeState::Night))
        .await
        .unwrap();

    let start = tokio::time::Instant::now();
    camera.capture_frame().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[test]
fn test_camera_builder_validation() {
    let result = CameraBuilder::new().build();

    if let Err(WatchcamError::System { message }) = result {
        assert!(message.contains("Camera configuration must be specified"));
    } else {
        panic!("Expected system error for missing configuration");
    }
}

#[test]
fn test_camera_builder_synthetic_backend() {
    let mut config = WatchcamConfig::default();
    config.camera.backend = CameraBackend::Synthetic;

    let camera = CameraBuilder::new().config(config.camera).build().unwrap();
    assert!(camera.applied_settings().is_none());
}
