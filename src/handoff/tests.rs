use super::dispatcher::handle_artifact;
use super::mock::{MockEncoder, MockUploader};
use super::*;
use crate::analyzer::{FrameAnalysis, MotionRegion, SnapshotAnnotator};
use crate::camera::SyntheticCamera;
use crate::config::WatchcamConfig;
use crate::events::{CaptureEvent, EventBus};
use crate::segment::ClosedSegment;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(20, 5, 7)
        .unwrap()
}

fn create_test_context(
    dir: &Path,
    encoder: MockEncoder,
    uploader: Option<MockUploader>,
) -> HandoffContext {
    HandoffContext {
        encoder: Arc::new(encoder),
        uploader: uploader.map(|u| Arc::new(u) as Arc<dyn Uploader>),
        naming: ArtifactNaming::new("%Y-%m-%d", "%H.%M.%S", "mp4"),
        output_dir: dir.to_path_buf(),
        annotator: Arc::new(create_test_annotator()),
        event_bus: EventBus::new(16),
    }
}

fn create_test_annotator() -> SnapshotAnnotator {
    let mut motion = WatchcamConfig::default().motion;
    motion.annotate = false;
    SnapshotAnnotator::new(&motion, 16)
}

fn motion_frame(frame_id: u64) -> Artifact {
    Artifact::Frame {
        frame: SyntheticCamera::uniform_frame(frame_id, 64, 48, 128),
        analysis: FrameAnalysis {
            occupied: true,
            regions: vec![MotionRegion {
                x: 4,
                y: 4,
                width: 10,
                height: 10,
                area: 100,
            }],
            analysis_width: 64,
            analysis_height: 48,
        },
        captured_at: at(),
    }
}

fn raw_segment(dir: &Path, sequence: u64, bytes: &[u8]) -> Artifact {
    let path = dir.join(format!("stream{}.h264", sequence));
    std::fs::write(&path, bytes).unwrap();
    Artifact::Segment {
        segment: ClosedSegment {
            sequence,
            path,
            bytes: bytes.len() as u64,
        },
        framerate: "15/1".to_string(),
        closed_at: at(),
    }
}

#[tokio::test]
async fn test_segment_converted_uploaded_and_cleaned() {
    let dir = TempDir::new().unwrap();
    let encoder = MockEncoder::default();
    let uploader = MockUploader::default();
    let context = create_test_context(dir.path(), encoder.clone(), Some(uploader.clone()));

    let outcome = handle_artifact(&context, raw_segment(dir.path(), 1, b"h264 data"), None).await;

    assert_eq!(outcome, HandoffOutcome::Uploaded);
    assert_eq!(encoder.calls().len(), 1);
    assert_eq!(encoder.calls()[0].2, "15/1");
    assert_eq!(
        uploader.uploads(),
        vec![("/hc_2024-03-09/2024-03-09_20.05.07.mp4".to_string(), 9)]
    );
    // Neither raw nor converted file is left behind
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_disabled_keeps_converted_file() {
    let dir = TempDir::new().unwrap();
    let context = create_test_context(dir.path(), MockEncoder::default(), None);

    let outcome = handle_artifact(&context, raw_segment(dir.path(), 2, b"data"), None).await;

    assert_eq!(outcome, HandoffOutcome::Retained);
    assert!(!dir.path().join("stream2.h264").exists());
    assert!(dir.path().join("2024-03-09_20.05.07.mp4").exists());
}

#[tokio::test]
async fn test_conversion_failure_discards_segment() {
    let dir = TempDir::new().unwrap();
    let uploader = MockUploader::default();
    let context = create_test_context(dir.path(), MockEncoder::failing(), Some(uploader.clone()));

    let outcome = handle_artifact(&context, raw_segment(dir.path(), 3, b"data"), None).await;

    assert_eq!(outcome, HandoffOutcome::Discarded);
    assert!(uploader.uploads().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_failure_discards_after_cleanup() {
    let dir = TempDir::new().unwrap();
    let uploader = MockUploader::failing();
    let context = create_test_context(dir.path(), MockEncoder::default(), Some(uploader.clone()));

    let outcome = handle_artifact(&context, raw_segment(dir.path(), 4, b"data"), None).await;

    assert_eq!(outcome, HandoffOutcome::Discarded);
    // Attempted exactly once
    assert_eq!(uploader.uploads().len(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_frame_rendered_and_uploaded() {
    let dir = TempDir::new().unwrap();
    let encoder = MockEncoder::default();
    let uploader = MockUploader::default();
    let context = create_test_context(dir.path(), encoder.clone(), Some(uploader.clone()));
    let mut events = context.event_bus.subscribe();

    let outcome = handle_artifact(&context, motion_frame(7), None).await;

    assert_eq!(outcome, HandoffOutcome::Uploaded);
    assert!(encoder.calls().is_empty());

    // Rendered to JPEG inside the job
    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "/hc_2024-03-09/2024-03-09_20.05.07.jpg");
    assert!(uploads[0].1 > 0);

    match events.recv().await.unwrap() {
        CaptureEvent::ArtifactHandled { outcome, .. } => {
            assert_eq!(outcome, HandoffOutcome::Uploaded)
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_frame_dropped_when_upload_disabled() {
    let dir = TempDir::new().unwrap();
    let context = create_test_context(dir.path(), MockEncoder::default(), None);

    let outcome = handle_artifact(&context, motion_frame(1), None).await;
    assert_eq!(outcome, HandoffOutcome::Discarded);
}

#[tokio::test(start_paused = true)]
async fn test_submit_does_not_wait_for_slow_upload() {
    let dir = TempDir::new().unwrap();
    let uploader = MockUploader::slow(Duration::from_secs(60));
    let context = create_test_context(dir.path(), MockEncoder::default(), Some(uploader.clone()));
    let mut dispatcher = HandoffDispatcher::start(context, Duration::from_secs(120));

    let start = tokio::time::Instant::now();
    for sequence in 1..=3 {
        dispatcher.submit(raw_segment(dir.path(), sequence, b"data")).unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(1));

    // Shutdown drains all in-flight jobs
    dispatcher.shutdown().await;
    assert_eq!(uploader.uploads().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_same_second_segments_get_distinct_targets() {
    let dir = TempDir::new().unwrap();
    let encoder = MockEncoder::slow(Duration::from_millis(200));
    let uploader = MockUploader::default();
    let context = create_test_context(dir.path(), encoder.clone(), Some(uploader.clone()));
    let mut dispatcher = HandoffDispatcher::start(context, Duration::from_secs(30));

    // Both close in the same second, so both want the same timestamped name
    dispatcher.submit(raw_segment(dir.path(), 1, b"first segment")).unwrap();
    dispatcher.submit(raw_segment(dir.path(), 2, b"second")).unwrap();
    dispatcher.shutdown().await;

    let calls = encoder.calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].1, calls[1].1);
    assert!(calls
        .iter()
        .any(|(_, target, _)| target.ends_with("2024-03-09_20.05.07.mp4")));

    let mut sizes: Vec<usize> = uploader.uploads().iter().map(|(_, size)| *size).collect();
    sizes.sort();
    assert_eq!(sizes, vec![6, 13]);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retained_segments_in_same_second_both_kept() {
    let dir = TempDir::new().unwrap();
    let context = create_test_context(
        dir.path(),
        MockEncoder::slow(Duration::from_millis(200)),
        None,
    );
    let mut dispatcher = HandoffDispatcher::start(context, Duration::from_secs(30));

    dispatcher.submit(raw_segment(dir.path(), 1, b"aaaa")).unwrap();
    dispatcher.submit(raw_segment(dir.path(), 2, b"bbbbbbbb")).unwrap();
    dispatcher.shutdown().await;

    let mut sizes: Vec<u64> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().metadata().unwrap().len())
        .collect();
    sizes.sort();
    assert_eq!(sizes, vec![4, 8]);
    assert!(dir.path().join("2024-03-09_20.05.07.mp4").exists());
}

#[tokio::test]
async fn test_existing_converted_file_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let existing = dir.path().join("2024-03-09_20.05.07.mp4");
    std::fs::write(&existing, b"kept").unwrap();

    let encoder = MockEncoder::default();
    let context = create_test_context(dir.path(), encoder.clone(), None);
    let mut dispatcher = HandoffDispatcher::start(context, Duration::from_secs(5));

    dispatcher.submit(raw_segment(dir.path(), 1, b"new data")).unwrap();
    dispatcher.shutdown().await;

    assert_eq!(std::fs::read(&existing).unwrap(), b"kept");
    assert_eq!(encoder.calls().len(), 1);
    assert_ne!(encoder.calls()[0].1, existing);
    assert_eq!(std::fs::read(&encoder.calls()[0].1).unwrap(), b"new data");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_jobs_after_timeout() {
    let dir = TempDir::new().unwrap();
    let uploader = MockUploader::slow(Duration::from_secs(600));
    let context = create_test_context(dir.path(), MockEncoder::default(), Some(uploader.clone()));
    let mut dispatcher = HandoffDispatcher::start(context, Duration::from_secs(5));

    dispatcher.submit(raw_segment(dir.path(), 1, b"data")).unwrap();
    tokio::task::yield_now().await;
    dispatcher.shutdown().await;

    assert!(uploader.uploads().is_empty());
}

#[tokio::test]
async fn test_submit_after_shutdown_removes_segment() {
    let dir = TempDir::new().unwrap();
    let context = create_test_context(dir.path(), MockEncoder::default(), None);
    let mut dispatcher = HandoffDispatcher::start(context, Duration::from_secs(1));
    dispatcher.shutdown().await;

    let artifact = raw_segment(dir.path(), 9, b"data");
    let result = dispatcher.submit(artifact);

    assert!(matches!(result, Err(crate::error::HandoffError::QueueClosed)));
    assert!(!dir.path().join("stream9.h264").exists());
}
