use super::*;
use crate::config::WatchcamConfig;
use crate::error::{SegmentError, WatchcamError};
use tempfile::TempDir;

fn create_test_rotation(dir: &TempDir, max_bytes: u64) -> SegmentRotation {
    SegmentRotation::new(dir.path(), "h264", max_bytes)
}

#[test]
fn test_segment_names_are_never_reused() {
    let dir = TempDir::new().unwrap();
    let mut rotation = create_test_rotation(&dir, 1024);

    let names: Vec<_> = (0..5).map(|_| rotation.next_segment_name()).collect();
    assert_eq!(names[0], (1, "stream1.h264".to_string()));
    assert_eq!(names[4], (5, "stream5.h264".to_string()));

    let mut sequences: Vec<u64> = names.iter().map(|(seq, _)| *seq).collect();
    sequences.dedup();
    assert_eq!(sequences.len(), 5);
}

#[tokio::test]
async fn test_is_full_exactly_at_limit() {
    let dir = TempDir::new().unwrap();
    let mut rotation = create_test_rotation(&dir, 10);
    let mut segment = rotation.open_segment().await.unwrap();

    segment.write(&[0u8; 9]).await.unwrap();
    assert!(!rotation.is_full(&segment));

    segment.write(&[0u8; 1]).await.unwrap();
    assert_eq!(segment.bytes(), 10);
    assert!(rotation.is_full(&segment));
}

#[tokio::test]
async fn test_close_hands_off_written_segment() {
    let dir = TempDir::new().unwrap();
    let mut rotation = create_test_rotation(&dir, 4);
    let mut segment = rotation.open_segment().await.unwrap();
    segment.write(b"abcdef").await.unwrap();
    let path = segment.path().to_path_buf();

    let closed = rotation.close(segment).await.unwrap().unwrap();
    assert_eq!(closed.sequence, 1);
    assert_eq!(closed.bytes, 6);
    assert_eq!(closed.path, path);
    assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");

    // The next segment never reuses the closed one's number
    let next = rotation.open_segment().await.unwrap();
    assert_eq!(next.sequence(), 2);
}

#[tokio::test]
async fn test_close_removes_empty_segment() {
    let dir = TempDir::new().unwrap();
    let mut rotation = create_test_rotation(&dir, 4);
    let segment = rotation.open_segment().await.unwrap();
    let path = segment.path().to_path_buf();
    assert!(path.exists());

    assert!(rotation.close(segment).await.unwrap().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_output_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    let mut rotation = SegmentRotation::new(&nested, ".h264", 4);

    let segment = rotation.open_segment().await.unwrap();
    assert!(segment.path().starts_with(&nested));
    assert!(segment.path().ends_with("stream1.h264"));
}

#[tokio::test]
async fn test_unavailable_output_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    // A regular file where the directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let mut rotation = SegmentRotation::new(blocker.join("out"), "h264", 4);

    let err = rotation.open_segment().await.unwrap_err();
    assert!(matches!(err, SegmentError::OutputUnavailable { .. }));
    assert!(WatchcamError::from(err).is_fatal_device());
}

#[test]
fn test_rotation_from_config() {
    let config = WatchcamConfig::default();
    let rotation = SegmentRotation::from_config(&config.recording);
    assert_eq!(rotation.max_bytes(), 8 * 1024 * 1024);
    assert_eq!(rotation.output_dir(), std::path::Path::new("./output"));
}
