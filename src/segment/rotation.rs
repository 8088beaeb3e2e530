use crate::config::RecordingConfig;
use crate::error::SegmentError;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// In-progress output file.
///
/// The byte counter only grows while the segment is open. Closing consumes
/// the segment, so a closed segment cannot be written to or closed again.
#[derive(Debug)]
pub struct Segment {
    sequence: u64,
    path: PathBuf,
    bytes: u64,
    file: File,
}

impl Segment {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Append encoded bytes
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), SegmentError> {
        if chunk.is_empty() {
            return Ok(());
        }

        self.file
            .write_all(chunk)
            .await
            .map_err(|source| SegmentError::Write {
                path: self.path.display().to_string(),
                source,
            })?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }
}

/// A finished segment waiting for handoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedSegment {
    pub sequence: u64,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Names, opens and closes segments and decides when one is full
#[derive(Debug)]
pub struct SegmentRotation {
    output_dir: PathBuf,
    extension: String,
    max_bytes: u64,
    next_sequence: u64,
}

impl SegmentRotation {
    pub fn new<P: Into<PathBuf>>(output_dir: P, extension: &str, max_bytes: u64) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
            max_bytes,
            next_sequence: 1,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(
            &config.output_path,
            &config.stream_format,
            config.max_segment_bytes(),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Fresh `(sequence, file name)`; sequence numbers are never handed out twice
    pub fn next_segment_name(&mut self) -> (u64, String) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        (sequence, format!("stream{}.{}", sequence, self.extension))
    }

    pub fn is_full(&self, segment: &Segment) -> bool {
        segment.bytes >= self.max_bytes
    }

    /// Create the output directory if needed and open the next segment
    pub async fn open_segment(&mut self) -> Result<Segment, SegmentError> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| SegmentError::OutputUnavailable {
                path: self.output_dir.display().to_string(),
                source,
            })?;

        let (sequence, name) = self.next_segment_name();
        let path = self.output_dir.join(name);
        let file = File::create(&path)
            .await
            .map_err(|source| SegmentError::OutputUnavailable {
                path: path.display().to_string(),
                source,
            })?;

        debug!("Opened segment {} at {}", sequence, path.display());
        Ok(Segment {
            sequence,
            path,
            bytes: 0,
            file,
        })
    }

    /// Flush and close `segment`.
    ///
    /// Returns the closed segment for handoff, or `None` when nothing was
    /// written, in which case the file has already been removed.
    pub async fn close(&self, mut segment: Segment) -> Result<Option<ClosedSegment>, SegmentError> {
        let flushed = segment.file.flush().await;
        let synced = match flushed {
            Ok(()) => segment.file.sync_all().await,
            Err(e) => Err(e),
        };
        drop(segment.file);

        if segment.bytes == 0 {
            remove_quietly(&segment.path).await;
            debug!("Removed empty segment {}", segment.sequence);
            return Ok(None);
        }

        if let Err(source) = synced {
            remove_quietly(&segment.path).await;
            return Err(SegmentError::Write {
                path: segment.path.display().to_string(),
                source,
            });
        }

        info!(
            "Closed segment {} ({} bytes, limit {})",
            segment.sequence, segment.bytes, self.max_bytes
        );
        Ok(Some(ClosedSegment {
            sequence: segment.sequence,
            path: segment.path,
            bytes: segment.bytes,
        }))
    }
}

/// Remove a file, logging rather than failing when it is already gone
pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
