use super::types::SessionEnd;
use super::CaptureController;
use crate::error::{Result, WatchcamError};
use crate::segment::{starts_with_keyframe, Segment};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest wait for encoded bytes before re-checking schedule and cancellation
const STREAM_POLL: Duration = Duration::from_secs(1);

impl CaptureController {
    /// Record the encoded stream into size-bounded segments.
    ///
    /// A full segment is only rotated at the next keyframe, which becomes
    /// the first access unit of the new segment. Whatever segment is open when the session ends is closed and handed
    /// off, so a reconfiguration or shutdown never loses recorded bytes.
    pub(super) async fn run_segmented(&mut self) -> Result<SessionEnd> {
        self.camera.open_segment_stream().await?;
        let mut segment = self.rotation.open_segment().await?;
        info!(
            "Recording segment {} to {}",
            segment.sequence(),
            segment.path().display()
        );

        let outcome = self.record(&mut segment).await;

        if let Err(e) = self.camera.close_segment_stream().await {
            warn!("Failed to close segment stream: {}", e);
        }
        self.hand_off_segment(segment).await;
        outcome
    }

    async fn record(&mut self, segment: &mut Segment) -> Result<SessionEnd> {
        let mut failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(SessionEnd::Shutdown);
            }
            if self.needs_reconfiguration() {
                info!("Time state changed, ending segmented session");
                return Ok(SessionEnd::Reconfigure);
            }

            let read = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(SessionEnd::Shutdown),
                read = self.camera.read_stream(STREAM_POLL) => read,
            };

            let chunk = match read {
                Ok(chunk) => chunk,
                Err(WatchcamError::Camera(e)) if e.is_transient() => {
                    self.note_acquisition_failure(&mut failures, &e)?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            failures = 0;

            if chunk.is_empty() {
                debug!("No stream bytes within {:?}", STREAM_POLL);
                continue;
            }

            if self.rotation.is_full(segment) && starts_with_keyframe(&chunk) {
                let mut next = self.rotation.open_segment().await?;
                next.write(&chunk).await?;
                let full = std::mem::replace(segment, next);
                debug!(
                    "Rotating segment {} -> {}",
                    full.sequence(),
                    segment.sequence()
                );
                self.hand_off_segment(full).await;
            } else {
                segment.write(&chunk).await?;
            }
            self.recovery.reset();
        }
    }
}
