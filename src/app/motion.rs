use super::controller::pause;
use super::types::SessionEnd;
use super::CaptureController;
use crate::analyzer::{FrameAnalysis, MotionSession};
use crate::error::{Result, WatchcamError};
use crate::events::CaptureEvent;
use crate::frame::FrameData;
use crate::handoff::Artifact;
use std::time::SystemTime;
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl CaptureController {
    /// Analyse frames one by one and hand off debounced motion snapshots
    pub(super) async fn run_motion(&mut self) -> Result<SessionEnd> {
        self.analyzer.reset();

        let warmup = self.config.motion.warmup();
        debug!("Camera warmup {:?}", warmup);
        if !pause(&self.cancel, warmup).await {
            return Ok(SessionEnd::Shutdown);
        }

        let mut session = MotionSession::from_config(&self.config.motion, Instant::now());
        let mut failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(SessionEnd::Shutdown);
            }
            if self.needs_reconfiguration() {
                info!("Time state changed, ending motion session");
                return Ok(SessionEnd::Reconfigure);
            }

            let captured = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(SessionEnd::Shutdown),
                captured = self.camera.capture_frame() => captured,
            };

            let frame = match captured {
                Ok(frame) => frame,
                Err(WatchcamError::Camera(e)) if e.is_transient() => {
                    self.note_acquisition_failure(&mut failures, &e)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let analysis = match self.analyzer.analyze(&frame) {
                Ok(analysis) => analysis,
                Err(e) => {
                    self.note_acquisition_failure(&mut failures, &e)?;
                    continue;
                }
            };
            failures = 0;
            self.recovery.reset();

            // First frame of a session only seeds the background
            let Some(analysis) = analysis else {
                continue;
            };

            if session.observe(analysis.occupied, Instant::now()) {
                self.hand_off_snapshot(frame, analysis).await;
            }
        }
    }

    async fn hand_off_snapshot(&mut self, frame: FrameData, analysis: FrameAnalysis) {
        let area = analysis.largest_area();
        info!(
            "Motion detected in frame {} ({} region(s), largest area {})",
            frame.id,
            analysis.regions.len(),
            area
        );
        self.event_bus
            .emit(CaptureEvent::MotionTriggered {
                area,
                timestamp: SystemTime::now(),
            })
            .await;

        if !self.config.upload.upload_enabled {
            debug!("Upload disabled, not handing off frame {}", frame.id);
            return;
        }

        // Annotation and JPEG encoding happen in the handoff job
        let artifact = Artifact::Frame {
            frame,
            analysis,
            captured_at: self.clock.now(),
        };
        if let Err(e) = self.dispatcher.submit(artifact) {
            warn!("Snapshot handoff failed: {}", e);
        }
    }
}
