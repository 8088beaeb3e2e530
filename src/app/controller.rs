use super::types::{ControllerState, RunOutcome, SessionEnd};
use crate::analyzer::MotionAnalyzer;
use crate::camera::{Camera, CameraSettings, ExposureProfile};
use crate::config::{CaptureMode, WatchcamConfig};
use crate::error::{CameraError, Result};
use crate::events::{CaptureEvent, EventBus};
use crate::handoff::{Artifact, HandoffContext, HandoffDispatcher};
use crate::recovery::{RecoveryAction, RecoveryConfig, RecoveryManager};
use crate::schedule::{Clock, Scheduler, TimeState};
use crate::segment::{Segment, SegmentRotation};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives the camera through day/night configuration and the capture modes.
///
/// The controller owns the camera exclusively. Finished segments and
/// snapshots leave through the [`HandoffDispatcher`], so nothing in the
/// capture loop waits on conversion or upload.
pub struct CaptureController {
    pub(super) config: WatchcamConfig,
    pub(super) camera: Box<dyn Camera>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) scheduler: Scheduler,
    pub(super) rotation: SegmentRotation,
    pub(super) analyzer: MotionAnalyzer,
    pub(super) dispatcher: HandoffDispatcher,
    pub(super) event_bus: EventBus,
    pub(super) recovery: RecoveryManager,
    pub(super) cancel: CancellationToken,
    state: ControllerState,
    applied: Option<TimeState>,
}

impl CaptureController {
    /// Build the controller and start its handoff worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: WatchcamConfig,
        camera: Box<dyn Camera>,
        clock: Arc<dyn Clock>,
        handoff: HandoffContext,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let scheduler = Scheduler::from_config(&config.schedule)?;
        let rotation = SegmentRotation::from_config(&config.recording);
        let analyzer = MotionAnalyzer::new(config.motion.clone());
        let recovery = RecoveryManager::new(RecoveryConfig::from(&config.system));
        let event_bus = handoff.event_bus.clone();
        let dispatcher = HandoffDispatcher::start(
            handoff,
            Duration::from_secs(config.system.shutdown_timeout_seconds),
        );

        Ok(Self {
            config,
            camera,
            clock,
            scheduler,
            rotation,
            analyzer,
            dispatcher,
            event_bus,
            recovery,
            cancel,
            state: ControllerState::Uninitialized,
            applied: None,
        })
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Time state whose profile the camera currently runs with
    pub fn applied_time_state(&self) -> Option<TimeState> {
        self.applied
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run until cancelled or halted, then drain pending handoffs
    pub async fn run(&mut self) -> Result<RunOutcome> {
        info!(
            "Capture controller starting in {:?} mode (night schedule {})",
            self.config.recording.mode,
            if self.scheduler.night_enabled() {
                "enabled"
            } else {
                "disabled"
            }
        );

        let outcome = self.drive().await;
        self.finish().await;

        match &outcome {
            Ok(result) => info!("Capture controller stopped: {:?}", result),
            Err(e) => error!("Capture controller failed: {}", e),
        }
        outcome
    }

    async fn drive(&mut self) -> Result<RunOutcome> {
        let startup = self.config.schedule.startup_delay();
        if !startup.is_zero() {
            info!("Waiting {:?} before opening the camera", startup);
            if !pause(&self.cancel, startup).await {
                return Ok(RunOutcome::Completed);
            }
        }

        loop {
            match self.run_session().await {
                Ok(SessionEnd::Shutdown) => return Ok(RunOutcome::Completed),
                Ok(SessionEnd::Reconfigure) => {
                    self.set_state(ControllerState::Reinitializing).await;
                    self.release_camera().await;

                    let settle = self.config.schedule.settle_delay();
                    debug!("Letting the sensor settle for {:?}", settle);
                    if !pause(&self.cancel, settle).await {
                        return Ok(RunOutcome::Completed);
                    }
                }
                Err(e) if e.is_fatal_device() => {
                    error!("Capture session failed: {}", e);
                    self.event_bus
                        .emit(CaptureEvent::SystemError {
                            component: "capture".to_string(),
                            error: e.to_string(),
                        })
                        .await;
                    self.release_camera().await;

                    match self.recovery.handle_failure(&e) {
                        RecoveryAction::RetryAfterDelay(delay) => {
                            self.set_state(ControllerState::Reinitializing).await;
                            if !pause(&self.cancel, delay).await {
                                return Ok(RunOutcome::Completed);
                            }
                        }
                        RecoveryAction::Halt => {
                            self.set_state(ControllerState::Halted).await;
                            return Ok(RunOutcome::Halted);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Configure for the current time state and run the configured mode
    async fn run_session(&mut self) -> Result<SessionEnd> {
        if self.cancel.is_cancelled() {
            return Ok(SessionEnd::Shutdown);
        }

        let target = self
            .scheduler
            .current_time_state(self.clock.now().time());
        self.apply_time_state(target).await?;

        match self.config.recording.mode {
            CaptureMode::Segmented => {
                self.set_state(ControllerState::RunningSegmented).await;
                self.run_segmented().await
            }
            CaptureMode::Motion => {
                self.set_state(ControllerState::RunningMotion).await;
                self.run_motion().await
            }
        }
    }

    async fn apply_time_state(&mut self, target: TimeState) -> Result<()> {
        let configuring = match target {
            TimeState::Day => ControllerState::ConfiguringDay,
            TimeState::Night => ControllerState::ConfiguringNight,
        };
        self.set_state(configuring).await;

        let settings = CameraSettings::for_time_state(&self.config, target)?;
        self.camera.configure(&settings).await?;
        self.applied = Some(target);

        info!(
            "Applied {} profile ({}/{} fps)",
            target, settings.exposure.framerate_num, settings.exposure.framerate_den
        );
        self.event_bus
            .emit(CaptureEvent::TimeStateApplied {
                state: target,
                timestamp: SystemTime::now(),
            })
            .await;
        Ok(())
    }

    /// True when the applied profile no longer matches the wall clock
    pub(super) fn needs_reconfiguration(&self) -> bool {
        match self.applied {
            Some(applied) => self
                .scheduler
                .needs_reconfiguration(applied, self.clock.now().time()),
            None => true,
        }
    }

    pub(super) async fn set_state(&mut self, next: ControllerState) {
        if self.state == next {
            return;
        }

        let from = std::mem::replace(&mut self.state, next);
        info!("Capture controller {:?} -> {:?}", from, next);
        self.event_bus
            .emit(CaptureEvent::StateChanged { from, to: next })
            .await;
    }

    /// Count one skipped acquisition; too many in a row end the session
    pub(super) fn note_acquisition_failure(
        &self,
        failures: &mut u32,
        error: &dyn std::fmt::Display,
    ) -> Result<()> {
        *failures += 1;
        let limit = self.config.system.max_consecutive_failures.max(1);
        warn!("Acquisition failed ({}/{}): {}", failures, limit, error);

        if *failures >= limit {
            return Err(CameraError::AcquisitionExhausted {
                failures: *failures,
                last: error.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// `num/den` rate the current segment was recorded at
    pub(super) fn framerate_label(&self) -> String {
        let exposure = self
            .camera
            .applied_settings()
            .map(|settings| settings.exposure.clone())
            .unwrap_or_else(|| ExposureProfile::day(&self.config));
        format!("{}/{}", exposure.framerate_num, exposure.framerate_den)
    }

    /// Close a segment and queue it; empty segments are simply removed
    pub(super) async fn hand_off_segment(&mut self, segment: Segment) {
        let closed = match self.rotation.close(segment).await {
            Ok(Some(closed)) => closed,
            Ok(None) => return,
            Err(e) => {
                error!("Dropping segment: {}", e);
                return;
            }
        };

        info!(
            "Segment {} closed at {} bytes",
            closed.sequence, closed.bytes
        );
        self.event_bus
            .emit(CaptureEvent::SegmentRotated {
                sequence: closed.sequence,
                bytes: closed.bytes,
            })
            .await;

        let artifact = Artifact::Segment {
            segment: closed,
            framerate: self.framerate_label(),
            closed_at: self.clock.now(),
        };
        if let Err(e) = self.dispatcher.submit(artifact) {
            warn!("Segment handoff failed: {}", e);
        }
    }

    async fn release_camera(&mut self) {
        if let Err(e) = self.camera.shutdown().await {
            warn!("Failed to release camera: {}", e);
        }
        self.applied = None;
    }

    async fn finish(&mut self) {
        self.release_camera().await;
        self.dispatcher.shutdown().await;
    }
}

/// Sleep unless cancelled first; false means shutdown was requested
pub(super) async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
