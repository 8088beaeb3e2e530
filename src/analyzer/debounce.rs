use crate::config::MotionConfig;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Debounce and cooldown state for one motion session.
///
/// Occupied frames only count once `min_interval` has passed since the last
/// qualifying event; an unoccupied frame clears the count. The session starts
/// as if an event had just fired, so the first event of a session also waits
/// out the cooldown.
#[derive(Debug, Clone)]
pub struct MotionSession {
    min_frames: u32,
    min_interval: Duration,
    consecutive_occupied: u32,
    last_upload: Instant,
    cooldown_active: bool,
}

impl MotionSession {
    pub fn new(min_frames: u32, min_interval: Duration, started: Instant) -> Self {
        Self {
            min_frames: min_frames.max(1),
            min_interval,
            consecutive_occupied: 0,
            last_upload: started,
            cooldown_active: false,
        }
    }

    pub fn from_config(config: &MotionConfig, started: Instant) -> Self {
        Self::new(
            config.min_motion_frames,
            config.min_upload_interval(),
            started,
        )
    }

    /// Record one analysed frame; true when it completes a qualifying event
    pub fn observe(&mut self, occupied: bool, now: Instant) -> bool {
        if !occupied {
            if self.consecutive_occupied > 0 {
                debug!(
                    "Occupancy run of {} frames broken",
                    self.consecutive_occupied
                );
            }
            self.consecutive_occupied = 0;
            return false;
        }

        if now.saturating_duration_since(self.last_upload) < self.min_interval {
            self.cooldown_active = true;
            return false;
        }

        self.cooldown_active = false;
        self.consecutive_occupied += 1;
        debug!(
            "Occupied frame {}/{}",
            self.consecutive_occupied, self.min_frames
        );

        if self.consecutive_occupied >= self.min_frames {
            info!(
                "Qualifying motion event after {} occupied frames",
                self.consecutive_occupied
            );
            self.last_upload = now;
            self.consecutive_occupied = 0;
            self.cooldown_active = true;
            return true;
        }

        false
    }

    pub fn consecutive_occupied(&self) -> u32 {
        self.consecutive_occupied
    }

    pub fn last_upload(&self) -> Instant {
        self.last_upload
    }

    /// Whether the most recent occupied frame fell inside the cooldown
    pub fn cooldown_active(&self) -> bool {
        self.cooldown_active
    }
}
