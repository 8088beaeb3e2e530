//! Day/night scheduling.
//!
//! The scheduler is a pure function of wall-clock time of day. Callers pass
//! the time in explicitly so the capture controller can read it from a
//! [`Clock`] and tests can drive it with a [`ManualClock`].

use crate::config::ScheduleConfig;
use chrono::{Local, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lighting regime the camera is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeState {
    Day,
    Night,
}

impl fmt::Display for TimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeState::Day => write!(f, "day"),
            TimeState::Night => write!(f, "night"),
        }
    }
}

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the configured timezone, or the system's local time
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    tz: Option<Tz>,
}

impl SystemClock {
    pub fn new(tz: Option<Tz>) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.tz {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: parking_lot::Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Decides day vs night from two boundary times
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    day_start: NaiveTime,
    night_start: NaiveTime,
    night_enabled: bool,
}

impl Scheduler {
    pub fn new(day_start: NaiveTime, night_start: NaiveTime, night_enabled: bool) -> Self {
        Self {
            day_start,
            night_start,
            night_enabled,
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        let (day_start, night_start) = config.boundaries()?;
        Ok(Self::new(day_start, night_start, config.night_enabled))
    }

    pub fn night_enabled(&self) -> bool {
        self.night_enabled
    }

    /// True when `now` falls in [day_start, night_start), wrapping past midnight
    pub fn is_daytime(&self, now: NaiveTime) -> bool {
        if self.day_start < self.night_start {
            now >= self.day_start && now < self.night_start
        } else {
            now >= self.day_start || now < self.night_start
        }
    }

    /// Lighting regime for `now`; always Day unless night mode is enabled
    pub fn current_time_state(&self, now: NaiveTime) -> TimeState {
        if self.night_enabled && !self.is_daytime(now) {
            TimeState::Night
        } else {
            TimeState::Day
        }
    }

    /// Whether the applied profile has drifted from the one `now` calls for
    pub fn needs_reconfiguration(&self, last_applied: TimeState, now: NaiveTime) -> bool {
        self.night_enabled && self.current_time_state(now) != last_applied
    }
}
