use crate::config::SystemConfig;
use std::time::Duration;
use tracing::{error, info, warn};

/// Recovery action to take after a fatal session error
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Restart the session after a delay
    RetryAfterDelay(Duration),
    /// Retry budget exhausted; stop capturing
    Halt,
}

/// Retry strategy configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            exponential_backoff: true,
        }
    }
}

impl From<&SystemConfig> for RecoveryConfig {
    fn from(config: &SystemConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            exponential_backoff: true,
        }
    }
}

/// Bounded retry budget for the capture session
#[derive(Debug)]
pub struct RecoveryManager {
    config: RecoveryConfig,
    retry_count: u32,
}

impl RecoveryManager {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            retry_count: 0,
        }
    }

    /// Consume one attempt for `error`, or halt once the budget is spent
    pub fn handle_failure(&mut self, error: &dyn std::fmt::Display) -> RecoveryAction {
        if self.retry_count >= self.config.max_retries {
            error!(
                "Maximum retries ({}) exceeded for capture session: {}",
                self.config.max_retries, error
            );
            return RecoveryAction::Halt;
        }

        let delay = self.calculate_delay(self.retry_count);
        self.retry_count += 1;

        warn!(
            "Scheduling capture session restart in {:?} (attempt {}/{}): {}",
            delay, self.retry_count, self.config.max_retries, error
        );

        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset the budget once a session has made progress
    pub fn reset(&mut self) {
        if self.retry_count > 0 {
            info!(
                "Capture session recovered after {} attempt(s), reset retry count",
                self.retry_count
            );
            self.retry_count = 0;
        }
    }

    /// Calculate delay for retry with exponential backoff
    fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.base_delay;
        }

        let factor = 2_u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        let delay = self.config.base_delay.saturating_mul(factor);

        if delay > self.config.max_delay {
            self.config.max_delay
        } else {
            delay
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }
}
