use crate::app::ControllerState;
use crate::error::EventBusError;
use crate::handoff::HandoffOutcome;
use crate::schedule::TimeState;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events emitted by the capture core
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The capture controller moved between states
    StateChanged {
        from: ControllerState,
        to: ControllerState,
    },
    /// A day or night camera profile was applied
    TimeStateApplied {
        state: TimeState,
        timestamp: SystemTime,
    },
    /// A full or interrupted segment was closed and handed on
    SegmentRotated { sequence: u64, bytes: u64 },
    /// The motion accumulator fired a qualifying event
    MotionTriggered { area: u32, timestamp: SystemTime },
    /// The dispatcher finished with an artifact
    ArtifactHandled {
        name: String,
        outcome: HandoffOutcome,
    },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl CaptureEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CaptureEvent::StateChanged { from, to } => {
                format!("Controller {:?} -> {:?}", from, to)
            }
            CaptureEvent::TimeStateApplied { state, .. } => {
                format!("Applied {} profile", state)
            }
            CaptureEvent::SegmentRotated { sequence, bytes } => {
                format!("Segment {} rotated ({} bytes)", sequence, bytes)
            }
            CaptureEvent::MotionTriggered { area, .. } => {
                format!("Motion triggered with area: {}", area)
            }
            CaptureEvent::ArtifactHandled { name, outcome } => {
                format!("Artifact {} {:?}", name, outcome)
            }
            CaptureEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            CaptureEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CaptureEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: CaptureEvent) -> Result<usize, EventBusError> {
        match &event {
            CaptureEvent::MotionTriggered { area, .. } => {
                info!("Motion triggered with area: {}", area);
            }
            CaptureEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            CaptureEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, treating "nobody listening" as normal
    pub async fn emit(&self, event: CaptureEvent) {
        if self.has_subscribers() {
            if let Err(e) = self.publish(event).await {
                warn!("Failed to publish event: {}", e);
            }
        } else {
            debug!("Event (no subscribers): {}", event.description());
        }
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
