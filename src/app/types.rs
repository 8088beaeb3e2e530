use std::fmt;

/// Lifecycle of the capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    ConfiguringDay,
    ConfiguringNight,
    RunningSegmented,
    RunningMotion,
    Reinitializing,
    /// Terminal; the retry budget is spent
    Halted,
}

impl ControllerState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ControllerState::RunningSegmented | ControllerState::RunningMotion
        )
    }

    pub fn is_configuring(&self) -> bool {
        matches!(
            self,
            ControllerState::ConfiguringDay | ControllerState::ConfiguringNight
        )
    }
}

/// System shutdown reason
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::UserRequest => write!(f, "user request"),
        }
    }
}

/// How a controller run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped on request after draining handoffs
    Completed,
    /// Gave up after repeated device failures
    Halted,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Halted => 2,
        }
    }
}

/// Why a running session returned control to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Day/night boundary crossed
    Reconfigure,
    Shutdown,
}
