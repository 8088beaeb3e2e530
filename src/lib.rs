pub mod analyzer;
pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod handoff;
pub mod recovery;
pub mod schedule;
pub mod segment;

pub use app::{install_signal_handlers, CaptureController, ControllerState, RunOutcome, ShutdownReason};
pub use config::WatchcamConfig;
pub use error::{Result, WatchcamError};
pub use events::{CaptureEvent, EventBus};
pub use frame::{FrameData, FrameFormat, Rotation};
pub use schedule::{Clock, Scheduler, SystemClock, TimeState};
