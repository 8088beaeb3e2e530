mod controller;
mod motion;
mod runtime;
mod segmented;
mod types;


pub use controller::CaptureController;
pub use runtime::install_signal_handlers;
pub use types::{ControllerState, RunOutcome, ShutdownReason};
