use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("Handoff error: {0}")]
    Handoff(#[from] HandoffError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl WatchcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn credential<S: Into<String>>(message: S) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Errors that stop the current capture session and count against the retry budget
    pub fn is_fatal_device(&self) -> bool {
        match self {
            WatchcamError::Camera(e) => !e.is_transient(),
            WatchcamError::Segment(SegmentError::OutputUnavailable { .. }) => true,
            WatchcamError::Segment(SegmentError::Write { .. }) => true,
            _ => false,
        }
    }

    /// Process exit code for an error that reached `main`
    pub fn exit_code(&self) -> i32 {
        match self {
            WatchcamError::Config(_) | WatchcamError::Credential { .. } => 1,
            e if e.is_fatal_device() => 2,
            _ => 1,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Failed to open camera device: {details}")]
    DeviceOpen { details: String },

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Camera disconnected")]
    Disconnected,

    #[error("No frame received within {timeout:?}")]
    FrameTimeout { timeout: Duration },

    #[error("Capture stream error: {details}")]
    CaptureStream { details: String },

    #[error("Repeated acquisition failures ({failures} in a row): {last}")]
    AcquisitionExhausted { failures: u32, last: String },
}

impl CameraError {
    /// Transient errors skip one frame or chunk and are retried on the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::FrameTimeout { .. } | CameraError::CaptureStream { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Output directory {path} unavailable: {source}")]
    OutputUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write segment {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Conversion of {source_path} failed: {details}")]
    Conversion { source_path: String, details: String },

    #[error("Upload to {destination} failed: {details}")]
    Upload { destination: String, details: String },

    #[error("Snapshot encoding failed: {details}")]
    Snapshot { details: String },

    #[error("Handoff queue is closed")]
    QueueClosed,
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Frame processing failed: {details}")]
    FrameProcessing { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, WatchcamError>;
