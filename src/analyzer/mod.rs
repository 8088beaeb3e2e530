mod annotate;
mod debounce;
mod motion;

pub use annotate::{SnapshotAnnotator, SNAPSHOT_TIME_FORMAT};
pub use debounce::MotionSession;
pub use motion::{preprocess, to_luma, BackgroundModel, FrameAnalysis, MotionAnalyzer, MotionRegion};
