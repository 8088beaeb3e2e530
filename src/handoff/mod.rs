mod dispatcher;
mod encode;
#[cfg(test)]
pub(crate) mod mock;
mod naming;
mod upload;
#[cfg(test)]
mod tests;

pub use dispatcher::{HandoffContext, HandoffDispatcher};
pub use encode::{Encoder, FfmpegEncoder};
pub use naming::ArtifactNaming;
pub use upload::{access_token, DropboxUploader, Uploader};

use crate::analyzer::FrameAnalysis;
use crate::frame::FrameData;
use crate::segment::ClosedSegment;
use chrono::NaiveDateTime;

/// A finished unit of capture handed over by the controller
#[derive(Debug)]
pub enum Artifact {
    /// Closed raw segment, converted then uploaded
    Segment {
        segment: ClosedSegment,
        /// Recording rate as `num/den`
        framerate: String,
        closed_at: NaiveDateTime,
    },
    /// Qualifying frame, annotated and JPEG-encoded by the job, then uploaded
    Frame {
        frame: FrameData,
        analysis: FrameAnalysis,
        captured_at: NaiveDateTime,
    },
}

impl Artifact {
    pub fn describe(&self) -> String {
        match self {
            Artifact::Segment { segment, .. } => format!(
                "segment {} ({} bytes)",
                segment.sequence, segment.bytes
            ),
            Artifact::Frame {
                frame, analysis, ..
            } => format!(
                "snapshot of frame {} ({} region(s))",
                frame.id,
                analysis.regions.len()
            ),
        }
    }
}

/// What happened to an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    Uploaded,
    /// Converted and kept locally because uploading is disabled
    Retained,
    /// Dropped after a collaborator failure, or a snapshot with uploading disabled
    Discarded,
}
