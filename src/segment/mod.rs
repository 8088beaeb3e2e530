mod keyframe;
mod rotation;
#[cfg(test)]
mod tests;

pub use keyframe::starts_with_keyframe;
pub use rotation::{remove_quietly, ClosedSegment, Segment, SegmentRotation};
