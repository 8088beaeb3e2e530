mod builder;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
mod interface;
mod pipeline;
mod synthetic;
#[cfg(test)]
mod tests;

pub use builder::CameraBuilder;
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::LibcameraCamera;
pub use interface::{Camera, CameraSettings, ExposureProfile};
pub use pipeline::{frame_pipeline, stream_pipeline};
pub use synthetic::SyntheticCamera;
