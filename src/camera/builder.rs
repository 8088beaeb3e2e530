use super::interface::Camera;
use super::synthetic::SyntheticCamera;
use crate::config::{CameraBackend, CameraConfig};
use crate::error::{Result, WatchcamError};
use tracing::info;

/// Builder selecting the camera backend from configuration
pub struct CameraBuilder {
    config: Option<CameraConfig>,
}

impl CameraBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Box<dyn Camera>> {
        let config = self
            .config
            .ok_or_else(|| WatchcamError::system("Camera configuration must be specified"))?;

        match config.backend {
            CameraBackend::Synthetic => {
                info!("Using synthetic camera backend");
                Ok(Box::new(SyntheticCamera::new().paced(true)))
            }
            CameraBackend::Libcamera => build_libcamera(),
        }
    }
}

impl Default for CameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn build_libcamera() -> Result<Box<dyn Camera>> {
    info!("Using libcamera backend");
    Ok(Box::new(super::gst::LibcameraCamera::new()?))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn build_libcamera() -> Result<Box<dyn Camera>> {
    Err(crate::error::CameraError::DeviceOpen {
        details: "built without the 'camera' feature; use the synthetic backend".to_string(),
    }
    .into())
}
