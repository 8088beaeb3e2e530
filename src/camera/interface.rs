use crate::config::WatchcamConfig;
use crate::error::{CameraError, Result};
use crate::frame::{FrameData, Rotation};
use crate::schedule::TimeState;
use async_trait::async_trait;
use std::time::Duration;

/// Exposure parameters that differ between day and night
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureProfile {
    pub framerate_num: u32,
    pub framerate_den: u32,
    /// Manual shutter in microseconds, 0 for auto
    pub shutter_us: u64,
    /// Sensor ISO, 0 for auto
    pub iso: u32,
    pub auto_exposure: bool,
}

impl ExposureProfile {
    pub fn day(config: &WatchcamConfig) -> Self {
        Self {
            framerate_num: config.camera.framerate,
            framerate_den: 1,
            shutter_us: 0,
            iso: 0,
            auto_exposure: true,
        }
    }

    pub fn night(config: &WatchcamConfig) -> Self {
        Self {
            framerate_num: config.schedule.night_framerate_num,
            framerate_den: config.schedule.night_framerate_den,
            shutter_us: config.schedule.night_shutter_us,
            iso: config.schedule.night_iso,
            auto_exposure: false,
        }
    }

    /// Frames per second as a float
    pub fn framerate(&self) -> f64 {
        self.framerate_num as f64 / self.framerate_den.max(1) as f64
    }

    /// Interval between two frames at this profile's rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate().max(f64::EPSILON))
    }
}

/// Everything the controller hands to the camera in one `configure` call
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub time_state: TimeState,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub brightness: u32,
    pub contrast: i32,
    pub exposure: ExposureProfile,
    pub text_size: u32,
    pub text_color: String,
    pub bitrate: u32,
    pub quality: u32,
}

impl CameraSettings {
    /// Derive the settings for `state` from the configuration snapshot
    pub fn for_time_state(config: &WatchcamConfig, state: TimeState) -> Result<Self> {
        let rotation =
            Rotation::from_degrees(config.camera.rotation).ok_or_else(|| {
                CameraError::Configuration {
                    details: format!("Unsupported rotation {}", config.camera.rotation),
                }
            })?;

        let exposure = match state {
            TimeState::Day => ExposureProfile::day(config),
            TimeState::Night => ExposureProfile::night(config),
        };

        Ok(Self {
            time_state: state,
            width: config.camera.resolution_x,
            height: config.camera.resolution_y,
            rotation,
            brightness: config.camera.brightness,
            contrast: config.camera.contrast,
            exposure,
            text_size: config.camera.text_size,
            text_color: config.camera.text_color.clone(),
            bitrate: config.recording.bitrate,
            quality: config.recording.quality,
        })
    }
}

/// Camera device as seen by the capture controller.
///
/// A camera is configured once per session. It then either serves single
/// frames for motion analysis or an encoded byte stream for segmented
/// recording, never both at the same time. `shutdown` releases the device;
/// a later `configure` reopens it.
#[async_trait]
pub trait Camera: Send {
    /// Apply settings, opening the device if needed
    async fn configure(&mut self, settings: &CameraSettings) -> Result<()>;

    /// Grab one uncompressed frame
    async fn capture_frame(&mut self) -> Result<FrameData>;

    /// Start delivering the encoded recording stream
    async fn open_segment_stream(&mut self) -> Result<()>;

    /// Encoded bytes produced within `wait`; empty when nothing arrived
    async fn read_stream(&mut self, wait: Duration) -> Result<Vec<u8>>;

    /// Stop the recording stream
    async fn close_segment_stream(&mut self) -> Result<()>;

    /// Release the device
    async fn shutdown(&mut self) -> Result<()>;

    /// Settings of the last successful `configure`
    fn applied_settings(&self) -> Option<&CameraSettings>;
}
