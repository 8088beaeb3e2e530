use chrono::NaiveTime;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchcamConfig {
    pub camera: CameraConfig,
    pub recording: RecordingConfig,
    pub motion: MotionConfig,
    pub schedule: ScheduleConfig,
    pub upload: UploadConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Capture backend
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,

    /// Horizontal resolution in pixels
    #[serde(default = "default_resolution_x")]
    pub resolution_x: u32,

    /// Vertical resolution in pixels
    #[serde(default = "default_resolution_y")]
    pub resolution_y: u32,

    /// Daytime frames per second
    #[serde(default = "default_framerate")]
    pub framerate: u32,

    /// Sensor rotation in degrees (0, 90, 180, 270)
    #[serde(default = "default_rotation")]
    pub rotation: u32,

    /// Brightness, 0..=100 with 50 neutral
    #[serde(default = "default_brightness")]
    pub brightness: u32,

    /// Contrast, -100..=100 with 0 neutral
    #[serde(default = "default_contrast")]
    pub contrast: i32,

    /// Timestamp annotation text size
    #[serde(default = "default_text_size")]
    pub text_size: u32,

    /// Timestamp annotation colour
    #[serde(default = "default_text_color")]
    pub text_color: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// libcamera through a GStreamer pipeline
    Libcamera,
    /// Generated frames and stream bytes, no hardware required
    Synthetic,
}

/// Recording mode, fixed per deployment
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Segmented,
    Motion,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    /// Segmented recording or motion-triggered snapshots
    #[serde(default = "default_mode")]
    pub mode: CaptureMode,

    /// Directory holding in-progress segments and converted files
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Segment rotation threshold in MiB
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Encoder quality hint
    #[serde(default = "default_quality")]
    pub quality: u32,

    /// Encoder bitrate in bits per second
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// Extension of raw segment files
    #[serde(default = "default_stream_format")]
    pub stream_format: String,

    /// Container produced by the converter
    #[serde(default = "default_upload_format")]
    pub upload_format: String,

    /// ffmpeg probe size
    #[serde(default = "default_probe_size")]
    pub probe_size: String,

    /// Converter executable
    #[serde(default = "default_encoder_program")]
    pub encoder_program: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionConfig {
    /// Per-pixel luminance delta counted as change
    #[serde(default = "default_delta_thresh")]
    pub delta_thresh: u8,

    /// Minimum connected-region area in analysis pixels
    #[serde(default = "default_min_area")]
    pub min_area: u32,

    /// Cooldown between two qualifying events
    #[serde(default = "default_min_upload_seconds")]
    pub min_upload_seconds: f64,

    /// Consecutive occupied frames required to fire
    #[serde(default = "default_min_motion_frames")]
    pub min_motion_frames: u32,

    /// Delay before the first analysed frame of a session
    #[serde(default = "default_camera_warmup_time")]
    pub camera_warmup_time: f64,

    /// Background model smoothing factor
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,

    /// Width frames are resized to before analysis
    #[serde(default = "default_analysis_width")]
    pub analysis_width: u32,

    /// Gaussian blur sigma applied before differencing
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,

    /// 3x3 dilation passes applied to the occupancy mask
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u8,

    /// Draw region boxes and status text on uploaded snapshots
    #[serde(default = "default_annotate")]
    pub annotate: bool,

    /// TrueType font used for snapshot text
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Snapshot JPEG quality
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScheduleConfig {
    /// Switch to the night exposure profile outside daytime
    #[serde(default = "default_night_enabled")]
    pub night_enabled: bool,

    /// Start of day, HH:MM
    #[serde(default = "default_day_start")]
    pub day_start: String,

    /// Start of night, HH:MM
    #[serde(default = "default_night_start")]
    pub night_start: String,

    /// IANA timezone for the boundaries; system local time when unset
    #[serde(default)]
    pub timezone: Option<String>,

    /// Delay before the first camera configuration
    #[serde(default = "default_startup_delay_seconds")]
    pub startup_delay_seconds: f64,

    /// Delay between tearing down and reconfiguring on a day/night change
    #[serde(default = "default_settle_delay_seconds")]
    pub settle_delay_seconds: f64,

    #[serde(default = "default_night_framerate_num")]
    pub night_framerate_num: u32,

    #[serde(default = "default_night_framerate_den")]
    pub night_framerate_den: u32,

    /// Night shutter speed in microseconds
    #[serde(default = "default_night_shutter_us")]
    pub night_shutter_us: u64,

    #[serde(default = "default_night_iso")]
    pub night_iso: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Upload artifacts after capture
    #[serde(default = "default_upload_enabled")]
    pub upload_enabled: bool,

    /// strftime format for the date part of names
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// strftime format for the time part of names
    #[serde(default = "default_time_format")]
    pub time_format: String,

    /// Environment variable holding the upload access token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Upload endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-upload request timeout
    #[serde(default = "default_upload_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Capture session restarts allowed after a fatal device error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Consecutive acquisition failures that end a session
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Time allowed for in-flight handoffs to finish on shutdown
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,
}

impl WatchcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("watchcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.backend", "libcamera")?
            .set_default("camera.resolution_x", default_resolution_x())?
            .set_default("camera.resolution_y", default_resolution_y())?
            .set_default("camera.framerate", default_framerate())?
            .set_default("camera.rotation", default_rotation())?
            .set_default("camera.brightness", default_brightness())?
            .set_default("camera.contrast", default_contrast())?
            .set_default("camera.text_size", default_text_size())?
            .set_default("camera.text_color", default_text_color())?
            .set_default("recording.mode", "motion")?
            .set_default("recording.output_path", default_output_path())?
            .set_default("recording.max_file_size_mb", default_max_file_size_mb())?
            .set_default("recording.quality", default_quality())?
            .set_default("recording.bitrate", default_bitrate())?
            .set_default("recording.stream_format", default_stream_format())?
            .set_default("recording.upload_format", default_upload_format())?
            .set_default("recording.probe_size", default_probe_size())?
            .set_default("recording.encoder_program", default_encoder_program())?
            .set_default("motion.delta_thresh", default_delta_thresh() as u32)?
            .set_default("motion.min_area", default_min_area())?
            .set_default("motion.min_upload_seconds", default_min_upload_seconds())?
            .set_default("motion.min_motion_frames", default_min_motion_frames())?
            .set_default("motion.camera_warmup_time", default_camera_warmup_time())?
            .set_default("motion.smoothing", default_smoothing() as f64)?
            .set_default("motion.analysis_width", default_analysis_width())?
            .set_default("motion.blur_sigma", default_blur_sigma() as f64)?
            .set_default(
                "motion.dilate_iterations",
                default_dilate_iterations() as u32,
            )?
            .set_default("motion.annotate", default_annotate())?
            .set_default("motion.font_path", default_font_path())?
            .set_default("motion.jpeg_quality", default_jpeg_quality() as u32)?
            .set_default("schedule.night_enabled", default_night_enabled())?
            .set_default("schedule.day_start", default_day_start())?
            .set_default("schedule.night_start", default_night_start())?
            .set_default(
                "schedule.startup_delay_seconds",
                default_startup_delay_seconds(),
            )?
            .set_default(
                "schedule.settle_delay_seconds",
                default_settle_delay_seconds(),
            )?
            .set_default("schedule.night_framerate_num", default_night_framerate_num())?
            .set_default("schedule.night_framerate_den", default_night_framerate_den())?
            .set_default("schedule.night_shutter_us", default_night_shutter_us())?
            .set_default("schedule.night_iso", default_night_iso())?
            .set_default("upload.upload_enabled", default_upload_enabled())?
            .set_default("upload.date_format", default_date_format())?
            .set_default("upload.time_format", default_time_format())?
            .set_default("upload.access_token_env", default_access_token_env())?
            .set_default("upload.api_url", default_api_url())?
            .set_default("upload.timeout_seconds", default_upload_timeout_seconds())?
            .set_default("system.max_retries", default_max_retries())?
            .set_default("system.retry_base_delay_ms", default_retry_base_delay_ms())?
            .set_default("system.retry_max_delay_ms", default_retry_max_delay_ms())?
            .set_default(
                "system.max_consecutive_failures",
                default_max_consecutive_failures(),
            )?
            .set_default(
                "system.shutdown_timeout_seconds",
                default_shutdown_timeout_seconds(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment overrides, e.g. WATCHCAM__MOTION__MIN_AREA=8000
            .add_source(
                Environment::with_prefix("WATCHCAM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: WatchcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution_x == 0 || self.camera.resolution_y == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.framerate == 0 {
            return Err(ConfigError::Message(
                "Camera framerate must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.camera.rotation, 0 | 90 | 180 | 270) {
            return Err(ConfigError::Message(format!(
                "Camera rotation must be 0, 90, 180 or 270, got {}",
                self.camera.rotation
            )));
        }

        if self.camera.brightness > 100 {
            return Err(ConfigError::Message(
                "Camera brightness must be within 0..=100".to_string(),
            ));
        }

        if !(-100..=100).contains(&self.camera.contrast) {
            return Err(ConfigError::Message(
                "Camera contrast must be within -100..=100".to_string(),
            ));
        }

        if self.recording.max_file_size_mb == 0 {
            return Err(ConfigError::Message(
                "max_file_size_mb must be greater than 0".to_string(),
            ));
        }

        if !(self.motion.smoothing > 0.0 && self.motion.smoothing <= 1.0) {
            return Err(ConfigError::Message(
                "Motion smoothing must be within (0, 1]".to_string(),
            ));
        }

        if self.motion.min_motion_frames == 0 {
            return Err(ConfigError::Message(
                "min_motion_frames must be greater than 0".to_string(),
            ));
        }

        if self.motion.analysis_width == 0 {
            return Err(ConfigError::Message(
                "Motion analysis_width must be greater than 0".to_string(),
            ));
        }

        if !is_duration_seconds(self.motion.min_upload_seconds)
            || !is_duration_seconds(self.motion.camera_warmup_time)
        {
            return Err(ConfigError::Message(
                "Motion durations must be finite and not negative".to_string(),
            ));
        }

        if !(self.motion.blur_sigma.is_finite() && self.motion.blur_sigma >= 0.0) {
            return Err(ConfigError::Message(
                "Motion blur_sigma must be finite and not negative".to_string(),
            ));
        }

        if !is_duration_seconds(self.schedule.startup_delay_seconds)
            || !is_duration_seconds(self.schedule.settle_delay_seconds)
        {
            return Err(ConfigError::Message(
                "Schedule delays must be finite and not negative".to_string(),
            ));
        }

        if self.schedule.night_framerate_num == 0 || self.schedule.night_framerate_den == 0 {
            return Err(ConfigError::Message(
                "Night framerate fraction must be non-zero".to_string(),
            ));
        }

        self.schedule.boundaries()?;
        self.schedule.tz()?;

        if self.system.max_consecutive_failures == 0 {
            return Err(ConfigError::Message(
                "max_consecutive_failures must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl RecordingConfig {
    /// Byte count at which a segment is full
    pub fn max_segment_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl MotionConfig {
    pub fn min_upload_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_upload_seconds)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs_f64(self.camera_warmup_time)
    }
}

impl ScheduleConfig {
    /// Parsed (start-of-day, start-of-night) boundaries
    pub fn boundaries(&self) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        let day = parse_boundary("day_start", &self.day_start)?;
        let night = parse_boundary("night_start", &self.night_start)?;
        if day == night {
            return Err(ConfigError::Message(
                "day_start and night_start must differ".to_string(),
            ));
        }
        Ok((day, night))
    }

    /// Configured timezone, if any
    pub fn tz(&self) -> Result<Option<Tz>, ConfigError> {
        match &self.timezone {
            Some(name) => name
                .parse::<Tz>()
                .map(Some)
                .map_err(|e| ConfigError::Message(format!("Invalid timezone '{}': {}", name, e))),
            None => Ok(None),
        }
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs_f64(self.startup_delay_seconds)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs_f64(self.settle_delay_seconds)
    }
}

/// Accepted by `Duration::from_secs_f64` without panicking
fn is_duration_seconds(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn parse_boundary(name: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| ConfigError::Message(format!("Invalid {} '{}': {}", name, value, e)))
}

impl Default for WatchcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                backend: default_camera_backend(),
                resolution_x: default_resolution_x(),
                resolution_y: default_resolution_y(),
                framerate: default_framerate(),
                rotation: default_rotation(),
                brightness: default_brightness(),
                contrast: default_contrast(),
                text_size: default_text_size(),
                text_color: default_text_color(),
            },
            recording: RecordingConfig {
                mode: default_mode(),
                output_path: default_output_path(),
                max_file_size_mb: default_max_file_size_mb(),
                quality: default_quality(),
                bitrate: default_bitrate(),
                stream_format: default_stream_format(),
                upload_format: default_upload_format(),
                probe_size: default_probe_size(),
                encoder_program: default_encoder_program(),
            },
            motion: MotionConfig {
                delta_thresh: default_delta_thresh(),
                min_area: default_min_area(),
                min_upload_seconds: default_min_upload_seconds(),
                min_motion_frames: default_min_motion_frames(),
                camera_warmup_time: default_camera_warmup_time(),
                smoothing: default_smoothing(),
                analysis_width: default_analysis_width(),
                blur_sigma: default_blur_sigma(),
                dilate_iterations: default_dilate_iterations(),
                annotate: default_annotate(),
                font_path: default_font_path(),
                jpeg_quality: default_jpeg_quality(),
            },
            schedule: ScheduleConfig {
                night_enabled: default_night_enabled(),
                day_start: default_day_start(),
                night_start: default_night_start(),
                timezone: None,
                startup_delay_seconds: default_startup_delay_seconds(),
                settle_delay_seconds: default_settle_delay_seconds(),
                night_framerate_num: default_night_framerate_num(),
                night_framerate_den: default_night_framerate_den(),
                night_shutter_us: default_night_shutter_us(),
                night_iso: default_night_iso(),
            },
            upload: UploadConfig {
                upload_enabled: default_upload_enabled(),
                date_format: default_date_format(),
                time_format: default_time_format(),
                access_token_env: default_access_token_env(),
                api_url: default_api_url(),
                timeout_seconds: default_upload_timeout_seconds(),
            },
            system: SystemConfig {
                max_retries: default_max_retries(),
                retry_base_delay_ms: default_retry_base_delay_ms(),
                retry_max_delay_ms: default_retry_max_delay_ms(),
                max_consecutive_failures: default_max_consecutive_failures(),
                shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
            },
        }
    }
}

// Default value functions
fn default_camera_backend() -> CameraBackend {
    CameraBackend::Libcamera
}
fn default_resolution_x() -> u32 {
    1280
}
fn default_resolution_y() -> u32 {
    720
}
fn default_framerate() -> u32 {
    15
}
fn default_rotation() -> u32 {
    0
}
fn default_brightness() -> u32 {
    50
}
fn default_contrast() -> i32 {
    0
}
fn default_text_size() -> u32 {
    16
}
fn default_text_color() -> String {
    "#fff".to_string()
}

fn default_mode() -> CaptureMode {
    CaptureMode::Motion
}
fn default_output_path() -> String {
    "./output".to_string()
}
fn default_max_file_size_mb() -> u64 {
    8
}
fn default_quality() -> u32 {
    25
}
fn default_bitrate() -> u32 {
    20_000_000
}
fn default_stream_format() -> String {
    "h264".to_string()
}
fn default_upload_format() -> String {
    "mp4".to_string()
}
fn default_probe_size() -> String {
    "16M".to_string()
}
fn default_encoder_program() -> String {
    "ffmpeg".to_string()
}

fn default_delta_thresh() -> u8 {
    5
}
fn default_min_area() -> u32 {
    5000
}
fn default_min_upload_seconds() -> f64 {
    3.0
}
fn default_min_motion_frames() -> u32 {
    8
}
fn default_camera_warmup_time() -> f64 {
    2.5
}
fn default_smoothing() -> f32 {
    0.5
}
fn default_analysis_width() -> u32 {
    500
}
fn default_blur_sigma() -> f32 {
    3.5
} // Matches a 21x21 Gaussian kernel
fn default_dilate_iterations() -> u8 {
    2
}
fn default_annotate() -> bool {
    true
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_night_enabled() -> bool {
    false
}
fn default_day_start() -> String {
    "09:00".to_string()
}
fn default_night_start() -> String {
    "17:00".to_string()
}
fn default_startup_delay_seconds() -> f64 {
    5.0
}
fn default_settle_delay_seconds() -> f64 {
    10.0
}
fn default_night_framerate_num() -> u32 {
    1
}
fn default_night_framerate_den() -> u32 {
    6
}
fn default_night_shutter_us() -> u64 {
    6_000_000
}
fn default_night_iso() -> u32 {
    800
}

fn default_upload_enabled() -> bool {
    true
}
fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}
fn default_time_format() -> String {
    "%H.%M.%S".to_string()
}
fn default_access_token_env() -> String {
    "DB_ACCESS_TOKEN".to_string()
}
fn default_api_url() -> String {
    "https://content.dropboxapi.com/2/files/upload".to_string()
}
fn default_upload_timeout_seconds() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    2000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_max_consecutive_failures() -> u32 {
    3
}
fn default_shutdown_timeout_seconds() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = WatchcamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recording.max_segment_bytes(), 8 * 1024 * 1024);
        assert_eq!(config.motion.min_upload_interval(), Duration::from_secs(3));
        assert_eq!(config.recording.mode, CaptureMode::Motion);
    }

    #[test]
    fn test_config_validation() {
        let mut config = WatchcamConfig::default();
        config.camera.resolution_x = 0;

        // Should fail validation due to invalid resolution
        assert!(config.validate().is_err());

        config.camera.resolution_x = 1280;
        assert!(config.validate().is_ok());

        config.camera.rotation = 45;
        assert!(config.validate().is_err());
        config.camera.rotation = 270;

        config.schedule.night_start = "25:00".to_string();
        assert!(config.validate().is_err());
        config.schedule.night_start = "17:00".to_string();

        config.schedule.timezone = Some("Mars/Olympus_Mons".to_string());
        assert!(config.validate().is_err());
        config.schedule.timezone = Some("Europe/Stockholm".to_string());
        assert!(config.validate().is_ok());

        config.motion.smoothing = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_durations_rejected() {
        let mut config = WatchcamConfig::default();
        config.motion.min_upload_seconds = f64::NAN;
        assert!(config.validate().is_err());
        config.motion.min_upload_seconds = 3.0;

        config.motion.camera_warmup_time = f64::INFINITY;
        assert!(config.validate().is_err());
        config.motion.camera_warmup_time = 2.5;

        config.schedule.startup_delay_seconds = f64::NAN;
        assert!(config.validate().is_err());
        config.schedule.startup_delay_seconds = 0.0;

        config.schedule.settle_delay_seconds = f64::INFINITY;
        assert!(config.validate().is_err());
        config.schedule.settle_delay_seconds = -1.0;
        assert!(config.validate().is_err());
        config.schedule.settle_delay_seconds = 10.0;

        config.motion.blur_sigma = f32::NAN;
        assert!(config.validate().is_err());
        config.motion.blur_sigma = 3.5;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_boundaries_parse() {
        let config = WatchcamConfig::default();
        let (day, night) = config.schedule.boundaries().unwrap();
        assert_eq!(day, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(night, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchcam.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[recording]\nmode = \"segmented\"\nmax_file_size_mb = 16\n\n[schedule]\nnight_enabled = true\nnight_start = \"18:30\""
        )
        .unwrap();

        let config = WatchcamConfig::load_from_file(&path).unwrap();
        assert_eq!(config.recording.mode, CaptureMode::Segmented);
        assert_eq!(config.recording.max_file_size_mb, 16);
        assert!(config.schedule.night_enabled);
        assert_eq!(config.schedule.night_start, "18:30");
        // Untouched sections keep their defaults
        assert_eq!(config.motion.min_area, 5000);
        assert_eq!(config.camera.backend, CameraBackend::Libcamera);
        assert!(config.validate().is_ok());
    }
}
