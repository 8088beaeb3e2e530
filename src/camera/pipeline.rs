//! GStreamer launch descriptions for the libcamera backend.
//!
//! Kept free of GStreamer types so the strings can be checked without a
//! camera or the GStreamer runtime.

use super::interface::CameraSettings;
use crate::frame::Rotation;

/// Shared head of both pipelines: source, caps, orientation and image controls
pub fn source_description(settings: &CameraSettings) -> String {
    let exposure = &settings.exposure;
    let mut source = String::from("libcamerasrc");

    if !exposure.auto_exposure {
        source.push_str(&format!(
            " ae-enable=false exposure-time={} analogue-gain={:.1}",
            exposure.shutter_us,
            iso_to_gain(exposure.iso)
        ));
    }

    format!(
        "{} ! video/x-raw,width={},height={},framerate={}/{} ! \
         videoflip method={} ! \
         videobalance brightness={:.2} contrast={:.2}",
        source,
        settings.width,
        settings.height,
        exposure.framerate_num,
        exposure.framerate_den,
        videoflip_method(settings.rotation),
        brightness_to_balance(settings.brightness),
        contrast_to_balance(settings.contrast),
    )
}

/// Raw 8-bit luminance frames for motion analysis
pub fn frame_pipeline(settings: &CameraSettings) -> String {
    format!(
        "{} ! videoconvert ! video/x-raw,format=GRAY8 ! \
         appsink name=sink sync=false max-buffers=2 drop=true enable-last-sample=false",
        source_description(settings)
    )
}

/// Timestamped H.264 byte stream for segmented recording.
///
/// One IDR per second of video so segments can be split at a keyframe.
pub fn stream_pipeline(settings: &CameraSettings) -> String {
    format!(
        "{} ! clockoverlay time-format=\"%Y-%m-%d %H:%M:%S\" font-desc=\"Sans {}\" color={} ! \
         videoconvert ! \
         x264enc bitrate={} quantizer={} key-int-max={} speed-preset=ultrafast tune=zerolatency ! \
         h264parse config-interval=-1 ! video/x-h264,stream-format=byte-stream,alignment=au ! \
         appsink name=sink sync=false max-buffers=64 drop=false enable-last-sample=false",
        source_description(settings),
        settings.text_size,
        parse_text_color(&settings.text_color),
        (settings.bitrate / 1000).max(1),
        settings.quality,
        keyframe_interval(settings),
    )
}

/// Frames per second, rounded up; at least one
fn keyframe_interval(settings: &CameraSettings) -> u32 {
    let exposure = &settings.exposure;
    exposure
        .framerate_num
        .div_ceil(exposure.framerate_den.max(1))
        .max(1)
}

fn videoflip_method(rotation: Rotation) -> u8 {
    match rotation {
        Rotation::None => 0,
        Rotation::Rotate90 => 1,
        Rotation::Rotate180 => 2,
        Rotation::Rotate270 => 3,
    }
}

/// 0..=100 with 50 neutral onto videobalance's -1..=1
fn brightness_to_balance(brightness: u32) -> f64 {
    (brightness.min(100) as f64 - 50.0) / 50.0
}

/// -100..=100 with 0 neutral onto videobalance's 0..=2
fn contrast_to_balance(contrast: i32) -> f64 {
    1.0 + contrast.clamp(-100, 100) as f64 / 100.0
}

fn iso_to_gain(iso: u32) -> f64 {
    (iso as f64 / 100.0).max(1.0)
}

/// `#rgb` or `#rrggbb` as an opaque ARGB word; white when unparseable
pub fn parse_text_color(color: &str) -> u32 {
    let hex = color.trim().trim_start_matches('#');
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => return 0xffff_ffff,
    };

    u32::from_str_radix(&expanded, 16)
        .map(|rgb| 0xff00_0000 | rgb)
        .unwrap_or(0xffff_ffff)
}
