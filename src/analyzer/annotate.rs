use super::motion::FrameAnalysis;
use crate::config::MotionConfig;
use crate::error::HandoffError;
use crate::frame::{FrameData, FrameFormat};

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::{debug, warn};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// strftime pattern for the capture time drawn on snapshots
pub const SNAPSHOT_TIME_FORMAT: &str = "%A %d %B %Y %I:%M:%S%p";

/// Draws region boxes and status text on qualifying frames and encodes JPEG
pub struct SnapshotAnnotator {
    font: Option<Font<'static>>,
    annotate: bool,
    min_area: u32,
    jpeg_quality: u8,
    text_size: f32,
}

impl SnapshotAnnotator {
    /// Load the configured font; text is skipped when it cannot be loaded
    pub fn new(config: &MotionConfig, text_size: u32) -> Self {
        let font = if config.annotate {
            load_font(&config.font_path)
        } else {
            None
        };

        Self {
            font,
            annotate: config.annotate,
            min_area: config.min_area,
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
            text_size: text_size.max(8) as f32,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Annotated copy of `frame` as an RGB image
    pub fn draw(
        &self,
        frame: &FrameData,
        analysis: &FrameAnalysis,
        timestamp: &str,
    ) -> Result<RgbImage, HandoffError> {
        let mut img = frame_to_rgb(frame)?;
        if !self.annotate {
            return Ok(img);
        }

        let scale_x = img.width() as f32 / analysis.analysis_width.max(1) as f32;
        let scale_y = img.height() as f32 / analysis.analysis_height.max(1) as f32;

        for region in analysis.qualifying_regions(self.min_area) {
            let x = (region.x as f32 * scale_x) as i32;
            let y = (region.y as f32 * scale_y) as i32;
            let w = ((region.width as f32 * scale_x) as u32).max(1);
            let h = ((region.height as f32 * scale_y) as u32).max(1);

            draw_hollow_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), BOX_COLOR);
            // Second pass one pixel inside for a 2 px outline
            if w > 2 && h > 2 {
                draw_hollow_rect_mut(
                    &mut img,
                    Rect::at(x + 1, y + 1).of_size(w - 2, h - 2),
                    BOX_COLOR,
                );
            }
        }

        if let Some(font) = &self.font {
            let scale = Scale::uniform(self.text_size);
            draw_text_mut(&mut img, TEXT_COLOR, 10, 10, scale, font, "Room Status: Occupied");

            let small = Scale::uniform(self.text_size * 0.75);
            let (_, text_height) = text_size(small, font, timestamp);
            let y = img.height() as i32 - text_height - 10;
            draw_text_mut(&mut img, TEXT_COLOR, 10, y.max(0), small, font, timestamp);
        }

        Ok(img)
    }

    /// Annotate and JPEG-encode a qualifying frame
    pub fn render(
        &self,
        frame: &FrameData,
        analysis: &FrameAnalysis,
        timestamp: &str,
    ) -> Result<Vec<u8>, HandoffError> {
        let img = self.draw(frame, analysis, timestamp)?;

        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.jpeg_quality)
            .encode_image(&img)
            .map_err(|e| HandoffError::Snapshot {
                details: format!("Failed to encode JPEG: {}", e),
            })?;

        debug!(
            "Rendered snapshot of frame {} ({} bytes)",
            frame.id,
            output.len()
        );
        Ok(output)
    }
}

fn load_font(path: &str) -> Option<Font<'static>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to read font file '{}': {}; snapshots will have no text", path, e);
            return None;
        }
    };

    let font = Font::try_from_vec(data);
    if font.is_none() {
        warn!("Failed to parse font file '{}'; snapshots will have no text", path);
    }
    font
}

fn frame_to_rgb(frame: &FrameData) -> Result<RgbImage, HandoffError> {
    if !frame.validate_size() {
        return Err(HandoffError::Snapshot {
            details: format!("Frame {} has an unexpected buffer size", frame.id),
        });
    }

    let rgb: Vec<u8> = match frame.format {
        FrameFormat::Rgb24 => frame.data.to_vec(),
        FrameFormat::Gray8 => frame.data.iter().flat_map(|&y| [y, y, y]).collect(),
        FrameFormat::Yuyv => frame
            .data
            .chunks_exact(4)
            .flat_map(|px| {
                let (y0, u, y1, v) = (px[0], px[1], px[2], px[3]);
                let [r0, g0, b0] = yuv_to_rgb(y0, u, v);
                let [r1, g1, b1] = yuv_to_rgb(y1, u, v);
                [r0, g0, b0, r1, g1, b1]
            })
            .collect(),
    };

    RgbImage::from_raw(frame.width, frame.height, rgb).ok_or_else(|| HandoffError::Snapshot {
        details: format!("Frame {} could not be wrapped as an image", frame.id),
    })
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let clamp = |x: f32| x.round().clamp(0.0, 255.0) as u8;
    [
        clamp(y + 1.402 * v),
        clamp(y - 0.344_136 * u - 0.714_136 * v),
        clamp(y + 1.772 * u),
    ]
}
