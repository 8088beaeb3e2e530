use crate::config::MotionConfig;
use crate::error::AnalyzerError;
use crate::frame::{FrameData, FrameFormat};

use image::{imageops, GrayImage, ImageBuffer, Luma};
use imageproc::{
    contrast::threshold,
    distance_transform::Norm,
    filter::gaussian_blur_f32,
    morphology::dilate,
    region_labelling::{connected_components, Connectivity},
};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// Bounding box and pixel count of one connected changed region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: u32,
}

/// Outcome of analysing one frame against the background model
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub occupied: bool,
    /// All regions, largest first, in analysis-image coordinates
    pub regions: Vec<MotionRegion>,
    pub analysis_width: u32,
    pub analysis_height: u32,
}

impl FrameAnalysis {
    pub fn largest_area(&self) -> u32 {
        self.regions.first().map(|r| r.area).unwrap_or(0)
    }

    /// Regions large enough to count as occupancy
    pub fn qualifying_regions(&self, min_area: u32) -> impl Iterator<Item = &MotionRegion> {
        self.regions.iter().filter(move |r| r.area >= min_area)
    }
}

/// Per-pixel running average of luminance
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

impl BackgroundModel {
    /// Seed the model from the first frame of a session
    pub fn seed(frame: &GrayImage) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            pixels: frame.pixels().map(|p| p[0] as f32).collect(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// `model = alpha * frame + (1 - alpha) * model`
    pub fn accumulate(&mut self, frame: &GrayImage, alpha: f32) {
        for (model, pixel) in self.pixels.iter_mut().zip(frame.pixels()) {
            *model = alpha * pixel[0] as f32 + (1.0 - alpha) * *model;
        }
    }

    /// `|frame - round(model)|` per pixel
    pub fn difference(&self, frame: &GrayImage) -> GrayImage {
        let mut diff = GrayImage::new(self.width, self.height);
        for ((out, pixel), model) in diff
            .pixels_mut()
            .zip(frame.pixels())
            .zip(self.pixels.iter())
        {
            let reference = model.round().clamp(0.0, 255.0) as i16;
            out[0] = (pixel[0] as i16 - reference).unsigned_abs() as u8;
        }
        diff
    }
}

/// Convert a captured frame to 8-bit luminance
pub fn to_luma(frame: &FrameData) -> Result<GrayImage, AnalyzerError> {
    if !frame.validate_size() {
        return Err(AnalyzerError::FrameProcessing {
            details: format!(
                "Frame {} has {} bytes, expected {} for {}x{} {:?}",
                frame.id,
                frame.data.len(),
                frame.expected_size(),
                frame.width,
                frame.height,
                frame.format
            ),
        });
    }

    let luma: Vec<u8> = match frame.format {
        FrameFormat::Gray8 => frame.data.to_vec(),
        // Y0 U Y1 V: every even byte is luminance
        FrameFormat::Yuyv => frame.data.iter().step_by(2).copied().collect(),
        FrameFormat::Rgb24 => frame
            .data
            .chunks_exact(3)
            .map(|rgb| {
                (0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32).round()
                    as u8
            })
            .collect(),
    };

    GrayImage::from_raw(frame.width, frame.height, luma).ok_or_else(|| {
        AnalyzerError::FrameProcessing {
            details: format!("Frame {} could not be wrapped as an image", frame.id),
        }
    })
}

/// Resize to the analysis width (keeping aspect) and blur
pub fn preprocess(gray: GrayImage, analysis_width: u32, blur_sigma: f32) -> GrayImage {
    let resized = if analysis_width > 0 && gray.width() != analysis_width {
        let height = ((gray.height() as f64 * analysis_width as f64 / gray.width() as f64)
            .round() as u32)
            .max(1);
        imageops::resize(&gray, analysis_width, height, imageops::FilterType::Triangle)
    } else {
        gray
    };

    if blur_sigma > 0.0 {
        gaussian_blur_f32(&resized, blur_sigma)
    } else {
        resized
    }
}

/// Background-model motion analysis for one capture session
pub struct MotionAnalyzer {
    config: MotionConfig,
    model: Option<BackgroundModel>,
    frames_analyzed: u64,
}

impl MotionAnalyzer {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            model: None,
            frames_analyzed: 0,
        }
    }

    /// Discard the background model; the next frame re-seeds it
    pub fn reset(&mut self) {
        if self.model.take().is_some() {
            debug!(
                "Background model discarded after {} frames",
                self.frames_analyzed
            );
        }
        self.frames_analyzed = 0;
    }

    /// True until a frame has seeded the model
    pub fn is_warming(&self) -> bool {
        self.model.is_none()
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn model(&self) -> Option<&BackgroundModel> {
        self.model.as_ref()
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Analyse a captured frame. `None` while warming.
    pub fn analyze(&mut self, frame: &FrameData) -> Result<Option<FrameAnalysis>, AnalyzerError> {
        trace!(
            "Analyzing frame {} ({}x{}, {:?})",
            frame.id,
            frame.width,
            frame.height,
            frame.format
        );
        let gray = preprocess(
            to_luma(frame)?,
            self.config.analysis_width,
            self.config.blur_sigma,
        );
        Ok(self.analyze_preprocessed(&gray))
    }

    /// Analyse an already preprocessed luminance image. `None` while warming.
    pub fn analyze_preprocessed(&mut self, gray: &GrayImage) -> Option<FrameAnalysis> {
        let reseed = match &self.model {
            Some(model) => model.dimensions() != gray.dimensions(),
            None => true,
        };
        if reseed {
            if self.model.is_some() {
                info!("Frame size changed, re-seeding background model");
            } else {
                info!(
                    "Seeding background model from {}x{} frame",
                    gray.width(),
                    gray.height()
                );
            }
            self.model = Some(BackgroundModel::seed(gray));
            return None;
        }
        let model = self.model.as_mut()?;

        // Model first, then difference against the updated model
        model.accumulate(gray, self.config.smoothing);
        let diff = model.difference(gray);
        let mut mask = threshold(&diff, self.config.delta_thresh);
        if self.config.dilate_iterations > 0 {
            mask = dilate(&mask, Norm::LInf, self.config.dilate_iterations);
        }

        let regions = find_regions(&mask);
        let occupied = regions.iter().any(|r| r.area >= self.config.min_area);
        self.frames_analyzed += 1;

        debug!(
            "Frame analysed: {} regions, largest {} px, occupied={}",
            regions.len(),
            regions.first().map(|r| r.area).unwrap_or(0),
            occupied
        );

        Some(FrameAnalysis {
            occupied,
            regions,
            analysis_width: gray.width(),
            analysis_height: gray.height(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct RegionBounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u32,
}

/// 8-connected regions of the mask, largest first
fn find_regions(mask: &GrayImage) -> Vec<MotionRegion> {
    let labels: ImageBuffer<Luma<u32>, Vec<u32>> =
        connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut bounds: HashMap<u32, RegionBounds> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        bounds
            .entry(label)
            .and_modify(|b| {
                b.min_x = b.min_x.min(x);
                b.min_y = b.min_y.min(y);
                b.max_x = b.max_x.max(x);
                b.max_y = b.max_y.max(y);
                b.area += 1;
            })
            .or_insert(RegionBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                area: 1,
            });
    }

    let mut regions: Vec<MotionRegion> = bounds
        .into_values()
        .map(|b| MotionRegion {
            x: b.min_x,
            y: b.min_y,
            width: b.max_x - b.min_x + 1,
            height: b.max_y - b.min_y + 1,
            area: b.area,
        })
        .collect();
    regions.sort_by(|a, b| b.area.cmp(&a.area).then(a.y.cmp(&b.y)).then(a.x.cmp(&b.x)));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SyntheticCamera;
    use crate::config::WatchcamConfig;
    use std::time::SystemTime;

    /// Analysis at native size with no blur or dilation, so areas are exact
    fn create_test_config() -> MotionConfig {
        let mut config = WatchcamConfig::default().motion;
        config.analysis_width = 200;
        config.blur_sigma = 0.0;
        config.dilate_iterations = 0;
        config
    }

    #[test]
    fn test_first_frame_seeds_model() {
        let mut analyzer = MotionAnalyzer::new(create_test_config());
        assert!(analyzer.is_warming());

        let frame = SyntheticCamera::uniform_frame(1, 200, 100, 50);
        assert!(analyzer.analyze(&frame).unwrap().is_none());
        assert!(!analyzer.is_warming());
        assert_eq!(analyzer.model().unwrap().value(10, 10), 50.0);
    }

    #[test]
    fn test_ema_update() {
        let mut model = BackgroundModel::seed(&GrayImage::from_pixel(2, 2, Luma([100])));
        model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200])), 0.5);
        assert_eq!(model.value(0, 0), 150.0);
        model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200])), 0.5);
        assert_eq!(model.value(1, 1), 175.0);
    }

    #[test]
    fn test_large_block_is_occupied() {
        let mut analyzer = MotionAnalyzer::new(create_test_config());
        analyzer.analyze(&SyntheticCamera::uniform_frame(1, 200, 100, 50)).unwrap();

        // 100 x 60 = 6000 px changed by 200 levels; the model moves half way
        let frame = SyntheticCamera::block_frame(2, 200, 100, 50, (10, 20, 100, 60), 250);
        let analysis = analyzer.analyze(&frame).unwrap().unwrap();

        assert!(analysis.occupied);
        assert_eq!(analysis.largest_area(), 6000);
        assert_eq!(
            analysis.regions[0],
            MotionRegion {
                x: 10,
                y: 20,
                width: 100,
                height: 60,
                area: 6000
            }
        );
    }

    #[test]
    fn test_small_block_is_not_occupied() {
        let mut analyzer = MotionAnalyzer::new(create_test_config());
        analyzer.analyze(&SyntheticCamera::uniform_frame(1, 200, 100, 50)).unwrap();

        let frame = SyntheticCamera::block_frame(2, 200, 100, 50, (0, 0, 40, 40), 250);
        let analysis = analyzer.analyze(&frame).unwrap().unwrap();

        assert!(!analysis.occupied);
        assert_eq!(analysis.largest_area(), 1600);
        assert_eq!(analysis.qualifying_regions(5000).count(), 0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut config = create_test_config();
        config.min_area = 1;
        let mut analyzer = MotionAnalyzer::new(config);
        analyzer.analyze(&SyntheticCamera::uniform_frame(1, 200, 100, 100)).unwrap();

        // Model becomes 105, difference exactly 5: not above the threshold
        let frame = SyntheticCamera::uniform_frame(2, 200, 100, 110);
        let analysis = analyzer.analyze(&frame).unwrap().unwrap();
        assert!(!analysis.occupied);
        assert!(analysis.regions.is_empty());
    }

    #[test]
    fn test_slow_drift_is_absorbed() {
        let mut analyzer = MotionAnalyzer::new(create_test_config());
        analyzer.analyze(&SyntheticCamera::uniform_frame(1, 200, 100, 100)).unwrap();

        for (i, level) in (101..=130u8).enumerate() {
            let frame = SyntheticCamera::uniform_frame(i as u64 + 2, 200, 100, level);
            let analysis = analyzer.analyze(&frame).unwrap().unwrap();
            assert!(!analysis.occupied, "level {}", level);
        }
    }

    #[test]
    fn test_reset_reseeds() {
        let mut analyzer = MotionAnalyzer::new(create_test_config());
        analyzer.analyze(&SyntheticCamera::uniform_frame(1, 200, 100, 50)).unwrap();
        analyzer.analyze(&SyntheticCamera::uniform_frame(2, 200, 100, 50)).unwrap();
        assert_eq!(analyzer.frames_analyzed(), 1);

        analyzer.reset();
        assert!(analyzer.is_warming());
        let frame = SyntheticCamera::block_frame(3, 200, 100, 50, (0, 0, 100, 100), 250);
        assert!(analyzer.analyze(&frame).unwrap().is_none());
    }

    #[test]
    fn test_preprocess_resizes_and_keeps_aspect() {
        let gray = GrayImage::from_pixel(1000, 600, Luma([80]));
        let out = preprocess(gray, 500, 3.5);
        assert_eq!(out.dimensions(), (500, 300));
    }

    #[test]
    fn test_dilation_grows_regions() {
        let mut config = create_test_config();
        config.dilate_iterations = 2;
        config.min_area = 1;
        let mut analyzer = MotionAnalyzer::new(config);
        analyzer.analyze(&SyntheticCamera::uniform_frame(1, 200, 100, 50)).unwrap();

        let frame = SyntheticCamera::block_frame(2, 200, 100, 50, (50, 50, 10, 10), 250);
        let analysis = analyzer.analyze(&frame).unwrap().unwrap();
        // Two 3x3 passes add two pixels on every side
        assert_eq!(analysis.regions[0].area, 14 * 14);
    }

    #[test]
    fn test_rgb_and_yuyv_luma() {
        let rgb = FrameData::new(
            1,
            SystemTime::now(),
            vec![255, 255, 255, 0, 0, 0],
            2,
            1,
            FrameFormat::Rgb24,
        );
        let gray = to_luma(&rgb).unwrap();
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);

        let yuyv = FrameData::new(
            2,
            SystemTime::now(),
            vec![10, 128, 20, 128],
            2,
            1,
            FrameFormat::Yuyv,
        );
        let gray = to_luma(&yuyv).unwrap();
        assert_eq!(gray.as_raw(), &vec![10, 20]);

        let truncated = FrameData::new(3, SystemTime::now(), vec![0; 3], 2, 2, FrameFormat::Gray8);
        assert!(to_luma(&truncated).is_err());
    }
}
