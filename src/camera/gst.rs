use super::interface::{Camera, CameraSettings};
use super::pipeline::{frame_pipeline, stream_pipeline};
use crate::error::{CameraError, Result, WatchcamError};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Frames,
    Stream,
}

struct ActivePipeline {
    kind: PipelineKind,
    pipeline: Pipeline,
    appsink: AppSink,
}

/// libcamera sensor driven through GStreamer
pub struct LibcameraCamera {
    settings: Option<CameraSettings>,
    active: Option<ActivePipeline>,
    frame_counter: u64,
}

impl LibcameraCamera {
    pub fn new() -> Result<Self> {
        gstreamer::init().map_err(|e| CameraError::DeviceOpen {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self {
            settings: None,
            active: None,
            frame_counter: 0,
        })
    }

    fn settings(&self) -> Result<&CameraSettings> {
        self.settings.as_ref().ok_or_else(|| {
            CameraError::Configuration {
                details: "Camera used before configure".to_string(),
            }
            .into()
        })
    }

    /// Frames can take a full exposure to arrive at night
    fn frame_timeout(&self) -> Duration {
        self.settings
            .as_ref()
            .map(|s| s.exposure.frame_interval() * 2 + Duration::from_secs(2))
            .unwrap_or(Duration::from_secs(5))
    }

    fn launch(description: &str) -> Result<(Pipeline, AppSink)> {
        debug!("Creating GStreamer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink named 'sink'".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Element 'sink' is not an AppSink".to_string(),
            })?;

        Ok((pipeline, appsink))
    }

    fn start(&mut self, kind: PipelineKind) -> Result<()> {
        if matches!(&self.active, Some(active) if active.kind == kind) {
            return Ok(());
        }
        self.stop();

        let settings = self.settings()?;
        let description = match kind {
            PipelineKind::Frames => frame_pipeline(settings),
            PipelineKind::Stream => stream_pipeline(settings),
        };
        let (pipeline, appsink) = Self::launch(&description)?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::DeviceOpen {
                details: format!("Failed to start {:?} pipeline: {}", kind, e),
            })?;

        info!("Started {:?} pipeline", kind);
        self.active = Some(ActivePipeline {
            kind,
            pipeline,
            appsink,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.pipeline.set_state(gstreamer::State::Null) {
                warn!("Failed to stop {:?} pipeline cleanly: {}", active.kind, e);
            } else {
                debug!("Stopped {:?} pipeline", active.kind);
            }
        }
    }

    fn appsink(&self, kind: PipelineKind) -> Result<AppSink> {
        match &self.active {
            Some(active) if active.kind == kind => Ok(active.appsink.clone()),
            _ => Err(CameraError::CaptureStream {
                details: format!("{:?} pipeline is not running", kind),
            }
            .into()),
        }
    }

    /// Blocking pull moved off the async runtime; `(sample, eos)`
    async fn pull(
        appsink: AppSink,
        timeout: Duration,
    ) -> Result<(Option<gstreamer::Sample>, bool)> {
        tokio::task::spawn_blocking(move || {
            let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
            let sample = appsink.try_pull_sample(gstreamer::ClockTime::from_nseconds(nanos));
            let eos = sample.is_none() && appsink.is_eos();
            (sample, eos)
        })
        .await
        .map_err(|e| WatchcamError::component("camera", format!("Pull task failed: {}", e)))
    }

    fn sample_to_frame(&mut self, sample: &gstreamer::Sample) -> Result<FrameData> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;
        let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
            details: "No caps in sample".to_string(),
        })?;
        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to get video info: {}", e),
        })?;
        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to map buffer: {}", e),
            })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0].max(0) as usize;
        let row = width as usize;

        // Drop row padding so the frame is tightly packed
        let data = if stride == row {
            map.as_slice().to_vec()
        } else {
            let mut packed = Vec::with_capacity(row * height as usize);
            for line in map.as_slice().chunks(stride).take(height as usize) {
                packed.extend_from_slice(&line[..row.min(line.len())]);
            }
            packed
        };

        self.frame_counter += 1;
        trace!(
            "Captured frame {} ({}x{}, {} bytes)",
            self.frame_counter,
            width,
            height,
            data.len()
        );

        Ok(FrameData::new(
            self.frame_counter,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Gray8,
        ))
    }
}

#[async_trait]
impl Camera for LibcameraCamera {
    async fn configure(&mut self, settings: &CameraSettings) -> Result<()> {
        self.stop();

        info!(
            "Configuring libcamera for {} ({}x{} @ {}/{} fps)",
            settings.time_state,
            settings.width,
            settings.height,
            settings.exposure.framerate_num,
            settings.exposure.framerate_den
        );

        // Open the device with the new settings once before accepting them
        let (pipeline, _) = Self::launch(&frame_pipeline(settings))?;
        pipeline
            .set_state(gstreamer::State::Ready)
            .map_err(|e| CameraError::DeviceOpen {
                details: format!("Camera did not reach READY: {}", e),
            })?;
        pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to reset trial pipeline: {}", e),
            })?;

        self.settings = Some(settings.clone());
        Ok(())
    }

    async fn capture_frame(&mut self) -> Result<FrameData> {
        self.start(PipelineKind::Frames)?;
        let timeout = self.frame_timeout();
        let appsink = self.appsink(PipelineKind::Frames)?;

        match Self::pull(appsink, timeout).await? {
            (Some(sample), _) => self.sample_to_frame(&sample),
            (None, true) => {
                self.stop();
                Err(CameraError::Disconnected.into())
            }
            (None, false) => Err(CameraError::FrameTimeout { timeout }.into()),
        }
    }

    async fn open_segment_stream(&mut self) -> Result<()> {
        self.start(PipelineKind::Stream)
    }

    async fn read_stream(&mut self, wait: Duration) -> Result<Vec<u8>> {
        let appsink = self.appsink(PipelineKind::Stream)?;
        let deadline = Instant::now() + wait;
        let mut bytes = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match Self::pull(appsink.clone(), remaining).await? {
                (Some(sample), _) => {
                    if let Some(buffer) = sample.buffer() {
                        let map = buffer
                            .map_readable()
                            .map_err(|e| CameraError::CaptureStream {
                                details: format!("Failed to map buffer: {}", e),
                            })?;
                        bytes.extend_from_slice(map.as_slice());
                    }
                }
                (None, true) => {
                    self.stop();
                    return Err(CameraError::Disconnected.into());
                }
                (None, false) => break,
            }

            if remaining.is_zero() {
                break;
            }
        }

        trace!("Read {} stream bytes", bytes.len());
        Ok(bytes)
    }

    async fn close_segment_stream(&mut self) -> Result<()> {
        if matches!(&self.active, Some(active) if active.kind == PipelineKind::Stream) {
            self.stop();
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.stop();
        info!("libcamera released");
        Ok(())
    }

    fn applied_settings(&self) -> Option<&CameraSettings> {
        self.settings.as_ref()
    }
}

impl Drop for LibcameraCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
