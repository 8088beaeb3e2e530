use super::interface::{Camera, CameraSettings};
use crate::error::{CameraError, Result};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace};

#[derive(Debug, Default)]
struct SyntheticState {
    frames: VecDeque<std::result::Result<FrameData, CameraError>>,
    chunks: VecDeque<std::result::Result<Vec<u8>, CameraError>>,
    configure_failures: VecDeque<CameraError>,
    configured: Vec<CameraSettings>,
    streams_opened: u32,
    shutdowns: u32,
    open: bool,
    streaming: bool,
}

/// Camera without hardware.
///
/// Scripted frames, stream chunks and failures are served first; once the
/// script runs dry it produces a static mid-grey scene and fixed-size
/// stream chunks that each open with an IDR slice. Clones share the script and the call history, so a test
/// can keep one handle while the controller owns another.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    state: Arc<Mutex<SyntheticState>>,
    settings: Option<CameraSettings>,
    frame_counter: u64,
    chunk_size: usize,
    paced: bool,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SyntheticState::default())),
            settings: None,
            frame_counter: 0,
            chunk_size: 64 * 1024,
            paced: false,
        }
    }

    /// Bytes returned per `read_stream` once the script is exhausted
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sleep for a frame interval or read window like real hardware would
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    pub fn push_frame(&self, frame: FrameData) {
        self.state.lock().frames.push_back(Ok(frame));
    }

    pub fn push_frame_error(&self, error: CameraError) {
        self.state.lock().frames.push_back(Err(error));
    }

    pub fn push_stream_chunk(&self, chunk: Vec<u8>) {
        self.state.lock().chunks.push_back(Ok(chunk));
    }

    pub fn push_stream_error(&self, error: CameraError) {
        self.state.lock().chunks.push_back(Err(error));
    }

    pub fn fail_next_configure(&self, error: CameraError) {
        self.state.lock().configure_failures.push_back(error);
    }

    /// Every settings snapshot successfully applied, oldest first
    pub fn configured_settings(&self) -> Vec<CameraSettings> {
        self.state.lock().configured.clone()
    }

    pub fn streams_opened(&self) -> u32 {
        self.state.lock().streams_opened
    }

    pub fn shutdown_count(&self) -> u32 {
        self.state.lock().shutdowns
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Frame with every pixel at `level`
    pub fn uniform_frame(id: u64, width: u32, height: u32, level: u8) -> FrameData {
        FrameData::new(
            id,
            SystemTime::now(),
            vec![level; width as usize * height as usize],
            width,
            height,
            FrameFormat::Gray8,
        )
    }

    /// Uniform frame with a `(x, y, w, h)` block at `block_level`
    pub fn block_frame(
        id: u64,
        width: u32,
        height: u32,
        level: u8,
        block: (u32, u32, u32, u32),
        block_level: u8,
    ) -> FrameData {
        let (bx, by, bw, bh) = block;
        let mut data = vec![level; width as usize * height as usize];
        for y in by..(by + bh).min(height) {
            for x in bx..(bx + bw).min(width) {
                data[(y * width + x) as usize] = block_level;
            }
        }
        FrameData::new(id, SystemTime::now(), data, width, height, FrameFormat::Gray8)
    }

    /// `len` bytes opening with an IDR slice start code, zero-padded
    pub fn keyframe_chunk(len: usize) -> Vec<u8> {
        Self::nal_chunk(len, 0x65)
    }

    /// `len` bytes opening with a non-IDR slice start code, zero-padded
    pub fn predicted_chunk(len: usize) -> Vec<u8> {
        Self::nal_chunk(len, 0x41)
    }

    fn nal_chunk(len: usize, nal_header: u8) -> Vec<u8> {
        let head = [0, 0, 0, 1, nal_header];
        let mut chunk = vec![0u8; len];
        let n = head.len().min(len);
        chunk[..n].copy_from_slice(&head[..n]);
        chunk
    }

    fn require_open(&self) -> Result<&CameraSettings> {
        match (&self.settings, self.state.lock().open) {
            (Some(settings), true) => Ok(settings),
            _ => Err(CameraError::Configuration {
                details: "Synthetic camera used before configure".to_string(),
            }
            .into()),
        }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Camera for SyntheticCamera {
    async fn configure(&mut self, settings: &CameraSettings) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(error) = state.configure_failures.pop_front() {
            return Err(error.into());
        }

        info!(
            "Synthetic camera configured for {} ({}x{})",
            settings.time_state, settings.width, settings.height
        );
        state.configured.push(settings.clone());
        state.open = true;
        drop(state);

        self.settings = Some(settings.clone());
        Ok(())
    }

    async fn capture_frame(&mut self) -> Result<FrameData> {
        let settings = self.require_open()?.clone();
        if self.paced {
            tokio::time::sleep(settings.exposure.frame_interval()).await;
        }

        self.frame_counter += 1;
        let scripted = self.state.lock().frames.pop_front();
        match scripted {
            Some(Ok(frame)) => {
                trace!("Serving scripted frame {}", frame.id);
                Ok(frame)
            }
            Some(Err(error)) => Err(error.into()),
            None => Ok(Self::uniform_frame(
                self.frame_counter,
                settings.width,
                settings.height,
                128,
            )),
        }
    }

    async fn open_segment_stream(&mut self) -> Result<()> {
        self.require_open()?;
        let mut state = self.state.lock();
        state.streaming = true;
        state.streams_opened += 1;
        debug!("Synthetic stream opened");
        Ok(())
    }

    async fn read_stream(&mut self, wait: Duration) -> Result<Vec<u8>> {
        self.require_open()?;
        let streaming = self.state.lock().streaming;
        if !streaming {
            return Err(CameraError::CaptureStream {
                details: "Stream is not open".to_string(),
            }
            .into());
        }
        if self.paced {
            tokio::time::sleep(wait).await;
        }

        let scripted = self.state.lock().chunks.pop_front();
        match scripted {
            Some(Ok(chunk)) => Ok(chunk),
            Some(Err(error)) => Err(error.into()),
            None => Ok(Self::keyframe_chunk(self.chunk_size)),
        }
    }

    async fn close_segment_stream(&mut self) -> Result<()> {
        self.state.lock().streaming = false;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.open = false;
        state.streaming = false;
        state.shutdowns += 1;
        debug!("Synthetic camera released");
        Ok(())
    }

    fn applied_settings(&self) -> Option<&CameraSettings> {
        self.settings.as_ref()
    }
}
