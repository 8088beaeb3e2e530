use super::encode::Encoder;
use super::upload::Uploader;
use crate::error::HandoffError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Encoder that copies the source to the target, or fails on request
#[derive(Debug, Clone, Default)]
pub struct MockEncoder {
    pub fail: bool,
    pub delay: Option<Duration>,
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf, String)>>>,
}

impl MockEncoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Takes `delay` per conversion before writing the target
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// `(source, target, framerate)` per call
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        framerate: &str,
    ) -> Result<(), HandoffError> {
        self.calls.lock().push((
            source.to_path_buf(),
            target.to_path_buf(),
            framerate.to_string(),
        ));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(HandoffError::Conversion {
                source_path: source.display().to_string(),
                details: "mock conversion failure".to_string(),
            });
        }

        tokio::fs::copy(source, target)
            .await
            .map(|_| ())
            .map_err(|e| HandoffError::Conversion {
                source_path: source.display().to_string(),
                details: e.to_string(),
            })
    }
}

/// Uploader that records destinations and payload sizes
#[derive(Debug, Clone, Default)]
pub struct MockUploader {
    pub fail: bool,
    pub delay: Option<Duration>,
    uploads: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// `(destination, payload length)` per completed call
    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(&self, payload: Vec<u8>, destination: &str) -> Result<(), HandoffError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.uploads
            .lock()
            .push((destination.to_string(), payload.len()));

        if self.fail {
            return Err(HandoffError::Upload {
                destination: destination.to_string(),
                details: "mock upload failure".to_string(),
            });
        }
        Ok(())
    }
}
