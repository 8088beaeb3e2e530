use crate::config::UploadConfig;
use crate::error::{HandoffError, WatchcamError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Sends a finished artifact to remote storage
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, payload: Vec<u8>, destination: &str) -> Result<(), HandoffError>;
}

#[derive(Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    autorename: bool,
}

/// Dropbox content API client
pub struct DropboxUploader {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl DropboxUploader {
    pub fn new(api_url: &str, token: String, timeout: Duration) -> Result<Self, HandoffError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HandoffError::Upload {
                destination: api_url.to_string(),
                details: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            token,
        })
    }

    /// Read the access token from the configured environment variable
    pub fn from_config(config: &UploadConfig) -> Result<Self, WatchcamError> {
        let token = access_token(config)?;
        Ok(Self::new(
            &config.api_url,
            token,
            Duration::from_secs(config.timeout_seconds),
        )?)
    }

    fn api_arg(destination: &str) -> Result<String, HandoffError> {
        serde_json::to_string(&UploadArg {
            path: destination,
            mode: "add",
            autorename: true,
        })
        .map_err(|e| HandoffError::Upload {
            destination: destination.to_string(),
            details: format!("Failed to encode upload arguments: {}", e),
        })
    }
}

/// Token for uploads; missing or empty is a credential error
pub fn access_token(config: &UploadConfig) -> Result<String, WatchcamError> {
    match std::env::var(&config.access_token_env) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(WatchcamError::credential(format!(
            "Upload is enabled but {} is not set",
            config.access_token_env
        ))),
    }
}

#[async_trait]
impl Uploader for DropboxUploader {
    async fn upload(&self, payload: Vec<u8>, destination: &str) -> Result<(), HandoffError> {
        let size = payload.len();
        debug!("Uploading {} bytes to {}", size, destination);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Dropbox-API-Arg", Self::api_arg(destination)?)
            .header("Content-Type", "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(|e| HandoffError::Upload {
                destination: destination.to_string(),
                details: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(HandoffError::Upload {
                destination: destination.to_string(),
                details: format!("Status {}: {}", status, error_text),
            });
        }

        info!("Uploaded {} ({} bytes)", destination, size);
        Ok(())
    }
}
