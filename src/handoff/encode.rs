use crate::config::RecordingConfig;
use crate::error::HandoffError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Converts a raw segment into an uploadable container
#[async_trait]
pub trait Encoder: Send + Sync {
    /// `framerate` is the rate the segment was recorded at, e.g. `15/1`
    async fn convert(&self, source: &Path, target: &Path, framerate: &str)
        -> Result<(), HandoffError>;
}

/// Remuxes raw H.264 with an ffmpeg child process at lowered priority
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: String,
    probe_size: String,
}

impl FfmpegEncoder {
    pub fn new(program: &str, probe_size: &str) -> Self {
        Self {
            program: program.to_string(),
            probe_size: probe_size.to_string(),
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(&config.encoder_program, &config.probe_size)
    }

    /// Argument list passed to the encoder program
    pub fn arguments(&self, source: &Path, target: &Path, framerate: &str) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "panic".to_string(),
            "-framerate".to_string(),
            framerate.to_string(),
            "-probesize".to_string(),
            self.probe_size.clone(),
            "-i".to_string(),
            source.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            target.display().to_string(),
        ]
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        framerate: &str,
    ) -> Result<(), HandoffError> {
        let args = self.arguments(source, target, framerate);
        debug!("Running {} {}", self.program, args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            // Keep conversion from starving the capture loop
            command.pre_exec(|| {
                libc::setpriority(libc::PRIO_PROCESS as _, 0, 10);
                Ok(())
            });
        }

        let output = command
            .output()
            .await
            .map_err(|e| HandoffError::Conversion {
                source_path: source.display().to_string(),
                details: format!("Failed to run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(HandoffError::Conversion {
                source_path: source.display().to_string(),
                details: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        if tokio::fs::metadata(target).await.is_err() {
            return Err(HandoffError::Conversion {
                source_path: source.display().to_string(),
                details: format!("{} produced no output at {}", self.program, target.display()),
            });
        }

        info!("Converted {} -> {}", source.display(), target.display());
        Ok(())
    }
}
