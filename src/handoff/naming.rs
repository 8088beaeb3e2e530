use crate::config::{RecordingConfig, UploadConfig};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Local file names and upload destinations for finished artifacts
#[derive(Debug, Clone)]
pub struct ArtifactNaming {
    date_format: String,
    time_format: String,
    upload_format: String,
}

impl ArtifactNaming {
    pub fn new(date_format: &str, time_format: &str, upload_format: &str) -> Self {
        Self {
            date_format: date_format.to_string(),
            time_format: time_format.to_string(),
            upload_format: upload_format.trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(recording: &RecordingConfig, upload: &UploadConfig) -> Self {
        Self::new(
            &upload.date_format,
            &upload.time_format,
            &recording.upload_format,
        )
    }

    pub fn date(&self, at: NaiveDateTime) -> String {
        at.format(&self.date_format).to_string()
    }

    /// `<date>_<time>` stem shared by converted files and snapshots
    pub fn stem(&self, at: NaiveDateTime) -> String {
        format!(
            "{}_{}",
            at.format(&self.date_format),
            at.format(&self.time_format)
        )
    }

    /// Preferred conversion target, `<dir>/<date>_<time>.<format>`
    pub fn converted_path(&self, dir: &Path, at: NaiveDateTime) -> PathBuf {
        dir.join(format!("{}.{}", self.stem(at), self.upload_format))
    }

    /// Fallback target for when the timestamped name is already taken
    pub fn unique_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", Uuid::new_v4(), self.upload_format))
    }

    /// `/hc_<date>/<file name>`
    pub fn destination(&self, at: NaiveDateTime, file_name: &str) -> String {
        format!("/hc_{}/{}", self.date(at), file_name)
    }

    pub fn snapshot_destination(&self, at: NaiveDateTime) -> String {
        self.destination(at, &format!("{}.jpg", self.stem(at)))
    }
}
