//! The channel export document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tc_domain::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Seconds.
    pub duration: Option<u64>,
    /// ISO-8601 publish time.
    pub release_date: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub transcript: Option<String>,
    /// `available` or `unavailable`.
    pub transcript_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelExport {
    pub channel_url: String,
    pub channel_id: String,
    pub video_count: usize,
    pub videos: Vec<VideoRecord>,
}

impl ChannelExport {
    pub fn new(channel_url: impl Into<String>, channel_id: impl Into<String>, videos: Vec<VideoRecord>) -> Self {
        Self {
            channel_url: channel_url.into(),
            channel_id: channel_id.into(),
            video_count: videos.len(),
            videos,
        }
    }

    /// Write as pretty JSON to `dir/channel_<millis>.json`, returning the
    /// file name.
    pub async fn write_to(&self, dir: &Path) -> Result<String> {
        tokio::fs::create_dir_all(dir).await?;
        let file_name = format!("channel_{}.json", chrono::Utc::now().timestamp_millis());
        let raw = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(dir.join(&file_name), raw).await?;
        Ok(file_name)
    }
}

/// Export files are only ever addressed through this check.
pub fn is_export_file_name(name: &str) -> bool {
    name.strip_prefix("channel_")
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

pub fn export_path(dir: &Path, name: &str) -> Option<PathBuf> {
    is_export_file_name(name).then(|| dir.join(name))
}
