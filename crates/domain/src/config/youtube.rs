use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel downloader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// YouTube Data API v3 root.
    #[serde(default = "d_api_base")]
    pub api_base: String,
    /// Root used to fetch timed-text transcripts.
    #[serde(default = "d_transcript_base")]
    pub transcript_base: String,
    #[serde(default = "d_default_max")]
    pub default_max_videos: u32,
    #[serde(default = "d_max_cap")]
    pub max_videos_cap: u32,
    #[serde(default = "d_downloads_dir")]
    pub downloads_dir: PathBuf,
    #[serde(default = "d_true")]
    pub fetch_transcripts: bool,
    #[serde(default = "d_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key_env: d_api_key_env(),
            api_base: d_api_base(),
            transcript_base: d_transcript_base(),
            default_max_videos: d_default_max(),
            max_videos_cap: d_max_cap(),
            downloads_dir: d_downloads_dir(),
            fetch_transcripts: true,
            request_timeout_ms: d_timeout_ms(),
        }
    }
}

impl YoutubeConfig {
    /// Clamp a requested video count into `1..=max_videos_cap`.
    pub fn clamp_max_videos(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_videos)
            .clamp(1, self.max_videos_cap.max(1))
    }
}

fn d_api_key_env() -> String {
    "YOUTUBE_API_KEY".into()
}
fn d_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".into()
}
fn d_transcript_base() -> String {
    "https://www.youtube.com/api/timedtext".into()
}
fn d_default_max() -> u32 {
    10
}
fn d_max_cap() -> u32 {
    100
}
fn d_downloads_dir() -> PathBuf {
    PathBuf::from("./data/downloads")
}
fn d_true() -> bool {
    true
}
fn d_timeout_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_applies_default_and_bounds() {
        let cfg = YoutubeConfig::default();
        assert_eq!(cfg.clamp_max_videos(None), 10);
        assert_eq!(cfg.clamp_max_videos(Some(0)), 1);
        assert_eq!(cfg.clamp_max_videos(Some(500)), 100);
        assert_eq!(cfg.clamp_max_videos(Some(42)), 42);
    }
}
