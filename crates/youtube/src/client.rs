//! YouTube Data API v3 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tc_domain::config::YoutubeConfig;
use tc_domain::error::{Error, Result};

use crate::channel::ChannelRef;
use crate::transcript::parse_timedtext;

/// Largest page the API serves for playlist items and video batches.
pub const PAGE_SIZE: u32 = 50;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    pub maxres: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub default: Option<Thumbnail>,
}

impl Thumbnails {
    /// maxres > high > medium > default
    pub fn best_url(&self) -> Option<String> {
        [&self.maxres, &self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .find_map(|t| t.url.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDetails {
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: Snippet,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub content_details: ContentDetails,
}

/// One page of an uploads playlist.
#[derive(Debug, Clone, Default)]
pub struct PlaylistPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ChannelItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: Option<ChannelContentDetails>,
}

#[derive(Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    snippet: Option<PlaylistSnippet>,
}

#[derive(Deserialize)]
struct PlaylistSnippet {
    #[serde(rename = "resourceId")]
    resource_id: Option<ResourceId>,
}

#[derive(Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Source trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The calls the crawler needs from YouTube.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn resolve_channel_id(&self, channel: &ChannelRef) -> Result<String>;
    async fn uploads_playlist(&self, channel_id: &str) -> Result<String>;
    async fn playlist_page(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage>;
    /// Details for at most [`PAGE_SIZE`] ids.
    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoItem>>;
    /// Caption text, or `None` when unavailable for any reason.
    async fn transcript(&self, video_id: &str) -> Option<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct YoutubeClient {
    http: Client,
    api_base: String,
    transcript_base: String,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(cfg: &YoutubeConfig, api_key: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            transcript_base: cfg.transcript_base.clone(),
            api_key,
        })
    }

    /// Build a client with the key read from `cfg.api_key_env`.
    pub fn from_env(cfg: &YoutubeConfig) -> Result<Self> {
        match std::env::var(&cfg.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Self::new(cfg, key.trim().to_string()),
            _ => Err(Error::Config(format!("{} is required", cfg.api_key_env))),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{resource}", self.api_base);
        let started = std::time::Instant::now();
        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| if e.is_timeout() { Error::Timeout(e.to_string()) } else { Error::Http(e.to_string()) })?;

        let status = resp.status();
        tracing::debug!(
            resource,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "youtube api call"
        );
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "youtube".into(),
                message: format!("HTTP {} - {}", status.as_u16(), body),
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::Parse(format!("youtube {resource}: {e}")))
    }
}

#[async_trait]
impl VideoSource for YoutubeClient {
    async fn resolve_channel_id(&self, channel: &ChannelRef) -> Result<String> {
        let handle = match channel {
            ChannelRef::Id(id) => return Ok(id.clone()),
            ChannelRef::Handle(h) => h,
        };
        let list: ListResponse<ChannelItem> = self
            .get_json("channels", &[("part", "id"), ("forHandle", handle)])
            .await?;
        list.items
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| Error::NotFound(format!("Channel not found: @{handle}")))
    }

    async fn uploads_playlist(&self, channel_id: &str) -> Result<String> {
        let list: ListResponse<ChannelItem> = self
            .get_json("channels", &[("part", "contentDetails"), ("id", channel_id)])
            .await?;
        list.items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .and_then(|d| d.related_playlists)
            .and_then(|p| p.uploads)
            .ok_or_else(|| Error::NotFound("Channel has no uploads playlist".into()))
    }

    async fn playlist_page(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage> {
        let max = max_results.clamp(1, PAGE_SIZE).to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let list: ListResponse<PlaylistItem> = self.get_json("playlistItems", &query).await?;
        Ok(PlaylistPage {
            video_ids: list
                .items
                .into_iter()
                .filter_map(|i| i.snippet?.resource_id?.video_id)
                .collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let list: ListResponse<VideoItem> = self
            .get_json(
                "videos",
                &[("part", "snippet,statistics,contentDetails"), ("id", joined.as_str())],
            )
            .await?;
        Ok(list.items)
    }

    async fn transcript(&self, video_id: &str) -> Option<String> {
        let resp = self
            .http
            .get(&self.transcript_base)
            .query(&[("lang", "en"), ("v", video_id)])
            .send()
            .await;
        let body = match resp {
            Ok(r) if r.status().is_success() => r.text().await.ok()?,
            Ok(r) => {
                tracing::debug!(video_id, status = r.status().as_u16(), "transcript unavailable");
                return None;
            }
            Err(e) => {
                tracing::debug!(video_id, error = %e, "transcript fetch failed");
                return None;
            }
        };
        parse_timedtext(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_thumbnail_prefers_largest() {
        let thumbs: Thumbnails = serde_json::from_value(serde_json::json!({
            "default": {"url": "d"},
            "high": {"url": "h"},
            "medium": {"url": "m"}
        }))
        .unwrap();
        assert_eq!(thumbs.best_url().as_deref(), Some("h"));
        assert_eq!(Thumbnails::default().best_url(), None);
    }

    #[test]
    fn video_items_tolerate_missing_sections() {
        let item: VideoItem = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "statistics": {"viewCount": "12"}
        }))
        .unwrap();
        assert_eq!(item.statistics.view_count.as_deref(), Some("12"));
        assert!(item.snippet.title.is_none());
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let cfg = YoutubeConfig {
            api_key_env: "TC_TEST_UNSET_YOUTUBE_KEY".into(),
            ..YoutubeConfig::default()
        };
        assert!(matches!(YoutubeClient::from_env(&cfg), Err(Error::Config(_))));
    }
}
