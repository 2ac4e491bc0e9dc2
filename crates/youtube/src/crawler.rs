//! The download pipeline and its job wrapper.

use std::path::PathBuf;
use std::sync::Arc;

use tc_domain::config::YoutubeConfig;
use tc_domain::error::Result;
use tc_domain::trace::TraceEvent;

use crate::channel::{parse_channel_ref, parse_duration};
use crate::client::{VideoItem, VideoSource, PAGE_SIZE};
use crate::export::{ChannelExport, VideoRecord};
use crate::jobs::{new_job_id, Job, JobStatus, JobStore};

/// Route prefix under which exports are served.
pub const DOWNLOADS_ROUTE: &str = "/api/youtube/downloads";

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub file_name: String,
    pub video_count: usize,
}

pub struct Crawler {
    source: Arc<dyn VideoSource>,
    downloads_dir: PathBuf,
    fetch_transcripts: bool,
}

impl Crawler {
    pub fn new(source: Arc<dyn VideoSource>, cfg: &YoutubeConfig) -> Self {
        Self {
            source,
            downloads_dir: cfg.downloads_dir.clone(),
            fetch_transcripts: cfg.fetch_transcripts,
        }
    }

    pub fn downloads_dir(&self) -> &std::path::Path {
        &self.downloads_dir
    }

    /// Download up to `max_videos` of the newest uploads and write the
    /// export. `progress` receives `(percent, message)` at each milestone:
    /// 5 resolving, 15 listing, 15..=80 per video, 85 writing, 100 done.
    pub async fn run(
        &self,
        channel_input: &str,
        max_videos: u32,
        progress: &(dyn Fn(u8, &str) + Send + Sync),
    ) -> Result<DownloadOutcome> {
        let channel = parse_channel_ref(channel_input)?;
        let max = max_videos.max(1) as usize;

        progress(5, "Resolving channel...");
        let channel_id = self.source.resolve_channel_id(&channel).await?;

        progress(15, "Fetching videos...");
        let uploads = self.source.uploads_playlist(&channel_id).await?;
        progress(15, "Collecting video list...");
        let ids = self.collect_ids(&uploads, max).await?;

        let mut items: Vec<VideoItem> = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(PAGE_SIZE as usize) {
            items.extend(self.source.videos(chunk).await?);
        }

        let total = items.len();
        let mut videos = Vec::with_capacity(total);
        for (i, item) in items.into_iter().enumerate() {
            let title: String = item.snippet.title.as_deref().unwrap_or_default().chars().take(30).collect();
            progress(
                video_percent(i, total),
                &format!("Fetching video {}/{total}: {title}...", i + 1),
            );
            let transcript = if self.fetch_transcripts {
                self.source.transcript(&item.id).await
            } else {
                None
            };
            videos.push(to_record(item, transcript));
        }

        progress(85, "Building JSON...");
        let export = ChannelExport::new(channel_input.trim(), channel_id, videos);
        let file_name = export.write_to(&self.downloads_dir).await?;

        progress(100, "Complete");
        tracing::info!(
            channel = %channel,
            file = %file_name,
            videos = export.video_count,
            "channel export written"
        );
        Ok(DownloadOutcome {
            file_name,
            video_count: export.video_count,
        })
    }

    async fn collect_ids(&self, playlist_id: &str, max: usize) -> Result<Vec<String>> {
        let mut ids: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;
        while ids.len() < max {
            let want = (max - ids.len()).min(PAGE_SIZE as usize) as u32;
            let page = self
                .source
                .playlist_page(playlist_id, want, page_token.as_deref())
                .await?;
            ids.extend(page.video_ids);
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }
        ids.truncate(max);
        Ok(ids)
    }
}

/// 15 + floor(65 * (i + 1) / total)
fn video_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 15;
    }
    (15 + (65 * (index + 1)) / total).min(80) as u8
}

fn parse_count(raw: &Option<String>) -> Option<u64> {
    raw.as_deref().and_then(|s| s.trim().parse().ok())
}

fn to_record(item: VideoItem, transcript: Option<String>) -> VideoRecord {
    let transcript_status = if transcript.is_some() { "available" } else { "unavailable" };
    VideoRecord {
        thumbnail_url: item.snippet.thumbnails.best_url(),
        view_count: parse_count(&item.statistics.view_count),
        like_count: parse_count(&item.statistics.like_count),
        comment_count: parse_count(&item.statistics.comment_count),
        duration: item.content_details.duration.as_deref().and_then(parse_duration),
        video_url: format!("https://www.youtube.com/watch?v={}", item.id),
        title: item.snippet.title.filter(|s| !s.is_empty()),
        description: item.snippet.description.filter(|s| !s.is_empty()),
        release_date: item.snippet.published_at,
        transcript,
        transcript_status: transcript_status.into(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Register a job, run the download in the background and return the job
/// id immediately.
pub fn spawn_download(
    jobs: Arc<dyn JobStore>,
    crawler: Arc<Crawler>,
    channel_input: String,
    max_videos: u32,
) -> String {
    let job_id = new_job_id();
    jobs.insert(&job_id, Job::pending());
    jobs.update(&job_id, &mut |j| j.status = JobStatus::Running);

    let id = job_id.clone();
    tokio::spawn(async move {
        let progress = |percent: u8, message: &str| {
            let updated = jobs.update(&id, &mut |j| {
                if j.status == JobStatus::Running {
                    j.progress = percent;
                    j.message = message.to_string();
                }
            });
            if updated {
                TraceEvent::CrawlProgress {
                    job_id: id.clone(),
                    progress: percent,
                    message: message.to_string(),
                }
                .emit();
            }
        };

        let result = crawler.run(&channel_input, max_videos, &progress).await;
        jobs.update(&id, &mut |j| match &result {
            Ok(out) => {
                j.status = JobStatus::Complete;
                j.progress = 100;
                j.message = "Complete".into();
                j.public_url = Some(format!("{DOWNLOADS_ROUTE}/{}", out.file_name));
                j.file_name = Some(out.file_name.clone());
                j.video_count = Some(out.video_count);
            }
            Err(e) => {
                j.status = JobStatus::Error;
                j.error = Some(e.detail());
            }
        });
        if let Err(e) = &result {
            tracing::warn!(job_id = %id, error = %e, "channel download failed");
        }
    });

    job_id
}
