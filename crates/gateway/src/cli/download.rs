//! `tubechat download`: run the crawler once in the foreground.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use tc_domain::config::Config;
use tc_youtube::{Crawler, YoutubeClient};

pub async fn run(
    config: &Config,
    channel: &str,
    max_videos: Option<u32>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let client = YoutubeClient::from_env(&config.youtube)?;
    let crawler = Crawler::new(Arc::new(client), &config.youtube);
    let max_videos = config.youtube.clamp_max_videos(max_videos);

    let progress = |percent: u8, message: &str| {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K[{percent:>3}%] {message}");
        let _ = err.flush();
    };
    let outcome = crawler.run(channel, max_videos, &progress).await;
    eprintln!();
    let outcome = outcome?;

    let written = crawler.downloads_dir().join(&outcome.file_name);
    let path = match out {
        Some(target) => {
            move_file(&written, &target).await?;
            target
        }
        None => written,
    };
    println!("{} ({} videos)", path.display(), outcome.video_count);
    Ok(())
}

async fn move_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if tokio::fs::rename(from, to).await.is_err() {
        // Rename fails across filesystems.
        tokio::fs::copy(from, to)
            .await
            .with_context(|| format!("writing {}", to.display()))?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}
