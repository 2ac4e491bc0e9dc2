//! YouTube channel downloader.
//!
//! Resolves a channel from its URL or handle, collects the newest uploads
//! with their statistics and transcripts, and writes a
//! `channel_<millis>.json` export. Long-running downloads are tracked as
//! jobs in an injected [`JobStore`].

pub mod channel;
pub mod client;
pub mod crawler;
pub mod export;
pub mod jobs;
pub mod transcript;

pub use channel::{parse_channel_ref, parse_duration, ChannelRef};
pub use client::{VideoSource, YoutubeClient};
pub use crawler::{spawn_download, Crawler, DownloadOutcome};
pub use export::{ChannelExport, VideoRecord};
pub use jobs::{InMemoryJobStore, Job, JobStatus, JobStore};
