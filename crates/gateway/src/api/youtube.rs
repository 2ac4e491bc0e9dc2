//! Channel download jobs.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use tc_youtube::export::export_path;
use tc_youtube::spawn_download;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBody {
    #[serde(default)]
    pub channel_url: String,
    #[serde(default)]
    pub max_videos: Option<u32>,
}

/// `POST /api/youtube/download` starts a job and returns its id.
pub async fn download(
    State(state): State<AppState>,
    Json(body): Json<DownloadBody>,
) -> ApiResult<impl IntoResponse> {
    let channel = body.channel_url.trim();
    if channel.is_empty() {
        return Err(ApiError::bad_request("channelUrl required"));
    }
    let crawler = state
        .crawler
        .clone()
        .ok_or_else(|| ApiError::unavailable("YouTube API key not configured"))?;
    let max_videos = state.config.youtube.clamp_max_videos(body.max_videos);

    let job_id = spawn_download(state.jobs.clone(), crawler, channel.to_string(), max_videos);
    tracing::info!(job_id = %job_id, channel = %channel, max_videos, "channel download started");
    Ok(Json(json!({ "ok": true, "jobId": job_id })))
}

/// `GET /api/youtube/progress/:jobId`
pub async fn progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(job.progress_body()))
}

/// `GET /api/youtube/downloads/:fileName`
pub async fn fetch_export(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let path = export_path(&state.config.youtube.downloads_dir, &file_name)
        .ok_or_else(|| ApiError::bad_request("Invalid file name"))?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Not found"));
        }
        Err(e) => return Err(tc_domain::error::Error::Io(e).into()),
    };
    let disposition = format!("attachment; filename=\"{file_name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
