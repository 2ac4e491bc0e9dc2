//! Stored channel JSON and the direct stats endpoint.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use tc_contextpack::attachments::videos_of;
use tc_tools::compute_field_stats;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /api/json/upload`
pub async fn upload(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let json_id = state.store.upload_json_blob(&body).await?;
    Ok(Json(json!({ "ok": true, "jsonId": json_id })))
}

/// `GET /api/json/:jsonId`
pub async fn fetch(
    State(state): State<AppState>,
    Path(json_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.fetch_json_blob(&json_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeStatsBody {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub json_id: Option<String>,
    /// A channel document, or a bare array of videos.
    #[serde(default)]
    pub data: Option<Value>,
}

/// `POST /api/json/compute-stats`
pub async fn compute_stats(
    State(state): State<AppState>,
    Json(body): Json<ComputeStatsBody>,
) -> ApiResult<impl IntoResponse> {
    if body.field.trim().is_empty() {
        return Err(ApiError::bad_request("field required"));
    }
    let doc = match (body.data, body.json_id) {
        (Some(data), _) => data,
        (None, Some(id)) => state.store.fetch_json_blob(&id).await?,
        (None, None) => return Err(ApiError::bad_request("jsonId or data required")),
    };
    let videos = match &doc {
        Value::Array(items) => items.as_slice(),
        other => videos_of(other),
    };
    let stats = compute_field_stats(videos, &body.field).map_err(ApiError::bad_request)?;
    Ok(Json(stats))
}
