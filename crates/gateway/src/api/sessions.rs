//! Persisted chat sessions.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub username: Option<String>,
}

/// `GET /api/sessions?username=`, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let username = q
        .username
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("username required"))?;
    let sessions = state.store.list_sessions(&username).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// `POST /api/sessions`
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> ApiResult<impl IntoResponse> {
    if body.username.trim().is_empty() {
        return Err(ApiError::bad_request("username required"));
    }
    let record = state
        .store
        .create_session(body.username.trim(), body.agent, body.title)
        .await?;
    Ok(Json(json!({ "id": record.id })))
}

/// `DELETE /api/sessions/:id`
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.store.delete_session(&id).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    #[serde(default)]
    pub title: Option<String>,
}

/// `PATCH /api/sessions/:id/title`
pub async fn rename_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RenameBody>,
) -> ApiResult<impl IntoResponse> {
    let title = body.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    state.store.rename_session(&id, title).await?;
    Ok(Json(json!({ "ok": true })))
}
