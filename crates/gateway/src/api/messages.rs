//! Direct transcript access.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use tc_domain::chart::Chart;
use tc_domain::chat::{ChatMessage, ImageRef, ToolInvocation};
use tc_domain::tool::Role;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Images arrive either already stored or inline; inline ones are stored
/// before the message is written.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IncomingImage {
    Stored(ImageRef),
    #[serde(rename_all = "camelCase")]
    Inline { mime_type: String, data: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendBody {
    #[serde(default, alias = "sessionId", rename = "session_id")]
    pub session_id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Vec<IncomingImage>,
    #[serde(default)]
    pub charts: Vec<Chart>,
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,
}

/// `POST /api/messages`
pub async fn append_message(
    State(state): State<AppState>,
    Json(body): Json<AppendBody>,
) -> ApiResult<impl IntoResponse> {
    if body.session_id.is_empty() {
        return Err(ApiError::bad_request("session_id required"));
    }
    let mut message = ChatMessage::new(body.role, body.content);
    for image in body.images {
        let stored = match image {
            IncomingImage::Stored(r) => r,
            IncomingImage::Inline { mime_type, data } => {
                state.store.put_image(&mime_type, &data).await?
            }
        };
        message.images.push(stored);
    }
    message.charts = body.charts;
    message.tool_calls = body.tool_calls;

    state.store.append_message(&body.session_id, &message).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
}

/// `GET /api/messages?session_id=`
pub async fn list_messages(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let session_id = q
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("session_id required"))?;
    let messages = state.store.list_messages(&session_id).await?;
    Ok(Json(json!({ "messages": messages })))
}
