//! Image generation and stored user images.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use tc_providers::AnchorImage;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub anchor_image: Option<AnchorImage>,
}

/// `POST /api/images/generate`
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> ApiResult<impl IntoResponse> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("prompt required"));
    }
    let generator = state
        .runtime
        .image_generator()
        .ok_or_else(|| ApiError::unavailable("image generation not configured"))?;

    let image_url = generator.generate(prompt, body.anchor_image.as_ref()).await?;
    tracing::info!(url = %image_url, "image generated");
    Ok(Json(json!({ "imageUrl": image_url })))
}

/// `GET /api/images/:file`
pub async fn fetch(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (bytes, mime) = state.store.fetch_image(&file).await?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes))
}
