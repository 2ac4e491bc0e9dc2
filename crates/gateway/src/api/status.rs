use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "users": state.users.count(),
        "sessions": state.store.session_count().await,
        "conversations": state.conversations.len(),
        "chat": state.runtime.has_provider(),
        "imageGeneration": state.runtime.image_generator().is_some(),
        "crawler": state.crawler.is_some(),
    }))
}
