pub mod auth;
pub mod conversations;
pub mod error;
pub mod images;
pub mod json;
pub mod messages;
pub mod sessions;
pub mod status;
pub mod users;
pub mod youtube;

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware when a token is configured).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/health", get(status::health))
        .route("/api/status", get(status::status))
        // Stored images are referenced from transcripts as plain URLs.
        .route("/api/images/:file", get(images::fetch))
        .route("/api/youtube/downloads/:file_name", get(youtube::fetch_export));

    let protected = Router::new()
        // Users
        .route("/api/users", post(users::signup))
        .route("/api/users/login", post(users::login))
        // Sessions and transcripts
        .route("/api/sessions", get(sessions::list_sessions).post(sessions::create_session))
        .route("/api/sessions/:id", delete(sessions::delete_session))
        .route("/api/sessions/:id/title", patch(sessions::rename_session))
        .route("/api/messages", get(messages::list_messages).post(messages::append_message))
        // Conversations
        .route("/api/conversations", post(conversations::open))
        .route("/api/conversations/:cid", get(conversations::get).delete(conversations::close))
        .route("/api/conversations/:cid/new", post(conversations::new_chat))
        .route("/api/conversations/:cid/select", post(conversations::select))
        .route("/api/conversations/:cid/attachments", post(conversations::attach))
        .route("/api/conversations/:cid/attachments/:kind", delete(conversations::detach))
        .route(
            "/api/conversations/:cid/attachments/:kind/:index",
            delete(conversations::detach_indexed),
        )
        .route("/api/conversations/:cid/send", post(conversations::send))
        .route("/api/conversations/:cid/stop", post(conversations::stop))
        .route("/api/conversations/:cid/sessions/:id", delete(conversations::delete_session))
        // JSON blobs
        .route("/api/json/upload", post(json::upload))
        .route("/api/json/compute-stats", post(json::compute_stats))
        .route("/api/json/:json_id", get(json::fetch))
        // Images
        .route("/api/images/generate", post(images::generate))
        // YouTube
        .route("/api/youtube/download", post(youtube::download))
        .route("/api/youtube/progress/:job_id", get(youtube::progress))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}
