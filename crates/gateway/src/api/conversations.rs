//! Conversation endpoints: the server side of one open chat window.
//!
//! A conversation owns the active session, its in-memory transcript and
//! the attachment context. `send` runs a turn and streams its events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use base64::Engine as _;
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use tc_contextpack::AttachmentKind;

use super::error::{ApiError, ApiResult};
use crate::runtime::{AttachmentSlot, Conversation, SelectAction, SharedConversation, TurnEvent};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBody {
    #[serde(default)]
    pub username: String,
    /// Resume this saved session instead of starting a new chat.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `POST /api/conversations`
pub async fn open(
    State(state): State<AppState>,
    Json(body): Json<OpenBody>,
) -> ApiResult<impl IntoResponse> {
    let username = body.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::bad_request("username required"));
    }
    let display_name = state.users.get(&username).map(|u| u.display_name());
    let conversation = state
        .conversations
        .insert(Conversation::new(&username, display_name));
    let id = conversation.lock().id.clone();

    match body.session_id.filter(|s| !s.is_empty()) {
        Some(session_id) => {
            if let Err(e) = switch_to(&state, &conversation, &session_id).await {
                state.conversations.remove(&id);
                return Err(e);
            }
        }
        None => conversation.lock().start_new(),
    }

    let view = conversation.lock().view();
    tracing::info!(conversation_id = %view.id, username = %username, "conversation opened");
    Ok(Json(view))
}

/// `GET /api/conversations/:cid`
pub async fn get(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let conversation = state.conversations.get(&cid)?;
    let view = conversation.lock().view();
    Ok(Json(view))
}

/// `DELETE /api/conversations/:cid`
pub async fn close(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.runtime.stop(&cid);
    state
        .conversations
        .remove(&cid)
        .ok_or_else(|| ApiError::not_found(format!("conversation {cid}")))?;
    Ok(Json(json!({ "ok": true })))
}

/// `POST /api/conversations/:cid/new`
pub async fn new_chat(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let conversation = state.conversations.get(&cid)?;
    let view = {
        let mut conv = conversation.lock();
        conv.ensure_idle()?;
        conv.start_new();
        conv.view()
    };
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBody {
    pub session_id: String,
}

/// `POST /api/conversations/:cid/select`
pub async fn select(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Json(body): Json<SelectBody>,
) -> ApiResult<impl IntoResponse> {
    let conversation = state.conversations.get(&cid)?;
    switch_to(&state, &conversation, &body.session_id).await?;
    let view = conversation.lock().view();
    Ok(Json(view))
}

/// `DELETE /api/conversations/:cid/sessions/:id`: delete a saved session
/// and fall back to the newest remaining one, or a new chat.
pub async fn delete_session(
    State(state): State<AppState>,
    Path((cid, session_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let conversation = state.conversations.get(&cid)?;
    let username = {
        let conv = conversation.lock();
        if conv.session_id() == Some(session_id.as_str()) {
            conv.ensure_idle()?;
        }
        conv.username.clone()
    };
    owned_session(&state, &username, &session_id).await?;

    state.store.delete_session(&session_id).await?;
    let remaining = state.store.list_sessions(&username).await?;
    let next = conversation
        .lock()
        .on_session_deleted(&session_id, &remaining);
    if let Some(next) = next {
        switch_to(&state, &conversation, &next).await?;
    }

    let view = conversation.lock().view();
    Ok(Json(view))
}

/// Select `session_id`, loading its transcript when the switch needs it.
async fn switch_to(state: &AppState, conversation: &SharedConversation, session_id: &str) -> ApiResult<()> {
    let username = conversation.lock().username.clone();
    owned_session(state, &username, session_id).await?;

    let action = conversation.lock().select(session_id)?;
    if let SelectAction::Reload(id) = action {
        let messages = state.store.list_messages(&id).await?;
        if !conversation.lock().load_messages(&id, messages) {
            tracing::debug!(session_id = %id, "session changed while loading; transcript dropped");
        }
    }
    Ok(())
}

async fn owned_session(state: &AppState, username: &str, session_id: &str) -> ApiResult<()> {
    let record = state.store.get_session(session_id).await?;
    if record.username != username {
        return Err(ApiError::not_found(format!("session {session_id}")));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Attachments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A dropped or pasted file. Text files may arrive as `text`; anything
/// may arrive base64-encoded in `data`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachBody {
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl AttachBody {
    /// Decoded `data`, with or without a `data:<mime>;base64,` prefix.
    fn bytes(&self) -> ApiResult<Vec<u8>> {
        let encoded = self
            .data
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("data required"))?;
        let payload = encoded.split_once(";base64,").map_or(encoded, |(_, rest)| rest);
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ApiError::bad_request(format!("{}: invalid base64: {e}", self.name)))
    }

    fn text_content(&self) -> ApiResult<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        String::from_utf8(self.bytes()?)
            .map_err(|_| ApiError::bad_request(format!("{}: not UTF-8 text", self.name)))
    }
}

/// `POST /api/conversations/:cid/attachments`
pub async fn attach(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Json(body): Json<AttachBody>,
) -> ApiResult<impl IntoResponse> {
    let conversation = state.conversations.get(&cid)?;
    let kind = AttachmentKind::classify(&body.name, &body.mime_type)
        .ok_or_else(|| ApiError::bad_request(format!("unsupported file type: {}", body.name)))?;

    match kind {
        AttachmentKind::Csv => {
            let text = body.text_content()?;
            let processed = state.attachments.csv(&body.name, &text)?;
            conversation.lock().attachments.attach_csv(processed);
        }
        AttachmentKind::Json => {
            let text = body.text_content()?;
            let store = state.store.clone();
            let channel = state
                .attachments
                .channel_json(&body.name, &text, |data| async move {
                    store.upload_json_blob(&data).await
                })
                .await
                .ok_or_else(|| {
                    ApiError::bad_request(format!("{}: not a channel export with a videos array", body.name))
                })?;
            conversation.lock().attachments.channel = Some(Arc::new(channel));
        }
        AttachmentKind::Image => {
            let image = state.attachments.image(&body.name, &body.mime_type, &body.bytes()?);
            conversation.lock().attachments.images.push(image);
        }
    }

    let view = conversation.lock().view();
    Ok(Json(view))
}

/// `DELETE /api/conversations/:cid/attachments/:kind`
pub async fn detach(
    State(state): State<AppState>,
    Path((cid, kind)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    remove_attachment(&state, &cid, AttachmentSlot::parse(&kind, None)?)
}

/// `DELETE /api/conversations/:cid/attachments/:kind/:index`
pub async fn detach_indexed(
    State(state): State<AppState>,
    Path((cid, kind, index)): Path<(String, String, usize)>,
) -> ApiResult<impl IntoResponse> {
    remove_attachment(&state, &cid, AttachmentSlot::parse(&kind, Some(index))?)
}

fn remove_attachment(state: &AppState, cid: &str, slot: AttachmentSlot) -> ApiResult<Json<crate::runtime::ConversationView>> {
    let conversation = state.conversations.get(cid)?;
    let mut conv = conversation.lock();
    conv.attachments.remove(slot)?;
    Ok(Json(conv.view()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SendBody {
    #[serde(default)]
    pub text: String,
    /// SSE when true (default), a single JSON body otherwise.
    #[serde(default = "d_true")]
    pub stream: bool,
}

/// `POST /api/conversations/:cid/send`
pub async fn send(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Json(body): Json<SendBody>,
) -> ApiResult<Response> {
    // Refuse up front when no model is configured.
    if !state.runtime.has_provider() {
        return Err(ApiError::unavailable(format!(
            "chat provider not configured (set {})",
            state.config.llm.api_key_env
        )));
    }

    let conversation = state.conversations.get(&cid)?;
    let rx = state.runtime.start_turn(conversation, &body.text).await?;

    if body.stream {
        return Ok(Sse::new(make_sse_stream(rx))
            .keep_alive(KeepAlive::default())
            .into_response());
    }
    Ok(Json(drain(rx).await).into_response())
}

fn make_sse_stream(
    mut rx: mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event.name()).data(data));
        }
    }
}

/// Collect a turn into one response body.
async fn drain(mut rx: mpsc::Receiver<TurnEvent>) -> serde_json::Value {
    let mut session_id = None;
    let mut user_message = None;
    let mut outcome = "final";
    let mut message = None;
    let mut error = None;
    let mut usage = None;

    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::UserMessage { session_id: id, message: m, .. } => {
                session_id = Some(id);
                user_message = Some(m);
            }
            TurnEvent::Final { message: m } => message = Some(m),
            TurnEvent::Stopped { message: m } => {
                outcome = "stopped";
                message = Some(m);
            }
            TurnEvent::Error { error: e, message: m } => {
                outcome = "error";
                error = Some(e);
                message = Some(m);
            }
            TurnEvent::Usage { prompt_tokens, completion_tokens, total_tokens } => {
                usage = Some(json!({
                    "promptTokens": prompt_tokens,
                    "completionTokens": completion_tokens,
                    "totalTokens": total_tokens,
                }));
            }
            TurnEvent::AssistantDelta { .. }
            | TurnEvent::Parts { .. }
            | TurnEvent::ToolCall { .. }
            | TurnEvent::ToolResult { .. } => {}
        }
    }

    json!({
        "outcome": outcome,
        "sessionId": session_id,
        "userMessage": user_message,
        "message": message,
        "error": error,
        "usage": usage,
    })
}

/// `POST /api/conversations/:cid/stop`: `stopped` is false when no
/// reply was in flight.
pub async fn stop(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.conversations.get(&cid)?;
    let stopped = state.runtime.stop(&cid);
    Ok(Json(json!({ "ok": true, "stopped": stopped })))
}
