//! HTTP surface, exercised in-process with `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use tc_contextpack::{AttachmentProcessor, KeywordClassifier};
use tc_domain::config::Config;
use tc_gateway::api;
use tc_gateway::runtime::{ChatRuntime, ConversationMap};
use tc_gateway::state::AppState;
use tc_providers::ChatProvider;
use tc_sessions::{ChatStore, FileChatStore, UserStore};
use tc_tools::ToolRegistry;
use tc_youtube::InMemoryJobStore;

struct TestApp {
    _dir: tempfile::TempDir,
    state: AppState,
}

impl TestApp {
    fn new(provider: Option<Arc<dyn ChatProvider>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.state_path = dir.path().to_path_buf();
        config.storage.generated_images_dir = dir.path().join("generated");
        config.youtube.downloads_dir = dir.path().join("downloads");
        std::fs::create_dir_all(&config.youtube.downloads_dir).unwrap();

        let store: Arc<dyn ChatStore> = Arc::new(FileChatStore::open(dir.path()).unwrap());
        let runtime = Arc::new(ChatRuntime::new(
            provider,
            None,
            store.clone(),
            Arc::new(ToolRegistry::with_builtin()),
            Arc::new(KeywordClassifier::from_config(&config.routing).unwrap()),
            config.llm.clone(),
        ));
        let state = AppState {
            users: Arc::new(UserStore::new(dir.path()).unwrap()),
            attachments: AttachmentProcessor::new(config.routing.clone()),
            config: Arc::new(config),
            store,
            runtime,
            conversations: Arc::new(ConversationMap::new()),
            jobs: Arc::new(InMemoryJobStore::new()),
            crawler: None,
            api_token_hash: None,
        };
        Self { _dir: dir, state }
    }

    fn with_token(mut self, token: &str) -> Self {
        self.state.api_token_hash = Some(Sha256::digest(token.as_bytes()).to_vec());
        self
    }

    fn router(&self) -> Router {
        api::router(self.state.clone()).with_state(self.state.clone())
    }

    async fn call(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn send(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.call(req).await
    }
}

fn ana() -> Value {
    json!({
        "username": " Ana ",
        "email": "ana@example.com",
        "password": "pw",
        "firstName": "Ana",
        "lastName": "Lee"
    })
}

#[tokio::test]
async fn health_and_status() {
    let app = TestApp::new(None);
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 0);
    assert_eq!(body["sessions"], 0);
    assert_eq!(body["chat"], false);
}

#[tokio::test]
async fn signup_and_login() {
    let app = TestApp::new(None);
    let (status, body) = app.send("POST", "/api/users", ana()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "ana");

    let (status, body) = app.send("POST", "/api/users", ana()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already exists");

    let (status, body) = app
        .send("POST", "/api/users/login", json!({"username": "ana", "password": "pw"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firstName"], "Ana");

    let (status, body) = app
        .send("POST", "/api/users/login", json!({"username": "ana", "password": "nope"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid password");

    let (status, _) = app.send("POST", "/api/users", json!({"username": "bob"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_crud() {
    let app = TestApp::new(None);
    let (status, body) = app
        .send("POST", "/api/sessions", json!({"username": "ana", "title": "Views"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send("POST", "/api/messages", json!({"session_id": id, "role": "user", "content": "hi"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/sessions?username=ana").await;
    assert_eq!(body["sessions"][0]["title"], "Views");
    assert_eq!(body["sessions"][0]["messageCount"], 1);

    let (status, _) = app
        .send("PATCH", &format!("/api/sessions/{id}/title"), json!({"title": "Renamed"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/messages?session_id={id}")).await;
    assert_eq!(body["messages"][0]["id"], format!("{id}-0"));

    let (status, _) = app.send("DELETE", &format!("/api/sessions/{id}"), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/sessions?username=ana").await;
    assert_eq!(body["sessions"], json!([]));

    let (status, _) = app
        .send("POST", "/api/messages", json!({"session_id": id, "role": "user", "content": "late"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_blobs_and_stats() {
    let app = TestApp::new(None);
    let doc = json!({"videos": [{"view_count": 1}, {"view_count": "3"}, {"view_count": "n/a"}]});
    let (status, body) = app.send("POST", "/api/json/upload", doc.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let json_id = body["jsonId"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/api/json/{json_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, doc);

    let (status, _) = app.get("/api/json/not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/json/json_1_abc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send("POST", "/api/json/compute-stats", json!({"field": "view_count", "jsonId": json_id}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["mean"], 2);
    assert_eq!(body["max"], 3);

    let (status, body) = app
        .send("POST", "/api/json/compute-stats", json!({"field": "title", "data": doc}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Field \"title\" has no numeric values."));
}

#[tokio::test]
async fn youtube_routes_without_a_key() {
    let app = TestApp::new(None);
    let (status, _) = app
        .send("POST", "/api/youtube/download", json!({"channelUrl": "@veritasium"}))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = app.get("/api/youtube/progress/job_1_abc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");

    let (status, _) = app.get("/api/youtube/downloads/secrets.json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/youtube/downloads/channel_1.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let path = app.state.config.youtube.downloads_dir.join("channel_42.json");
    std::fs::write(&path, r#"{"videos":[]}"#).unwrap();
    let (status, body) = app.get("/api/youtube/downloads/channel_42.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["videos"], json!([]));
}

#[tokio::test]
async fn conversation_attachments() {
    let app = TestApp::new(None);
    let (status, view) = app.send("POST", "/api/conversations", json!({"username": "ana"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["session"]["state"], "pending");
    let cid = view["id"].as_str().unwrap().to_string();

    let (status, view) = app
        .send(
            "POST",
            &format!("/api/conversations/{cid}/attachments"),
            json!({"name": "views.csv", "mimeType": "text/csv", "text": "title,views\nA,10\nB,20\n"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["attachments"]["csv"]["name"], "views.csv");
    assert!(view["attachments"]["csv"].get("base64").is_none());
    assert_eq!(view["attachments"]["datasetColumns"][0], "title");

    let (status, view) = app
        .send(
            "POST",
            &format!("/api/conversations/{cid}/attachments"),
            json!({"name": "chan.json", "mimeType": "application/json", "text": r#"{"videos":[{"title":"a","view_count":1}]}"#}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["attachments"]["json"]["name"], "chan.json");
    assert!(view["attachments"]["json"]["jsonId"].as_str().unwrap().starts_with("json_"));

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/conversations/{cid}/attachments"),
            json!({"name": "notes.json", "text": r#"{"rows": []}"#}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, view) = app
        .send(
            "POST",
            &format!("/api/conversations/{cid}/attachments"),
            json!({"name": "shot.png", "mimeType": "image/png", "data": "data:image/png;base64,iVBORw0KGgo="}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["attachments"]["images"][0]["name"], "shot.png");

    let (status, view) = app
        .send("DELETE", &format!("/api/conversations/{cid}/attachments/csv"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(view["attachments"]["csv"].is_null());
    assert!(view["attachments"]["datasetColumns"].is_null());

    let (status, _) = app
        .send("DELETE", &format!("/api/conversations/{cid}/attachments/image/3"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, view) = app
        .send("DELETE", &format!("/api/conversations/{cid}/attachments/image/0"), Value::Null)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["attachments"]["images"], json!([]));

    let (status, body) = app
        .send("POST", &format!("/api/conversations/{cid}/send"), json!({"text": "hi"}))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn send_without_streaming_returns_the_reply() {
    let provider = Arc::new(common::ScriptedProvider::streaming(vec![
        common::text("Hi Ana"),
        common::done(),
    ]));
    let app = TestApp::new(Some(provider as Arc<dyn ChatProvider>));
    let (_, view) = app.send("POST", "/api/conversations", json!({"username": "ana"})).await;
    let cid = view["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("POST", &format!("/api/conversations/{cid}/send"), json!({"text": "hello", "stream": false}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "final");
    assert_eq!(body["message"]["content"], "Hi Ana");
    assert_eq!(body["userMessage"]["content"], "hello");
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (_, view) = app.get(&format!("/api/conversations/{cid}")).await;
    assert_eq!(view["session"]["sessionId"], session_id);
    assert_eq!(view["awaitingReply"], false);
    assert_eq!(view["messages"].as_array().unwrap().len(), 2);

    // A second window resumes the saved session from the store.
    let (_, other) = app
        .send("POST", "/api/conversations", json!({"username": "ana", "sessionId": session_id}))
        .await;
    assert_eq!(other["messages"][1]["content"], "Hi Ana");
    assert_eq!(other["messages"][0]["id"], format!("{session_id}-0"));

    // Other users cannot open it.
    let (status, _) = app
        .send("POST", "/api/conversations", json!({"username": "bob", "sessionId": session_id}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_the_active_session_falls_back() {
    let app = TestApp::new(None);
    let store = &app.state.store;
    let older = store.create_session("ana", None, Some("older".into())).await.unwrap();
    let newer = store.create_session("ana", None, Some("newer".into())).await.unwrap();

    let (_, view) = app
        .send("POST", "/api/conversations", json!({"username": "ana", "sessionId": newer.id}))
        .await;
    let cid = view["id"].as_str().unwrap().to_string();

    let (status, view) = app
        .send("DELETE", &format!("/api/conversations/{cid}/sessions/{}", newer.id), Value::Null)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["session"]["sessionId"], older.id);

    let (_, view) = app
        .send("DELETE", &format!("/api/conversations/{cid}/sessions/{}", older.id), Value::Null)
        .await;
    assert_eq!(view["session"]["state"], "pending");
    assert_eq!(store.session_count().await, 0);
}

#[tokio::test]
async fn session_switches_wait_for_the_pending_reply() {
    let app = TestApp::new(None);
    let store = &app.state.store;
    let first = store.create_session("ana", None, Some("first".into())).await.unwrap();
    let second = store.create_session("ana", None, Some("second".into())).await.unwrap();

    let (_, view) = app
        .send("POST", "/api/conversations", json!({"username": "ana", "sessionId": first.id}))
        .await;
    let cid = view["id"].as_str().unwrap().to_string();
    app.state.conversations.get(&cid).unwrap().lock().awaiting_reply = true;

    let (status, body) = app
        .send("POST", &format!("/api/conversations/{cid}/select"), json!({"sessionId": second.id}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "a reply is still pending");

    let (status, _) = app.send("POST", &format!("/api/conversations/{cid}/new"), Value::Null).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send("DELETE", &format!("/api/conversations/{cid}/sessions/{}", first.id), Value::Null)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(store.session_count().await, 2);

    // Deleting some other session is fine.
    let (status, view) = app
        .send("DELETE", &format!("/api/conversations/{cid}/sessions/{}", second.id), Value::Null)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["session"]["sessionId"], first.id);

    app.state.conversations.get(&cid).unwrap().lock().awaiting_reply = false;
    let (status, view) = app.send("POST", &format!("/api/conversations/{cid}/new"), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["session"]["state"], "pending");
}

#[tokio::test]
async fn bearer_token_guards_protected_routes() {
    let app = TestApp::new(None).with_token("s3cret");

    let (status, _) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/sessions?username=ana").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid or missing API token");

    let req = Request::get("/api/sessions?username=ana")
        .header("authorization", "Bearer guess")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::get("/api/sessions?username=ana")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.call(req).await;
    assert_eq!(status, StatusCode::OK);
}
