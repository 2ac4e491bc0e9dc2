//! Shared fixtures: a scripted chat provider and a runtime over a
//! temporary on-disk store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use tc_contextpack::KeywordClassifier;
use tc_domain::config::{LlmConfig, RoutingConfig};
use tc_domain::error::{Error, Result};
use tc_domain::stream::{BoxStream, StreamChunk};
use tc_domain::tool::FunctionCall;
use tc_gateway::runtime::{ChatRuntime, Conversation, SharedConversation, TurnEvent};
use tc_providers::{ChatProvider, TurnRequest, TurnResponse};
use tc_sessions::{ChatStore, FileChatStore};
use tc_tools::ToolRegistry;

/// Replays canned replies and records every request.
///
/// `send_turn` pops replies in order and repeats the last one once the
/// queue is down to it. `stream_turn` yields `chunks`, waiting on `gate`
/// before the chunk at `gate_at`, then ends with `fault` if one is set.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<TurnResponse>>,
    chunks: Vec<StreamChunk>,
    gate: Option<(usize, Arc<Notify>)>,
    fault: Option<Fault>,
    pub requests: Mutex<Vec<TurnRequest>>,
}

/// How a scripted stream breaks after its chunks.
#[derive(Clone, Copy)]
pub enum Fault {
    Error,
    Panic,
}

impl ScriptedProvider {
    pub fn streaming(chunks: Vec<StreamChunk>) -> Self {
        Self { chunks, ..Default::default() }
    }

    pub fn gated(chunks: Vec<StreamChunk>, gate_at: usize, gate: Arc<Notify>) -> Self {
        Self { chunks, gate: Some((gate_at, gate)), ..Default::default() }
    }

    pub fn failing(chunks: Vec<StreamChunk>, fault: Fault) -> Self {
        Self { chunks, fault: Some(fault), ..Default::default() }
    }

    pub fn replies(replies: Vec<TurnResponse>) -> Self {
        Self { replies: Mutex::new(replies.into()), ..Default::default() }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait::async_trait]
impl ChatProvider for ScriptedProvider {
    async fn send_turn(&self, req: &TurnRequest) -> Result<TurnResponse> {
        self.requests.lock().push(req.clone());
        let mut replies = self.replies.lock();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        Ok(reply.unwrap_or_default())
    }

    async fn stream_turn(&self, req: &TurnRequest) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        self.requests.lock().push(req.clone());
        let chunks = self.chunks.clone();
        let gate = self.gate.clone();
        let fault = self.fault;
        Ok(Box::pin(async_stream::stream! {
            for (i, chunk) in chunks.into_iter().enumerate() {
                if let Some((at, notify)) = &gate {
                    if *at == i {
                        notify.notified().await;
                    }
                }
                yield Ok(chunk);
            }
            match fault {
                Some(Fault::Error) => {
                    yield Err(Error::Provider {
                        provider: "scripted".into(),
                        message: "connection reset mid-stream".into(),
                    });
                }
                Some(Fault::Panic) => panic!("scripted provider crashed"),
                None => {}
            }
        }))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

pub fn text(t: &str) -> StreamChunk {
    StreamChunk::Text { text: t.into() }
}

pub fn done() -> StreamChunk {
    StreamChunk::Done { usage: None }
}

pub fn call(name: &str, args: serde_json::Value) -> TurnResponse {
    TurnResponse {
        function_calls: vec![FunctionCall { name: name.into(), args }],
        model: "scripted".into(),
        ..Default::default()
    }
}

pub fn reply(text: &str) -> TurnResponse {
    TurnResponse {
        text: text.into(),
        model: "scripted".into(),
        ..Default::default()
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<FileChatStore>,
    pub runtime: Arc<ChatRuntime>,
}

pub fn harness(provider: Option<Arc<dyn ChatProvider>>) -> Harness {
    harness_with(provider, LlmConfig::default())
}

pub fn harness_with(provider: Option<Arc<dyn ChatProvider>>, llm: LlmConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileChatStore::open(dir.path()).unwrap());
    let chat_store: Arc<dyn ChatStore> = store.clone();
    let runtime = Arc::new(ChatRuntime::new(
        provider,
        None,
        chat_store,
        Arc::new(ToolRegistry::with_builtin()),
        Arc::new(KeywordClassifier::from_config(&RoutingConfig::default()).unwrap()),
        llm,
    ));
    Harness { dir, store, runtime }
}

/// A conversation for `ana` with a pending (unsaved) session.
pub fn pending_conversation() -> SharedConversation {
    let mut conv = Conversation::new("ana", Some("Ana Lee".into()));
    conv.start_new();
    Arc::new(Mutex::new(conv))
}

pub async fn next_event(rx: &mut mpsc::Receiver<TurnEvent>) -> Option<TurnEvent> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("turn event timed out")
}

/// Drain until the runtime drops its sender.
pub async fn drain(rx: &mut mpsc::Receiver<TurnEvent>) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Some(event) = next_event(rx).await {
        events.push(event);
    }
    events
}

pub fn names(events: &[TurnEvent]) -> Vec<&'static str> {
    events.iter().map(TurnEvent::name).collect()
}
