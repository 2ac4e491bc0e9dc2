//! Turn execution: prepare the prompt, call the model in the routed mode,
//! run tools, and reconcile the reply into the conversation.
//!
//! Entry point: [`ChatRuntime::start_turn`] does the synchronous part
//! (session creation, routing, optimistic user message) and spawns the
//! model exchange, returning a channel of [`TurnEvent`]s.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, OwnedSemaphorePermit};

use tc_contextpack::attachments::{ChannelData, ImageAttachment};
use tc_contextpack::{assemble, route, IntentClassifier, PromptInputs, TabularContext, TurnIntent, TurnSignals};
use tc_domain::chat::{ChatMessage, ResponsePart};
use tc_domain::config::LlmConfig;
use tc_domain::error::{Error, Result};
use tc_domain::stream::Usage;
use tc_domain::tool::{Message, Role};
use tc_domain::trace::TraceEvent;
use tc_providers::{ChatProvider, ImageGenerator, ModelMode, TurnRequest};
use tc_sessions::ChatStore;
use tc_tools::{ToolContext, ToolRegistry};

use super::cancel::{CancelMap, CancelToken};
use super::conversation::SharedConversation;
use super::reconcile::{LiveUpdate, Reconciler, TurnOutcome};
use super::session_lock::SessionLockMap;

/// Agent label on sessions created from chat.
pub const SESSION_AGENT: &str = "lisa";

const TURN_ABORTED: &str = "the reply was interrupted by an internal error";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent: the SSE event type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted during a single turn. Exactly one of `final`,
/// `stopped` or `error` ends every turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// The optimistic user message, before any model output.
    #[serde(rename = "user_message")]
    UserMessage {
        session_id: String,
        mode: &'static str,
        message: ChatMessage,
    },

    #[serde(rename = "assistant_delta")]
    AssistantDelta { text: String },

    /// Structured code-execution output replacing the streamed text.
    #[serde(rename = "parts")]
    Parts { parts: Vec<ResponsePart> },

    #[serde(rename = "tool_call")]
    ToolCall { name: String, args: Value },

    #[serde(rename = "tool_result")]
    ToolResult {
        name: String,
        result: Value,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },

    #[serde(rename = "final")]
    Final { message: ChatMessage },

    /// Stop was requested; `message` holds whatever accrued.
    #[serde(rename = "stopped")]
    Stopped { message: ChatMessage },

    /// The turn failed; `message` is the persisted `Error: ...` reply.
    #[serde(rename = "error")]
    Error { error: String, message: ChatMessage },

    #[serde(rename = "usage")]
    Usage {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
    },
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::UserMessage { .. } => "user_message",
            TurnEvent::AssistantDelta { .. } => "assistant_delta",
            TurnEvent::Parts { .. } => "parts",
            TurnEvent::ToolCall { .. } => "tool_call",
            TurnEvent::ToolResult { .. } => "tool_result",
            TurnEvent::Final { .. } => "final",
            TurnEvent::Stopped { .. } => "stopped",
            TurnEvent::Error { .. } => "error",
            TurnEvent::Usage { .. } => "usage",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ChatRuntime {
    provider: Option<Arc<dyn ChatProvider>>,
    image_generator: Option<Arc<dyn ImageGenerator>>,
    store: Arc<dyn ChatStore>,
    tools: Arc<ToolRegistry>,
    classifier: Arc<dyn IntentClassifier>,
    llm: LlmConfig,
    cancels: CancelMap,
    locks: SessionLockMap,
}

/// Everything the spawned half of a turn needs, captured up front.
struct PreparedTurn {
    conversation: SharedConversation,
    conversation_id: String,
    session_id: String,
    intent: TurnIntent,
    system_instruction: String,
    messages: Vec<Message>,
    user_message: ChatMessage,
    placeholder_id: String,
    channel: Option<Arc<ChannelData>>,
    tabular: Option<Arc<TabularContext>>,
    images: Vec<ImageAttachment>,
}

impl PreparedTurn {
    fn handle(&self) -> TurnHandle {
        TurnHandle {
            conversation: self.conversation.clone(),
            conversation_id: self.conversation_id.clone(),
            session_id: self.session_id.clone(),
            placeholder_id: self.placeholder_id.clone(),
        }
    }
}

/// What finalization touches. Outlives the turn task so a crashed turn
/// can still be closed.
struct TurnHandle {
    conversation: SharedConversation,
    conversation_id: String,
    session_id: String,
    placeholder_id: String,
}

/// Snapshot taken under the conversation lock.
struct Snapshot {
    conversation_id: String,
    username: String,
    display_name: Option<String>,
    session_id: Option<String>,
    history: Vec<Message>,
    badges: (Option<String>, Option<String>),
    attachments: super::conversation::AttachmentContext,
}

impl ChatRuntime {
    pub fn new(
        provider: Option<Arc<dyn ChatProvider>>,
        image_generator: Option<Arc<dyn ImageGenerator>>,
        store: Arc<dyn ChatStore>,
        tools: Arc<ToolRegistry>,
        classifier: Arc<dyn IntentClassifier>,
        llm: LlmConfig,
    ) -> Self {
        Self {
            provider,
            image_generator,
            store,
            tools,
            classifier,
            llm,
            cancels: CancelMap::new(),
            locks: SessionLockMap::new(),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn image_generator(&self) -> Option<&Arc<dyn ImageGenerator>> {
        self.image_generator.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Signal the running turn of a conversation. Returns false when
    /// nothing is running.
    pub fn stop(&self, conversation_id: &str) -> bool {
        self.cancels.cancel(conversation_id)
    }

    pub fn is_running(&self, conversation_id: &str) -> bool {
        self.locks.is_busy(conversation_id)
    }

    /// Drop lock entries of conversations with no turn in flight.
    pub fn prune_idle_locks(&self) {
        self.locks.prune_idle();
    }

    /// Start a turn. Errors here happen before anything was appended to
    /// the conversation; once this returns `Ok`, the turn always ends in
    /// exactly one terminal event and one persisted model message.
    pub async fn start_turn(
        self: &Arc<Self>,
        conversation: SharedConversation,
        text: &str,
    ) -> Result<mpsc::Receiver<TurnEvent>> {
        let conversation_id = conversation.lock().id.clone();
        let permit = self.locks.try_acquire(&conversation_id)?;

        let snapshot = {
            let mut conv = conversation.lock();
            conv.ensure_idle()?;
            if !conv.can_send(text) {
                return Err(Error::Validation(
                    "nothing to send: add text, an image, a CSV or channel data".into(),
                ));
            }
            conv.awaiting_reply = true;
            Snapshot {
                conversation_id: conv.id.clone(),
                username: conv.username.clone(),
                display_name: conv.display_name.clone(),
                session_id: conv.session_id().map(str::to_string),
                history: history_of(&conv.messages),
                badges: conv.badges(),
                attachments: conv.attachments.clone(),
            }
        };

        match self.prepare(conversation.clone(), snapshot, text).await {
            Ok(prepared) => Ok(self.spawn(prepared, permit)),
            Err(e) => {
                conversation.lock().awaiting_reply = false;
                Err(e)
            }
        }
    }

    async fn prepare(
        &self,
        conversation: SharedConversation,
        snapshot: Snapshot,
        text: &str,
    ) -> Result<PreparedTurn> {
        let Snapshot {
            conversation_id,
            username,
            display_name,
            session_id,
            mut history,
            badges: (csv_name, json_name),
            attachments,
        } = snapshot;

        // ── Lazily materialize the session ───────────────────────────
        let session_id = match session_id {
            Some(id) => id,
            None => {
                let record = self
                    .store
                    .create_session(&username, Some(SESSION_AGENT.into()), Some(chat_title()))
                    .await?;
                conversation.lock().mark_created(&record.id)?;
                record.id
            }
        };

        // ── Route once, hand the intent to the assembler ────────────
        let signals = TurnSignals {
            text,
            has_rows: attachments.tabular.is_some(),
            has_json: attachments.channel.is_some(),
            has_images: !attachments.images.is_empty(),
            pending_csv: attachments.pending_csv.is_some(),
        };
        let intent = route(&signals, self.classifier.as_ref());
        TraceEvent::TurnRouted {
            conversation_id: conversation_id.clone(),
            mode: intent.name().to_string(),
            has_rows: signals.has_rows,
            has_json: signals.has_json,
            images: attachments.images.len(),
        }
        .emit();

        let prompt = assemble(&PromptInputs {
            text,
            intent,
            channel: attachments.channel.as_deref(),
            pending_csv: attachments.pending_csv.as_ref(),
            session_csv: attachments.tabular.as_deref(),
            image_count: attachments.images.len(),
        });

        // ── Images are persisted by reference ──────────────────────
        let mut image_refs = Vec::with_capacity(attachments.images.len());
        for image in &attachments.images {
            match self.store.put_image(&image.mime_type, &image.data).await {
                Ok(r) => image_refs.push(r),
                Err(e) => tracing::warn!(image = %image.name, error = %e, "image not stored"),
            }
        }

        let mut user_message = ChatMessage::new(Role::User, prompt.display);
        user_message.images = image_refs;
        user_message.csv_name = csv_name;
        user_message.json_name = json_name;

        history.push(
            Message::user(prompt.model_prompt).with_inline_data(
                attachments
                    .images
                    .iter()
                    .map(|i| (i.mime_type.clone(), i.data.clone())),
            ),
        );

        // ── Optimistic append, before any network call ───────────────
        let placeholder = ChatMessage::new(Role::Model, String::new());
        let placeholder_id = placeholder.id.clone();
        {
            let mut conv = conversation.lock();
            if conv.session_id() != Some(session_id.as_str()) {
                return Err(Error::Conflict(
                    "conversation switched sessions while the message was being sent".into(),
                ));
            }
            conv.messages.push(user_message.clone());
            conv.messages.push(placeholder);
            conv.attachments.pending_csv = None;
            conv.attachments.images.clear();
        }

        Ok(PreparedTurn {
            conversation,
            conversation_id,
            session_id,
            intent,
            system_instruction: system_instruction(&self.llm.system_instruction, display_name.as_deref()),
            messages: history,
            user_message,
            placeholder_id,
            channel: attachments.channel,
            tabular: attachments.tabular,
            images: attachments.images,
        })
    }

    fn spawn(self: &Arc<Self>, turn: PreparedTurn, permit: OwnedSemaphorePermit) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel::<TurnEvent>(64);
        let cancel = self.cancels.register(&turn.conversation_id);
        let runtime = Arc::clone(self);

        let span = tracing::info_span!(
            "turn",
            conversation_id = %turn.conversation_id,
            session_id = %turn.session_id,
            mode = turn.intent.name(),
            "otel.kind" = "SERVER",
        );
        tokio::spawn(tracing::Instrument::instrument(
            async move {
                let handle = turn.handle();
                let worker = tokio::spawn(tracing::Instrument::in_current_span({
                    let runtime = Arc::clone(&runtime);
                    let tx = tx.clone();
                    async move { runtime.run(turn, tx, cancel).await }
                }));
                if let Err(e) = worker.await {
                    runtime.recover(&handle, &tx, e).await;
                }
                drop(permit);
            },
            span,
        ));
        rx
    }

    /// Close a turn whose task died before finalizing: the placeholder
    /// becomes an error reply and the conversation accepts sends again.
    async fn recover(&self, turn: &TurnHandle, tx: &mpsc::Sender<TurnEvent>, err: tokio::task::JoinError) {
        tracing::error!(error = %err, panicked = err.is_panic(), "turn task aborted");
        self.cancels.remove(&turn.conversation_id);
        let pending = turn.conversation.lock().awaiting_reply;
        if !pending {
            return;
        }
        self.finalize(turn, tx, Reconciler::new(), TurnOutcome::Failed(TURN_ABORTED.into()))
            .await;
    }

    async fn run(&self, turn: PreparedTurn, tx: mpsc::Sender<TurnEvent>, cancel: CancelToken) {
        let _ = tx
            .send(TurnEvent::UserMessage {
                session_id: turn.session_id.clone(),
                mode: turn.intent.name(),
                message: turn.user_message.clone(),
            })
            .await;

        if let Err(e) = self.store.append_message(&turn.session_id, &turn.user_message).await {
            tracing::warn!(session_id = %turn.session_id, error = %e, "user message not persisted");
        }

        let mut reconciler = Reconciler::new();
        let outcome = match self.provider.as_deref() {
            None => TurnOutcome::Failed(format!(
                "chat provider not configured (set {})",
                self.llm.api_key_env
            )),
            Some(provider) => {
                let result = if turn.intent.is_streaming() {
                    self.stream_exchange(provider, &turn, &tx, &cancel, &mut reconciler).await
                } else {
                    self.tool_exchange(provider, &turn, &tx, &cancel, &mut reconciler).await
                };
                result.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "turn failed");
                    TurnOutcome::Failed(e.detail())
                })
            }
        };

        self.finalize(&turn.handle(), &tx, reconciler, outcome).await;
        self.cancels.remove(&turn.conversation_id);
    }

    // ── Tool-calling: single-shot exchanges, tools run locally ──────

    async fn tool_exchange(
        &self,
        provider: &dyn ChatProvider,
        turn: &PreparedTurn,
        tx: &mpsc::Sender<TurnEvent>,
        cancel: &CancelToken,
        reconciler: &mut Reconciler,
    ) -> Result<TurnOutcome> {
        let mut req = TurnRequest {
            system_instruction: Some(turn.system_instruction.clone()),
            messages: turn.messages.clone(),
            tools: self.tools.definitions(),
            mode: ModelMode::Tools,
            model: None,
        };
        let ctx = ToolContext {
            channel: turn.channel.as_ref().map(|c| &c.data),
            table: turn.tabular.as_ref().map(|t| &t.data),
            images: &turn.images,
            image_generator: self.image_generator.as_deref(),
        };

        for loop_idx in 0..self.llm.max_tool_loops {
            if cancel.is_cancelled() {
                return Ok(TurnOutcome::Cancelled);
            }
            tracing::debug!(loop_idx, "tool loop iteration");

            let started = Instant::now();
            let resp = provider.send_turn(&req).await?;
            emit_llm_request(&resp.model, ModelMode::Tools, false, started, resp.usage);
            if let Some(u) = &resp.usage {
                reconciler.add_usage(u);
            }

            if resp.function_calls.is_empty() {
                reconciler.set_reply(resp.text);
                return Ok(TurnOutcome::Completed);
            }

            req.messages.push(Message::function_calls(&resp.function_calls));
            let mut responses = Vec::with_capacity(resp.function_calls.len());
            for call in resp.function_calls {
                let _ = tx
                    .send(TurnEvent::ToolCall {
                        name: call.name.clone(),
                        args: call.args.clone(),
                    })
                    .await;
                let result = self.tools.execute(&call.name, &call.args, &ctx).await;
                let _ = tx
                    .send(TurnEvent::ToolResult {
                        name: call.name.clone(),
                        result: result.clone(),
                        is_error: result.get("error").is_some(),
                    })
                    .await;
                reconciler.record_tool(&call.name, call.args, result.clone());
                responses.push((call.name, result));
            }
            req.messages.push(Message::function_responses(responses));
        }

        Ok(TurnOutcome::Failed(format!(
            "no final answer after {} tool rounds",
            self.llm.max_tool_loops
        )))
    }

    // ── Streaming: code execution or grounded search ────────────────

    async fn stream_exchange(
        &self,
        provider: &dyn ChatProvider,
        turn: &PreparedTurn,
        tx: &mpsc::Sender<TurnEvent>,
        cancel: &CancelToken,
        reconciler: &mut Reconciler,
    ) -> Result<TurnOutcome> {
        let mode = match turn.intent {
            TurnIntent::CodeExecution { .. } => ModelMode::CodeExecution,
            _ => ModelMode::Search,
        };
        let req = TurnRequest {
            system_instruction: Some(turn.system_instruction.clone()),
            messages: turn.messages.clone(),
            tools: Vec::new(),
            mode,
            model: None,
        };

        let started = Instant::now();
        let mut stream = provider.stream_turn(&req).await?;
        let mut outcome = TurnOutcome::Completed;

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                outcome = TurnOutcome::Cancelled;
                break;
            }
            match reconciler.apply(chunk?) {
                Some(LiveUpdate::Delta(text)) => {
                    self.update_live(turn, reconciler.display_text(), None);
                    let _ = tx.send(TurnEvent::AssistantDelta { text }).await;
                }
                Some(LiveUpdate::Parts(parts)) => {
                    self.update_live(turn, reconciler.display_text(), Some(parts.clone()));
                    let _ = tx.send(TurnEvent::Parts { parts }).await;
                }
                None => {}
            }
        }
        // Abandon the transport; nothing is sent upstream on stop.
        drop(stream);

        emit_llm_request(&self.llm.model, mode, true, started, reconciler.usage());
        Ok(outcome)
    }

    fn update_live(&self, turn: &PreparedTurn, content: String, parts: Option<Vec<ResponsePart>>) {
        let mut conv = turn.conversation.lock();
        if let Some(msg) = conv.messages.iter_mut().find(|m| m.id == turn.placeholder_id) {
            msg.content = content;
            if let Some(parts) = parts {
                msg.parts = parts;
            }
        }
    }

    // ── Finalization ────────────────────────────────────────────────

    async fn finalize(
        &self,
        turn: &TurnHandle,
        tx: &mpsc::Sender<TurnEvent>,
        reconciler: Reconciler,
        outcome: TurnOutcome,
    ) {
        let usage = reconciler.usage();
        let message = reconciler.finish(turn.placeholder_id.clone(), &outcome);

        {
            let mut conv = turn.conversation.lock();
            if let Some(slot) = conv.messages.iter_mut().find(|m| m.id == turn.placeholder_id) {
                *slot = message.clone();
            }
            conv.awaiting_reply = false;
        }

        if let Err(e) = self.store.append_message(&turn.session_id, &message).await {
            tracing::warn!(session_id = %turn.session_id, error = %e, "model message not persisted");
        }

        TraceEvent::TurnFinished {
            conversation_id: turn.conversation_id.clone(),
            outcome: outcome.as_str().to_string(),
            content_chars: message.content.chars().count(),
        }
        .emit();

        let terminal = match outcome {
            TurnOutcome::Completed => TurnEvent::Final { message },
            TurnOutcome::Cancelled => TurnEvent::Stopped { message },
            TurnOutcome::Failed(error) => TurnEvent::Error { error, message },
        };
        let _ = tx.send(terminal).await;

        if let Some(u) = usage {
            let _ = tx
                .send(TurnEvent::Usage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                })
                .await;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Prior turns as plain display text. Context blocks are not replayed;
/// the dataset summary rides on every new prompt instead.
fn history_of(messages: &[ChatMessage]) -> Vec<Message> {
    messages
        .iter()
        .filter_map(|m| {
            let text = m.history_text();
            if text.is_empty() {
                return None;
            }
            Some(match m.role {
                Role::User => Message::user(text),
                Role::Model => Message::model(text),
            })
        })
        .collect()
}

fn system_instruction(base: &str, display_name: Option<&str>) -> String {
    match display_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{base}\n\nThe user's name is {name}. Address them by name when it fits."),
        None => base.to_string(),
    }
}

/// `Chat · Mar 5 14:07`, local time.
pub fn chat_title() -> String {
    chrono::Local::now().format("Chat · %b %-d %H:%M").to_string()
}

fn emit_llm_request(model: &str, mode: ModelMode, streaming: bool, started: Instant, usage: Option<Usage>) {
    TraceEvent::LlmRequest {
        model: model.to_string(),
        mode: mode.as_str().to_string(),
        streaming,
        duration_ms: started.elapsed().as_millis() as u64,
        prompt_tokens: usage.map(|u| u.prompt_tokens),
        completion_tokens: usage.map(|u| u.completion_tokens),
        total_tokens: usage.map(|u| u.total_tokens),
    }
    .emit();
}
