//! Per-client chat state: which session is active, the in-memory
//! transcript, and the transient attachment context.
//!
//! A conversation moves `NoSession -> Pending -> Persisted`. The session
//! record is only created when the first message of a pending session is
//! sent. Attachment context is never persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use tc_contextpack::attachments::{ChannelData, CsvAttachment, ImageAttachment};
use tc_contextpack::{ProcessedCsv, TabularContext};
use tc_domain::chat::ChatMessage;
use tc_domain::error::{Error, Result};
use tc_domain::tool::Role;
use tc_sessions::SessionRecord;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session phase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Fresh login, nothing selected yet.
    NoSession,
    /// New chat, not yet saved.
    Pending,
    Persisted {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl SessionPhase {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionPhase::Persisted { session_id } => Some(session_id),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Attachment context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Kinds a client can detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSlot {
    Csv,
    Json,
    Image(usize),
}

impl AttachmentSlot {
    pub fn parse(kind: &str, index: Option<usize>) -> Result<Self> {
        match (kind, index) {
            ("csv", _) => Ok(Self::Csv),
            ("json", _) => Ok(Self::Json),
            ("image", Some(i)) => Ok(Self::Image(i)),
            ("image", None) => Err(Error::Validation("image index required".into())),
            (other, _) => Err(Error::Validation(format!("unknown attachment kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentContext {
    /// CSV chip attached and not yet sent.
    pub pending_csv: Option<CsvAttachment>,
    /// Parsed rows, summary and slim projection. Outlives the chip.
    pub tabular: Option<Arc<TabularContext>>,
    pub channel: Option<Arc<ChannelData>>,
    pub images: Vec<ImageAttachment>,
}

impl AttachmentContext {
    pub fn attach_csv(&mut self, csv: ProcessedCsv) {
        self.pending_csv = Some(csv.chip);
        self.tabular = Some(Arc::new(csv.context));
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Removing the CSV drops the chip and the rows behind it.
    pub fn remove(&mut self, slot: AttachmentSlot) -> Result<()> {
        match slot {
            AttachmentSlot::Csv => {
                self.pending_csv = None;
                self.tabular = None;
            }
            AttachmentSlot::Json => self.channel = None,
            AttachmentSlot::Image(i) => {
                if i >= self.images.len() {
                    return Err(Error::NotFound(format!("image {i}")));
                }
                self.images.remove(i);
            }
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a session switch requires from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectAction {
    /// Already active.
    Noop,
    /// Session was created by this conversation's last send; the
    /// in-memory transcript is authoritative.
    KeepInMemory,
    /// Load the transcript from the store.
    Reload(String),
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub phase: SessionPhase,
    pub messages: Vec<ChatMessage>,
    pub attachments: AttachmentContext,
    /// A reply is in flight; sends are refused.
    pub awaiting_reply: bool,
    just_created: Option<String>,
    last_active: Instant,
}

impl Conversation {
    pub fn new(username: &str, display_name: Option<String>) -> Self {
        Self {
            id: format!("conv_{}", uuid::Uuid::new_v4().simple()),
            username: username.to_string(),
            display_name,
            phase: SessionPhase::NoSession,
            messages: Vec::new(),
            attachments: AttachmentContext::default(),
            awaiting_reply: false,
            just_created: None,
            last_active: Instant::now(),
        }
    }

    /// Refuse session changes while a reply is in flight.
    pub fn ensure_idle(&self) -> Result<()> {
        if self.awaiting_reply {
            return Err(Error::SessionBusy("a reply is still pending".into()));
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.phase.session_id()
    }

    /// "New chat": everything goes, including channel data and rows.
    pub fn start_new(&mut self) {
        self.phase = SessionPhase::Pending;
        self.messages.clear();
        self.attachments.clear();
        self.just_created = None;
    }

    /// Switch to a saved session. Attachments are always discarded unless
    /// the session is already active. Switching away is refused while a
    /// reply is pending.
    pub fn select(&mut self, session_id: &str) -> Result<SelectAction> {
        if self.just_created.as_deref() == Some(session_id) {
            self.just_created = None;
            return Ok(SelectAction::KeepInMemory);
        }
        if self.session_id() == Some(session_id) {
            return Ok(SelectAction::Noop);
        }
        self.ensure_idle()?;
        self.phase = SessionPhase::Persisted {
            session_id: session_id.to_string(),
        };
        self.messages.clear();
        self.attachments.clear();
        self.just_created = None;
        Ok(SelectAction::Reload(session_id.to_string()))
    }

    /// Install a loaded transcript if the session is still active.
    pub fn load_messages(&mut self, session_id: &str, messages: Vec<ChatMessage>) -> bool {
        if self.session_id() != Some(session_id) {
            return false;
        }
        self.messages = messages;
        true
    }

    /// The first send of a pending session created `session_id`. Fails if
    /// the conversation left the pending phase in the meantime.
    pub fn mark_created(&mut self, session_id: &str) -> Result<()> {
        if self.phase != SessionPhase::Pending {
            return Err(Error::Conflict(
                "conversation switched sessions while the message was being sent".into(),
            ));
        }
        self.phase = SessionPhase::Persisted {
            session_id: session_id.to_string(),
        };
        self.just_created = Some(session_id.to_string());
        Ok(())
    }

    /// React to a deletion. Returns the session to switch to when the
    /// active one was removed and others remain; `remaining` is newest
    /// first.
    pub fn on_session_deleted(&mut self, deleted: &str, remaining: &[SessionRecord]) -> Option<String> {
        if self.just_created.as_deref() == Some(deleted) {
            self.just_created = None;
        }
        if self.session_id() != Some(deleted) {
            return None;
        }
        match remaining.first() {
            Some(next) => {
                self.phase = SessionPhase::NoSession;
                self.messages.clear();
                Some(next.id.clone())
            }
            None => {
                self.start_new();
                None
            }
        }
    }

    /// Something to send, and nothing in flight.
    pub fn can_send(&self, text: &str) -> bool {
        if self.awaiting_reply || self.phase == SessionPhase::NoSession {
            return false;
        }
        !text.trim().is_empty()
            || !self.attachments.images.is_empty()
            || self.attachments.pending_csv.is_some()
            || self.attachments.channel.is_some()
    }

    /// Badge for the outgoing user message: only the first user message
    /// in the session that carries each attachment kind gets one.
    pub fn badges(&self) -> (Option<String>, Option<String>) {
        let has_csv_badge = self
            .messages
            .iter()
            .any(|m| m.role == Role::User && m.csv_name.is_some());
        let has_json_badge = self
            .messages
            .iter()
            .any(|m| m.role == Role::User && m.json_name.is_some());
        let csv = self
            .attachments
            .pending_csv
            .as_ref()
            .filter(|_| !has_csv_badge)
            .map(|c| c.name.clone());
        let json = self
            .attachments
            .channel
            .as_ref()
            .filter(|_| !has_json_badge)
            .map(|c| c.name.clone());
        (csv, json)
    }

    pub fn view(&self) -> ConversationView {
        ConversationView {
            id: self.id.clone(),
            username: self.username.clone(),
            session: self.phase.clone(),
            awaiting_reply: self.awaiting_reply,
            messages: self.messages.clone(),
            attachments: AttachmentView {
                csv: self.attachments.pending_csv.clone(),
                dataset_columns: self
                    .attachments
                    .tabular
                    .as_ref()
                    .map(|t| t.data.headers.clone()),
                json: self.attachments.channel.as_ref().map(|c| JsonChipView {
                    name: c.name.clone(),
                    json_id: c.json_id.clone(),
                    summary: c.summary.clone(),
                }),
                images: self.attachments.images.clone(),
            },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire views
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub username: String,
    pub session: SessionPhase,
    pub awaiting_reply: bool,
    pub messages: Vec<ChatMessage>,
    pub attachments: AttachmentView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    /// Base64 payload is not serialized.
    pub csv: Option<CsvAttachment>,
    pub dataset_columns: Option<Vec<String>>,
    pub json: Option<JsonChipView>,
    pub images: Vec<ImageAttachment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonChipView {
    pub name: String,
    pub json_id: String,
    pub summary: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type SharedConversation = Arc<Mutex<Conversation>>;

/// Open conversations by id. Guards are never held across an await.
#[derive(Default)]
pub struct ConversationMap {
    inner: Mutex<HashMap<String, SharedConversation>>,
}

impl ConversationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conversation: Conversation) -> SharedConversation {
        let id = conversation.id.clone();
        let shared = Arc::new(Mutex::new(conversation));
        self.inner.lock().insert(id, shared.clone());
        shared
    }

    /// Look up a conversation and mark it active.
    pub fn get(&self, id: &str) -> Result<SharedConversation> {
        let shared = self
            .inner
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))?;
        shared.lock().touch();
        Ok(shared)
    }

    pub fn remove(&self, id: &str) -> Option<SharedConversation> {
        self.inner.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop conversations untouched for `max_idle`. Ones with a reply in
    /// flight, or locked right now, are kept. Returns how many went.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|_, shared| match shared.try_lock() {
            Some(conv) => conv.awaiting_reply || conv.idle_for() < max_idle,
            None => true,
        });
        before - map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tc_contextpack::attachments::TabularData;

    fn chip(name: &str) -> ProcessedCsv {
        ProcessedCsv {
            chip: CsvAttachment {
                name: name.into(),
                headers: vec!["views".into()],
                row_count: 1,
                preview: "views\n1".into(),
                base64: "dmlld3MKMQ==".into(),
                truncated: false,
            },
            context: TabularContext {
                data: TabularData { headers: vec!["views".into()], rows: Vec::new() },
                summary: "1 rows".into(),
                slim: None,
            },
        }
    }

    fn channel() -> Arc<ChannelData> {
        Arc::new(ChannelData {
            name: "chan.json".into(),
            data: serde_json::json!({"videos": []}),
            json_id: "json_1_abc".into(),
            summary: "0 videos. Fields: ".into(),
        })
    }

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            username: "ana".into(),
            agent: None,
            title: None,
            created_at: Utc::now(),
            message_count: 0,
        }
    }

    #[test]
    fn fresh_conversation_cannot_send_until_pending() {
        let mut conv = Conversation::new("ana", None);
        assert_eq!(conv.phase, SessionPhase::NoSession);
        assert!(!conv.can_send("hi"));
        conv.start_new();
        assert!(conv.can_send("hi"));
        assert!(!conv.can_send("   "));
    }

    #[test]
    fn attachments_alone_allow_sending() {
        let mut conv = Conversation::new("ana", None);
        conv.start_new();
        conv.attachments.attach_csv(chip("a.csv"));
        assert!(conv.can_send(""));
        conv.attachments.pending_csv = None;
        assert!(!conv.can_send(""));
        conv.attachments.channel = Some(channel());
        assert!(conv.can_send(""));
    }

    #[test]
    fn in_flight_reply_blocks_sending() {
        let mut conv = Conversation::new("ana", None);
        conv.start_new();
        conv.awaiting_reply = true;
        assert!(!conv.can_send("hi"));
    }

    #[test]
    fn selecting_another_session_discards_attachments() {
        let mut conv = Conversation::new("ana", None);
        conv.start_new();
        conv.attachments.attach_csv(chip("a.csv"));
        conv.attachments.channel = Some(channel());
        conv.messages.push(ChatMessage::new(Role::User, "old"));

        assert_eq!(conv.select("s1").unwrap(), SelectAction::Reload("s1".into()));
        assert!(conv.attachments.pending_csv.is_none());
        assert!(conv.attachments.tabular.is_none());
        assert!(conv.attachments.channel.is_none());
        assert!(conv.messages.is_empty());
        assert_eq!(conv.select("s1").unwrap(), SelectAction::Noop);
    }

    #[test]
    fn select_right_after_creation_keeps_transcript() {
        let mut conv = Conversation::new("ana", None);
        conv.start_new();
        conv.messages.push(ChatMessage::new(Role::User, "hi"));
        conv.messages.push(ChatMessage::new(Role::Model, "hello"));
        conv.mark_created("s9").unwrap();

        assert_eq!(conv.select("s9").unwrap(), SelectAction::KeepInMemory);
        assert_eq!(conv.messages.len(), 2);
        // Only suppressed once.
        assert_eq!(conv.select("s9").unwrap(), SelectAction::Noop);
    }

    #[test]
    fn stale_loads_are_ignored() {
        let mut conv = Conversation::new("ana", None);
        conv.select("s1").unwrap();
        conv.select("s2").unwrap();
        assert!(!conv.load_messages("s1", vec![ChatMessage::new(Role::User, "x")]));
        assert!(conv.load_messages("s2", vec![ChatMessage::new(Role::User, "y")]));
        assert_eq!(conv.messages[0].content, "y");
    }

    #[test]
    fn deleting_active_session_falls_back() {
        let mut conv = Conversation::new("ana", None);
        conv.select("s1").unwrap();
        assert_eq!(conv.on_session_deleted("s1", &[record("s2")]), Some("s2".into()));

        conv.select("s2").unwrap();
        assert_eq!(conv.on_session_deleted("s2", &[]), None);
        assert_eq!(conv.phase, SessionPhase::Pending);

        conv.select("s3").unwrap();
        assert_eq!(conv.on_session_deleted("other", &[]), None);
        assert_eq!(conv.session_id(), Some("s3"));
    }

    #[test]
    fn pending_reply_blocks_switching_away() {
        let mut conv = Conversation::new("ana", None);
        conv.select("s1").unwrap();
        conv.messages.push(ChatMessage::new(Role::User, "hi"));
        conv.awaiting_reply = true;

        assert!(matches!(conv.select("s2"), Err(Error::SessionBusy(_))));
        assert_eq!(conv.session_id(), Some("s1"));
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.select("s1").unwrap(), SelectAction::Noop);
        assert!(conv.ensure_idle().is_err());

        conv.awaiting_reply = false;
        assert!(conv.ensure_idle().is_ok());
        assert_eq!(conv.select("s2").unwrap(), SelectAction::Reload("s2".into()));
    }

    #[test]
    fn creation_is_rejected_once_the_conversation_moved_on() {
        let mut conv = Conversation::new("ana", None);
        conv.start_new();
        conv.select("s1").unwrap();
        assert!(matches!(conv.mark_created("s9"), Err(Error::Conflict(_))));
        assert_eq!(conv.session_id(), Some("s1"));
        assert_eq!(conv.select("s9").unwrap(), SelectAction::Reload("s9".into()));
    }

    #[test]
    fn idle_conversations_are_evicted() {
        let map = ConversationMap::new();
        let idle = map.insert(Conversation::new("ana", None));
        let busy = map.insert(Conversation::new("bo", None));
        let idle_id = idle.lock().id.clone();
        let busy_id = busy.lock().id.clone();
        busy.lock().awaiting_reply = true;

        assert_eq!(map.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(map.evict_idle(Duration::ZERO), 1);
        assert!(map.get(&idle_id).is_err());
        assert!(map.get(&busy_id).is_ok());

        // A held guard counts as activity.
        let guard = busy.lock();
        assert_eq!(map.evict_idle(Duration::ZERO), 0);
        drop(guard);
        busy.lock().awaiting_reply = false;
        assert_eq!(map.evict_idle(Duration::ZERO), 1);
        assert!(map.is_empty());
    }

    #[test]
    fn lookups_refresh_activity() {
        let map = ConversationMap::new();
        let conv = map.insert(Conversation::new("ana", None));
        let id = conv.lock().id.clone();
        std::thread::sleep(Duration::from_millis(20));
        assert!(conv.lock().idle_for() >= Duration::from_millis(20));
        map.get(&id).unwrap();
        assert!(conv.lock().idle_for() < Duration::from_millis(20));
    }

    #[test]
    fn badges_only_on_first_use() {
        let mut conv = Conversation::new("ana", None);
        conv.start_new();
        conv.attachments.attach_csv(chip("a.csv"));
        conv.attachments.channel = Some(channel());
        assert_eq!(conv.badges(), (Some("a.csv".into()), Some("chan.json".into())));

        let mut first = ChatMessage::new(Role::User, "hi");
        first.csv_name = Some("a.csv".into());
        conv.messages.push(first);
        assert_eq!(conv.badges(), (None, Some("chan.json".into())));
    }

    #[test]
    fn removing_attachments() {
        let mut ctx = AttachmentContext::default();
        ctx.attach_csv(chip("a.csv"));
        ctx.images.push(ImageAttachment::from_bytes("a.png", "image/png", &[1]));
        assert!(matches!(ctx.remove(AttachmentSlot::Image(3)), Err(Error::NotFound(_))));
        ctx.remove(AttachmentSlot::Image(0)).unwrap();
        ctx.remove(AttachmentSlot::Csv).unwrap();
        assert!(ctx.images.is_empty());
        assert!(ctx.tabular.is_none());
    }

    #[test]
    fn slot_parsing() {
        assert_eq!(AttachmentSlot::parse("image", Some(1)).unwrap(), AttachmentSlot::Image(1));
        assert!(AttachmentSlot::parse("image", None).is_err());
        assert!(AttachmentSlot::parse("pdf", None).is_err());
    }

    #[test]
    fn view_hides_payloads() {
        let mut conv = Conversation::new("ana", None);
        conv.start_new();
        conv.attachments.attach_csv(chip("a.csv"));
        let v = serde_json::to_value(conv.view()).unwrap();
        assert_eq!(v["session"]["state"], "pending");
        assert_eq!(v["attachments"]["csv"]["rowCount"], 1);
        assert!(!v.to_string().contains("dmlld3MKMQ=="));
    }
}
