//! The persistence seam used by the chat runtime.

use std::path::Path;

use serde_json::Value;
use tc_domain::chat::{ChatMessage, ImageRef};
use tc_domain::error::{Error, Result};

use crate::blobs::{ImageStore, JsonBlobStore};
use crate::store::{SessionRecord, SessionStore};
use crate::transcript::TranscriptWriter;

/// URL prefix under which stored user images are served.
pub const IMAGE_URL_PREFIX: &str = "/api/images";

/// Sessions, messages and stored payloads.
///
/// Message content must be display text only; images are stored through
/// [`ChatStore::put_image`] and referenced from the message.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_session(
        &self,
        username: &str,
        agent: Option<String>,
        title: Option<String>,
    ) -> Result<SessionRecord>;
    async fn get_session(&self, id: &str) -> Result<SessionRecord>;
    /// Newest first.
    async fn list_sessions(&self, username: &str) -> Result<Vec<SessionRecord>>;
    async fn delete_session(&self, id: &str) -> Result<()>;
    async fn rename_session(&self, id: &str, title: Option<String>) -> Result<()>;
    async fn append_message(&self, session_id: &str, message: &ChatMessage) -> Result<()>;
    /// Messages in order, with ids rewritten to `<sessionId>-<index>`.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
    async fn upload_json_blob(&self, data: &Value) -> Result<String>;
    async fn fetch_json_blob(&self, id: &str) -> Result<Value>;
    async fn put_image(&self, mime_type: &str, data: &str) -> Result<ImageRef>;
    /// Bytes and MIME type of a stored image, by file name.
    async fn fetch_image(&self, file: &str) -> Result<(Vec<u8>, &'static str)>;
    async fn session_count(&self) -> usize;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// On-disk implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FileChatStore {
    sessions: SessionStore,
    transcripts: TranscriptWriter,
    blobs: JsonBlobStore,
    images: ImageStore,
}

impl FileChatStore {
    /// Lay out `sessions/`, `json/` and `images/` under `state_path`.
    pub fn open(state_path: &Path) -> Result<Self> {
        let sessions = SessionStore::new(state_path)?;
        let transcripts = TranscriptWriter::new(sessions.dir());
        Ok(Self {
            sessions,
            transcripts,
            blobs: JsonBlobStore::new(&state_path.join("json"))?,
            images: ImageStore::new(&state_path.join("images"), IMAGE_URL_PREFIX)?,
        })
    }

}

#[async_trait::async_trait]
impl ChatStore for FileChatStore {
    async fn create_session(
        &self,
        username: &str,
        agent: Option<String>,
        title: Option<String>,
    ) -> Result<SessionRecord> {
        self.sessions.create(username, agent, title)
    }

    async fn get_session(&self, id: &str) -> Result<SessionRecord> {
        self.sessions
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))
    }

    async fn list_sessions(&self, username: &str) -> Result<Vec<SessionRecord>> {
        Ok(self.sessions.list_for(username))
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.sessions.delete(id)?;
        self.transcripts.remove(id).await
    }

    async fn rename_session(&self, id: &str, title: Option<String>) -> Result<()> {
        self.sessions.rename(id, title)
    }

    async fn append_message(&self, session_id: &str, message: &ChatMessage) -> Result<()> {
        if self.sessions.get(session_id).is_none() {
            return Err(Error::NotFound(format!("session {session_id}")));
        }
        self.transcripts.append(session_id, message).await?;
        self.sessions.record_message(session_id)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let mut messages = self.transcripts.read(session_id).await?;
        for (i, m) in messages.iter_mut().enumerate() {
            m.id = format!("{session_id}-{i}");
        }
        Ok(messages)
    }

    async fn upload_json_blob(&self, data: &Value) -> Result<String> {
        self.blobs.put(data).await
    }

    async fn fetch_json_blob(&self, id: &str) -> Result<Value> {
        self.blobs.get(id).await
    }

    async fn put_image(&self, mime_type: &str, data: &str) -> Result<ImageRef> {
        self.images.put(mime_type, data).await
    }

    async fn fetch_image(&self, file: &str) -> Result<(Vec<u8>, &'static str)> {
        self.images.get(file).await
    }

    async fn session_count(&self) -> usize {
        self.sessions.count()
    }
}
