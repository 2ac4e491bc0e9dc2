//! Append-only JSONL transcripts.
//!
//! Each session gets a `<sessionId>.jsonl` file under the sessions
//! directory; every persisted [`ChatMessage`] is one line. Reads go
//! through an in-memory write-through cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tc_domain::chat::ChatMessage;
use tc_domain::error::{Error, Result};
use tc_domain::trace::TraceEvent;

pub struct TranscriptWriter {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl TranscriptWriter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.jsonl"))
    }

    /// Append one message. The cache is only updated after the disk
    /// write succeeds.
    pub async fn append(&self, session_id: &str, message: &ChatMessage) -> Result<()> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| Error::Other(format!("serializing transcript line: {e}")))?;
        line.push('\n');
        let path = self.path_for(session_id);

        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(line.as_bytes())?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        // Only extend a cache that was already loaded; a cold cache
        // reloads the whole file on the next read.
        {
            let mut cache = self.cache.write();
            if let Some(lines) = cache.get_mut(session_id) {
                lines.push(message.clone());
            }
        }

        TraceEvent::MessageAppended {
            session_id: session_id.to_owned(),
            role: message.role.as_str().to_string(),
            chars: message.content.chars().count(),
        }
        .emit();

        Ok(())
    }

    /// All messages of a session in append order. Missing files read as
    /// empty.
    pub async fn read(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let cached = self.cache.read().get(session_id).cloned();
        if let Some(lines) = cached {
            return Ok(lines);
        }

        let path = self.path_for(session_id);
        let sid = session_id.to_owned();
        let lines = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &sid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache.write().insert(session_id.to_owned(), lines.clone());
        Ok(lines)
    }

    /// Drop the transcript file and its cache entry.
    pub async fn remove(&self, session_id: &str) -> Result<()> {
        self.cache.write().remove(session_id);
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn read_jsonl_file(path: &Path, session_id: &str) -> Result<Vec<ChatMessage>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChatMessage>(line) {
            Ok(msg) => lines.push(msg),
            Err(e) => {
                tracing::warn!(
                    session_id = session_id,
                    error = %e,
                    "skipping malformed transcript line"
                );
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_domain::tool::Role;

    #[tokio::test]
    async fn append_then_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        writer.append("s1", &ChatMessage::new(Role::User, "hi")).await.unwrap();
        writer.append("s1", &ChatMessage::new(Role::Model, "hello")).await.unwrap();

        let fresh = TranscriptWriter::new(dir.path());
        let msgs = fresh.read("s1").await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "hi");
        assert_eq!(msgs[1].role, Role::Model);
    }

    #[tokio::test]
    async fn cached_read_sees_later_appends() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        assert!(writer.read("s1").await.unwrap().is_empty());
        writer.append("s1", &ChatMessage::new(Role::User, "hi")).await.unwrap();
        assert_eq!(writer.read("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        writer.append("s1", &ChatMessage::new(Role::User, "ok")).await.unwrap();
        {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(dir.path().join("s1.jsonl"))
                .unwrap();
            writeln!(f, "{{not json").unwrap();
        }
        let msgs = TranscriptWriter::new(dir.path()).read("s1").await.unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        writer.append("s1", &ChatMessage::new(Role::User, "x")).await.unwrap();
        writer.remove("s1").await.unwrap();
        writer.remove("s1").await.unwrap();
        assert!(writer.read("s1").await.unwrap().is_empty());
    }
}
