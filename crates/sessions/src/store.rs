//! Chat session index.
//!
//! Persists session records in `sessions.json` under the configured state
//! path. Message bodies live in per-session transcripts; this file only
//! tracks ownership, titles and counts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tc_domain::error::{Error, Result};
use tc_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    /// Load or create the store at `state_path/sessions/sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir)?;

        let sessions_path = dir.join("sessions.json");
        let sessions: HashMap<String, SessionRecord> = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "sessions.json unreadable, starting empty");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(sessions),
        })
    }

    /// Directory holding the store and its transcripts.
    pub fn dir(&self) -> &Path {
        self.sessions_path.parent().unwrap_or(Path::new("."))
    }

    pub fn create(&self, username: &str, agent: Option<String>, title: Option<String>) -> Result<SessionRecord> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::Validation("username required".into()));
        }
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            agent,
            title,
            created_at: Utc::now(),
            message_count: 0,
        };
        self.sessions.write().insert(record.id.clone(), record.clone());
        self.flush()?;

        TraceEvent::SessionCreated {
            session_id: record.id.clone(),
            owner: record.username.clone(),
        }
        .emit();

        Ok(record)
    }

    pub fn get(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(id).cloned()
    }

    /// Sessions owned by `username`, newest first.
    pub fn list_for(&self, username: &str) -> Vec<SessionRecord> {
        let mut out: Vec<SessionRecord> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.username == username)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        out
    }

    /// Returns whether a record was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    pub fn rename(&self, id: &str, title: Option<String>) -> Result<()> {
        {
            let mut sessions = self.sessions.write();
            let record = sessions
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
            record.title = title;
        }
        self.flush()
    }

    pub fn record_message(&self, id: &str) -> Result<()> {
        {
            let mut sessions = self.sessions.write();
            let record = sessions
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
            record.message_count += 1;
        }
        self.flush()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Persist the current state to disk.
    pub fn flush(&self) -> Result<()> {
        let json = {
            let sessions = self.sessions.read();
            serde_json::to_string_pretty(&*sessions)
                .map_err(|e| Error::Other(format!("serializing sessions: {e}")))?
        };
        std::fs::write(&self.sessions_path, json)?;
        Ok(())
    }
}
