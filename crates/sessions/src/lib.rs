//! Persistence for tubechat.
//!
//! Everything lives under the configured state path: `sessions.json` plus
//! one append-only `<sessionId>.jsonl` transcript per session, stored JSON
//! blobs, uploaded images and `users.json`. [`ChatStore`] is the seam the
//! gateway talks to; [`FileChatStore`] is the on-disk implementation.

pub mod blobs;
pub mod chat_store;
pub mod store;
pub mod transcript;
pub mod users;

pub use blobs::{ImageStore, JsonBlobStore};
pub use chat_store::{ChatStore, FileChatStore};
pub use store::{SessionRecord, SessionStore};
pub use transcript::TranscriptWriter;
pub use users::{NewUser, PublicUser, UserStore};

/// `<prefix>_<unix millis>_<8 lowercase hex chars>`
pub(crate) fn timestamped_id(prefix: &str) -> String {
    let rand = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &rand[..8]
    )
}
