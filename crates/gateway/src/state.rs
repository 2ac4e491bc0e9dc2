use std::sync::Arc;

use tc_contextpack::AttachmentProcessor;
use tc_domain::config::Config;
use tc_sessions::{ChatStore, UserStore};
use tc_youtube::{Crawler, JobStore};

use crate::runtime::{ChatRuntime, ConversationMap};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, persistence, users
/// - **Chat**: turn runtime, attachment processing, open conversations
/// - **Crawler**: download jobs and the channel crawler
/// - **Security**: token hash computed at startup
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<dyn ChatStore>,
    pub users: Arc<UserStore>,

    // ── Chat ──────────────────────────────────────────────────────────
    pub runtime: Arc<ChatRuntime>,
    pub attachments: AttachmentProcessor,
    pub conversations: Arc<ConversationMap>,

    // ── Crawler ───────────────────────────────────────────────────────
    pub jobs: Arc<dyn JobStore>,
    /// `None` when no YouTube API key is configured.
    pub crawler: Option<Arc<Crawler>>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
