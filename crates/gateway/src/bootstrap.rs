//! AppState construction, shared by `serve` and the integration tests.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use tc_contextpack::{AttachmentProcessor, IntentClassifier, KeywordClassifier};
use tc_domain::config::{Config, ConfigSeverity};
use tc_providers::{
    api_key_from_env, ChatProvider, GoogleProvider, ImageGenerator, ImagenGenerator,
    RetryingProvider,
};
use tc_sessions::{ChatStore, FileChatStore, UserStore};
use tc_tools::ToolRegistry;
use tc_youtube::{Crawler, InMemoryJobStore, JobStore, YoutubeClient};

use crate::runtime::{ChatRuntime, ConversationMap};
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Persistence ──────────────────────────────────────────────────
    let store: Arc<dyn ChatStore> = Arc::new(
        FileChatStore::open(&config.storage.state_path).context("initializing chat store")?,
    );
    let users = Arc::new(
        UserStore::new(&config.storage.state_path).context("initializing user store")?,
    );
    tokio::fs::create_dir_all(&config.storage.generated_images_dir)
        .await
        .with_context(|| {
            format!(
                "creating {}",
                config.storage.generated_images_dir.display()
            )
        })?;
    tracing::info!(
        path = %config.storage.state_path.display(),
        users = users.count(),
        "stores ready"
    );

    // ── Model services ───────────────────────────────────────────────
    let (provider, image_generator) = match api_key_from_env(&config.llm.api_key_env) {
        Ok(key) => {
            let google = GoogleProvider::new(&config.llm, key.clone())
                .context("initializing Gemini provider")?;
            let provider: Arc<dyn ChatProvider> =
                Arc::new(RetryingProvider::new(google, config.llm.retry.clone()));
            let imagen: Arc<dyn ImageGenerator> = Arc::new(
                ImagenGenerator::new(&config.llm, &config.storage, &config.server, key)
                    .context("initializing image generator")?,
            );
            tracing::info!(model = %config.llm.model, image_model = %config.llm.image_model, "model services ready");
            (Some(provider), Some(imagen))
        }
        Err(e) => {
            tracing::warn!(error = %e, "no model API key — chat and image generation disabled");
            (None, None)
        }
    };

    // ── Chat runtime ─────────────────────────────────────────────────
    let classifier: Arc<dyn IntentClassifier> = Arc::new(
        KeywordClassifier::from_config(&config.routing).context("compiling routing keywords")?,
    );
    let tools = Arc::new(ToolRegistry::with_builtin());
    tracing::info!(tools = ?tools.names(), "tool registry ready");

    let runtime = Arc::new(ChatRuntime::new(
        provider,
        image_generator,
        store.clone(),
        tools,
        classifier,
        config.llm.clone(),
    ));
    let attachments = AttachmentProcessor::new(config.routing.clone());

    // ── Crawler ──────────────────────────────────────────────────────
    let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let crawler = match YoutubeClient::from_env(&config.youtube) {
        Ok(client) => {
            tracing::info!("youtube crawler ready");
            Some(Arc::new(Crawler::new(Arc::new(client), &config.youtube)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "youtube crawler disabled");
            None
        }
    };

    // ── API token (read once, hash for constant-time comparison) ────
    let env_var = &config.server.api_token_env;
    let api_token_hash = match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!(source = %format!("env:{env_var}"), "API bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        None => {
            tracing::warn!("API bearer-token auth DISABLED — set the {env_var} env var to protect endpoints");
            None
        }
    };

    Ok(AppState {
        config,
        store,
        users,
        runtime,
        attachments,
        conversations: Arc::new(ConversationMap::new()),
        jobs,
        crawler,
        api_token_hash,
    })
}

/// Spawn periodic housekeeping. Call once after [`build_app_state`].
pub fn spawn_background_tasks(state: &AppState) {
    // ── Session lock pruning ─────────────────────────────────────────
    {
        let runtime = state.runtime.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                runtime.prune_idle_locks();
            }
        });
    }

    // ── Idle conversation eviction ──────────────────────────────────
    {
        let conversations = state.conversations.clone();
        let max_idle = std::time::Duration::from_secs(state.config.server.conversation_idle_minutes * 60);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                let evicted = conversations.evict_idle(max_idle);
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = conversations.len(), "evicted idle conversations");
                }
            }
        });
    }
}
