use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_3001")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Base URL clients use to reach this server. Generated image URLs
    /// are built from it.
    #[serde(default = "d_public_url")]
    pub public_url: String,
    /// Environment variable holding the API bearer token for protected endpoints.
    /// If the env var is set and non-empty, all API endpoints (except health)
    /// require `Authorization: Bearer <token>`.
    /// If unset, the server logs a warning and allows unauthenticated access.
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Open conversations untouched this long are dropped from memory.
    #[serde(default = "d_conversation_idle_minutes")]
    pub conversation_idle_minutes: u64,
    /// Optional directory with the built chat UI, served at `/`.
    #[serde(default)]
    pub public_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            host: d_host(),
            cors: CorsConfig::default(),
            public_url: d_public_url(),
            api_token_env: d_api_token_env(),
            max_concurrent_requests: d_max_concurrent(),
            conversation_idle_minutes: d_conversation_idle_minutes(),
            public_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3001() -> u16 {
    3001
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_public_url() -> String {
    "http://localhost:3001".into()
}
fn d_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://localhost:3001".into(),
    ]
}
fn d_api_token_env() -> String {
    "TC_API_TOKEN".into()
}
fn d_max_concurrent() -> usize {
    256
}
fn d_conversation_idle_minutes() -> u64 {
    120
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_parses_partial_toml() {
        let toml_str = r#"
            port = 8080
            host = "127.0.0.1"
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.public_url, "http://localhost:3001");
    }

    #[test]
    fn server_config_empty_toml_uses_all_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.api_token_env, "TC_API_TOKEN");
        assert_eq!(cfg.conversation_idle_minutes, 120);
        assert!(cfg.public_dir.is_none());
    }
}
