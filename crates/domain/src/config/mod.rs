mod llm;
mod observability;
mod routing;
mod server;
mod storage;
mod youtube;

pub use llm::*;
pub use observability::*;
pub use routing::*;
pub use server::*;
pub use storage::*;
pub use youtube::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub youtube: YoutubeConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Error, field: field.into(), message: message.into() }
    }
    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Warning, field: field.into(), message: message.into() }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }
        if self.llm.model.is_empty() {
            errors.push(ConfigError::error("llm.model", "model must not be empty"));
        }
        if std::env::var(&self.llm.api_key_env).map(|v| v.is_empty()).unwrap_or(true) {
            errors.push(ConfigError::warning(
                "llm.api_key_env",
                format!("environment variable {} is not set; chat turns will fail", self.llm.api_key_env),
            ));
        }
        if self.llm.max_tool_loops == 0 {
            errors.push(ConfigError::error("llm.max_tool_loops", "must be at least 1"));
        }
        if self.llm.retry.factor < 1.0 {
            errors.push(ConfigError::error("llm.retry.factor", "backoff factor must be >= 1.0"));
        }
        if self.llm.retry.initial_delay_ms > self.llm.retry.max_delay_ms {
            errors.push(ConfigError::error(
                "llm.retry.initial_delay_ms",
                "initial delay exceeds max_delay_ms",
            ));
        }

        for (field, patterns) in [
            ("routing.code_required", &self.routing.code_required),
            ("routing.code_general", &self.routing.code_general),
            ("routing.image_intent", &self.routing.image_intent),
        ] {
            if let Err(e) = keyword_regex(patterns) {
                errors.push(ConfigError::error(field, format!("invalid keyword pattern: {e}")));
            }
        }
        if self.routing.slim_columns.is_empty() {
            errors.push(ConfigError::warning(
                "routing.slim_columns",
                "no slim columns configured; prompts will carry no dataset excerpt",
            ));
        }

        if self.youtube.default_max_videos == 0
            || self.youtube.default_max_videos > self.youtube.max_videos_cap
        {
            errors.push(ConfigError::error(
                "youtube.default_max_videos",
                "must be between 1 and max_videos_cap",
            ));
        }

        errors
    }
}
