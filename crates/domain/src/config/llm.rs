use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat model and image model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Generative Language API root.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. The key itself never
    /// lives in the config file.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_image_model")]
    pub image_model: String,
    #[serde(default = "d_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound on model/tool round trips within a single turn.
    #[serde(default = "d_max_tool_loops")]
    pub max_tool_loops: usize,
    /// System instruction sent with every conversation.
    #[serde(default = "d_system_instruction")]
    pub system_instruction: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            image_model: d_image_model(),
            request_timeout_ms: d_timeout_ms(),
            max_tool_loops: d_max_tool_loops(),
            system_instruction: d_system_instruction(),
            retry: RetryConfig::default(),
        }
    }
}

/// Exponential backoff policy for outbound model calls.
///
/// Attempt `n` (0-based) waits `min(initial_delay_ms * factor^n, max_delay_ms)`
/// before retrying. `max_retries` does not count the first attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default = "d_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "d_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "d_factor")]
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: d_max_retries(),
            initial_delay_ms: d_initial_delay_ms(),
            max_delay_ms: d_max_delay_ms(),
            factor: d_factor(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let raw = self.initial_delay_ms as f64 * self.factor.powi(attempt as i32);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        std::time::Duration::from_millis(capped as u64)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn d_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn d_model() -> String {
    "gemini-2.5-flash".into()
}
fn d_image_model() -> String {
    "imagen-4.0-generate-001".into()
}
fn d_timeout_ms() -> u64 {
    120_000
}
fn d_max_tool_loops() -> usize {
    8
}
fn d_system_instruction() -> String {
    "You are the YouTube AI Chat Assistant. Help users analyze YouTube channel \
     performance using JSON data they upload."
        .into()
}
fn d_max_retries() -> u32 {
    4
}
fn d_initial_delay_ms() -> u64 {
    1_000
}
fn d_max_delay_ms() -> u64 {
    16_000
}
fn d_factor() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_then_caps() {
        let r = RetryConfig::default();
        assert_eq!(r.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(r.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(r.delay_for(3), Duration::from_millis(8_000));
        assert_eq!(r.delay_for(4), Duration::from_millis(16_000));
        assert_eq!(r.delay_for(9), Duration::from_millis(16_000));
    }

    #[test]
    fn empty_toml_uses_gemini_defaults() {
        let cfg: LlmConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.model, "gemini-2.5-flash");
        assert_eq!(cfg.image_model, "imagen-4.0-generate-001");
        assert_eq!(cfg.retry.max_retries, 4);
    }
}
