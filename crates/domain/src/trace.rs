use serde::Serialize;

/// Structured trace events emitted across all tubechat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        owner: String,
    },
    MessageAppended {
        session_id: String,
        role: String,
        chars: usize,
    },
    TurnRouted {
        conversation_id: String,
        mode: String,
        has_rows: bool,
        has_json: bool,
        images: usize,
    },
    AttachmentProcessed {
        kind: String,
        name: String,
        ok: bool,
    },
    ToolExecuted {
        tool: String,
        ok: bool,
        duration_ms: u64,
    },
    LlmRequest {
        model: String,
        mode: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
        total_tokens: Option<u32>,
    },
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },
    TurnFinished {
        conversation_id: String,
        outcome: String,
        content_chars: usize,
    },
    CrawlProgress {
        job_id: String,
        progress: u8,
        message: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(target: "tubechat::trace", trace_event = %json, "tc_event");
    }
}
