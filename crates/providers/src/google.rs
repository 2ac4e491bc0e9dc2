//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` and `streamGenerateContent` APIs.
//! Auth is via an API key passed as a query parameter (`key={api_key}`).

use crate::sse::{sse_response_stream, StreamParser};
use crate::traits::{ChatProvider, ModelMode, TurnRequest, TurnResponse};
use crate::util::{from_reqwest, redact_url_key, status_error};
use serde_json::{json, Value};
use tc_domain::chat::ResponsePart;
use tc_domain::config::LlmConfig;
use tc_domain::error::{Error, Result};
use tc_domain::stream::{BoxStream, StreamChunk, Usage};
use tc_domain::tool::{ContentPart, FunctionCall, Message, ToolDefinition};

const PROVIDER_ID: &str = "google";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Chat provider backed by the Gemini API.
pub struct GoogleProvider {
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(cfg: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.model.clone(),
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        )
    }

    fn model_for(&self, req: &TurnRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.default_model.clone())
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.map_err(from_reqwest)?;
            return Err(status_error(PROVIDER_ID, status, &text));
        }
        Ok(resp)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn build_body(req: &TurnRequest) -> Value {
    let contents: Vec<Value> = req.messages.iter().map(message_to_gemini).collect();
    let mut body = json!({ "contents": contents });

    if let Some(si) = req.system_instruction.as_deref().filter(|s| !s.is_empty()) {
        body["systemInstruction"] = json!({ "parts": [{ "text": si }] });
    }

    let tools = match req.mode {
        ModelMode::Tools if !req.tools.is_empty() => {
            let decls: Vec<Value> = req.tools.iter().map(tool_to_gemini).collect();
            Some(json!([{ "functionDeclarations": decls }]))
        }
        ModelMode::Tools => None,
        ModelMode::CodeExecution => Some(json!([{ "codeExecution": {} }])),
        ModelMode::Search => Some(json!([{ "googleSearch": {} }])),
    };
    if let Some(tools) = tools {
        body["tools"] = tools;
    }

    body
}

fn message_to_gemini(msg: &Message) -> Value {
    let parts: Vec<Value> = msg.parts.iter().map(part_to_gemini).collect();
    json!({ "role": msg.role.as_str(), "parts": parts })
}

fn part_to_gemini(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({ "text": text }),
        ContentPart::InlineData { mime_type, data } => json!({
            "inlineData": { "mimeType": mime_type, "data": data }
        }),
        ContentPart::FunctionCall { call } => json!({
            "functionCall": { "name": call.name, "args": call.args }
        }),
        ContentPart::FunctionResponse { name, response } => {
            // functionResponse.response must be an object.
            let response = if response.is_object() {
                response.clone()
            } else {
                json!({ "result": response })
            };
            json!({ "functionResponse": { "name": name, "response": response } })
        }
    }
}

fn tool_to_gemini(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn first_candidate(body: &Value) -> Option<&Value> {
    body.get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
}

fn candidate_parts(candidate: &Value) -> &[Value] {
    candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Thought summaries are internal reasoning and never shown.
fn is_thought(part: &Value) -> bool {
    part.get("thought").and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn parse_gemini_response(body: &Value, model: &str) -> Result<TurnResponse> {
    let candidate = first_candidate(body).ok_or_else(|| {
        let reason = body
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates in response");
        Error::Provider {
            provider: PROVIDER_ID.into(),
            message: reason.to_string(),
        }
    })?;

    let mut text = String::new();
    let mut function_calls = Vec::new();

    for part in candidate_parts(candidate) {
        if is_thought(part) {
            continue;
        }
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            text.push_str(t);
        }
        if let Some(fc) = part.get("functionCall") {
            function_calls.push(FunctionCall {
                name: fc.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
                args: fc.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }

    Ok(TurnResponse {
        text,
        function_calls,
        usage: body.get("usageMetadata").and_then(parse_gemini_usage),
        model: model.to_string(),
    })
}

/// Counts saturate at `u32::MAX` instead of wrapping.
fn token_count(v: &Value, key: &str) -> Option<u32> {
    let n = v.get(key)?.as_u64()?;
    Some(u32::try_from(n).unwrap_or(u32::MAX))
}

pub(crate) fn parse_gemini_usage(v: &Value) -> Option<Usage> {
    let prompt = token_count(v, "promptTokenCount")?;
    let completion = token_count(v, "candidatesTokenCount").unwrap_or(0);
    let total = token_count(v, "totalTokenCount").unwrap_or_else(|| prompt.saturating_add(completion));
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Accumulates a streamed reply.
///
/// Text is forwarded as it arrives. Code, execution results and inline
/// images mark the reply as structured; the full part list is then
/// emitted once at the end.
#[derive(Debug, Default)]
pub(crate) struct GeminiStreamParser {
    parts: Vec<ResponsePart>,
    structured: bool,
    grounding: Option<Value>,
    usage: Option<Usage>,
}

impl GeminiStreamParser {
    fn push_text(&mut self, text: &str) {
        if let Some(ResponsePart::Text { text: last }) = self.parts.last_mut() {
            last.push_str(text);
        } else {
            self.parts.push(ResponsePart::Text { text: text.to_string() });
        }
    }
}

impl StreamParser for GeminiStreamParser {
    fn parse(&mut self, data: &str) -> Vec<Result<StreamChunk>> {
        let mut chunks = Vec::new();

        let v: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                chunks.push(Err(Error::Json(e)));
                return chunks;
            }
        };

        if let Some(usage) = v.get("usageMetadata").and_then(parse_gemini_usage) {
            self.usage = Some(usage);
        }

        let Some(candidate) = first_candidate(&v) else {
            return chunks;
        };

        for part in candidate_parts(candidate) {
            if is_thought(part) {
                continue;
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                if !text.is_empty() {
                    self.push_text(text);
                    chunks.push(Ok(StreamChunk::Text { text: text.to_string() }));
                }
            }
            if let Some(code) = part.get("executableCode") {
                self.structured = true;
                self.parts.push(ResponsePart::Code {
                    language: code
                        .get("language")
                        .and_then(Value::as_str)
                        .unwrap_or("PYTHON")
                        .to_string(),
                    code: code.get("code").and_then(Value::as_str).unwrap_or("").to_string(),
                });
            }
            if let Some(result) = part.get("codeExecutionResult") {
                self.structured = true;
                self.parts.push(ResponsePart::Result {
                    outcome: result
                        .get("outcome")
                        .and_then(Value::as_str)
                        .unwrap_or("OUTCOME_UNSPECIFIED")
                        .to_string(),
                    output: result.get("output").and_then(Value::as_str).unwrap_or("").to_string(),
                });
            }
            if let Some(inline) = part.get("inlineData") {
                self.structured = true;
                self.parts.push(ResponsePart::Image {
                    mime_type: inline
                        .get("mimeType")
                        .and_then(Value::as_str)
                        .unwrap_or("image/png")
                        .to_string(),
                    data: inline.get("data").and_then(Value::as_str).unwrap_or("").to_string(),
                });
            }
        }

        if let Some(grounding) = candidate.get("groundingMetadata") {
            self.grounding = Some(grounding.clone());
        }

        chunks
    }

    fn finish(&mut self) -> Vec<Result<StreamChunk>> {
        let mut chunks = Vec::new();
        if self.structured {
            chunks.push(Ok(StreamChunk::Parts {
                parts: std::mem::take(&mut self.parts),
            }));
        }
        if let Some(metadata) = self.grounding.take() {
            chunks.push(Ok(StreamChunk::Grounding { metadata }));
        }
        chunks.push(Ok(StreamChunk::Done { usage: self.usage.take() }));
        chunks
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatProvider for GoogleProvider {
    async fn send_turn(&self, req: &TurnRequest) -> Result<TurnResponse> {
        let model = self.model_for(req);
        let url = self.generate_url(&model);
        let body = build_body(req);

        tracing::debug!(url = %redact_url_key(&url), mode = req.mode.as_str(), "gemini request");

        let resp = self.post(&url, &body).await?;
        let text = resp.text().await.map_err(from_reqwest)?;
        let json: Value = serde_json::from_str(&text)?;
        parse_gemini_response(&json, &model)
    }

    async fn stream_turn(&self, req: &TurnRequest) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let model = self.model_for(req);
        let url = self.stream_url(&model);
        let body = build_body(req);

        tracing::debug!(url = %redact_url_key(&url), mode = req.mode.as_str(), "gemini stream request");

        let resp = self.post(&url, &body).await?;
        Ok(sse_response_stream(resp, GeminiStreamParser::default()))
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
