use tc_domain::error::Result;
use tc_domain::stream::{BoxStream, StreamChunk, Usage};
use tc_domain::tool::{FunctionCall, Message, ToolDefinition};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which server-side capability the model gets for this exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelMode {
    /// Declared functions; the caller executes them.
    #[default]
    Tools,
    /// The model may write and run code.
    CodeExecution,
    /// Web search grounding.
    Search,
}

impl ModelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelMode::Tools => "tools",
            ModelMode::CodeExecution => "code_execution",
            ModelMode::Search => "search",
        }
    }
}

/// A provider-agnostic turn request. `messages` is the full history with
/// the new user prompt last.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub system_instruction: Option<String>,
    pub messages: Vec<Message>,
    /// Only sent in [`ModelMode::Tools`].
    pub tools: Vec<ToolDefinition>,
    pub mode: ModelMode,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

/// A single-shot model reply.
#[derive(Debug, Clone, Default)]
pub struct TurnResponse {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
    pub usage: Option<Usage>,
    pub model: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collaborator traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Chat completion service.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// One request, one full reply (text plus any function calls).
    async fn send_turn(&self, req: &TurnRequest) -> Result<TurnResponse>;

    /// Stream the reply as ordered chunks, ending with `Done`.
    async fn stream_turn(&self, req: &TurnRequest) -> Result<BoxStream<'static, Result<StreamChunk>>>;

    fn provider_id(&self) -> &str;
}

/// Reference image supplied alongside a generation prompt.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorImage {
    #[serde(default)]
    pub name: Option<String>,
    pub mime_type: String,
    pub data: String,
}

/// Image generation service. Returns a URL clients can load.
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, anchor: Option<&AnchorImage>) -> Result<String>;
}
