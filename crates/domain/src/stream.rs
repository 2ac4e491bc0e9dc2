use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::chat::ResponsePart;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// One unit of a streamed model response.
///
/// Text arrives incrementally. When the model executed code the final
/// shape is richer than plain text, so the provider emits a single
/// `Parts` chunk that replaces the incremental view. Grounding citations
/// are attached to the message after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    Text { text: String },
    Parts { parts: Vec<ResponsePart> },
    Grounding { metadata: serde_json::Value },
    Done { usage: Option<Usage> },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Sum two usages (the tool loop makes several calls per turn).
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}
