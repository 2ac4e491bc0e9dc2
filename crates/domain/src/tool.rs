use serde::{Deserialize, Serialize};

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema-like parameter spec.
    pub parameters: serde_json::Value,
}

/// Conversation role. The chat model only knows two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A message in the model-bound conversation (provider-agnostic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Base64 payload sent inline to the model. Never persisted.
    InlineData {
        mime_type: String,
        data: String,
    },
    FunctionCall {
        call: FunctionCall,
    },
    FunctionResponse {
        name: String,
        response: serde_json::Value,
    },
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![ContentPart::Text { text: text.into() }] }
    }
    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, parts: vec![ContentPart::Text { text: text.into() }] }
    }
    pub fn function_calls(calls: &[FunctionCall]) -> Self {
        Self {
            role: Role::Model,
            parts: calls
                .iter()
                .map(|c| ContentPart::FunctionCall { call: c.clone() })
                .collect(),
        }
    }
    pub fn function_responses(responses: Vec<(String, serde_json::Value)>) -> Self {
        Self {
            role: Role::User,
            parts: responses
                .into_iter()
                .map(|(name, response)| ContentPart::FunctionResponse { name, response })
                .collect(),
        }
    }

    /// Attach inline images after the text parts.
    pub fn with_inline_data(mut self, images: impl IntoIterator<Item = (String, String)>) -> Self {
        for (mime_type, data) in images {
            self.parts.push(ContentPart::InlineData { mime_type, data });
        }
        self
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
