use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chart::Chart;
use crate::tool::Role;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transcript messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry of a chat transcript, as shown to the user and persisted.
///
/// `content` is display text only. Model-bound context blocks and
/// encoded payloads never land here; images are kept by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding: Option<serde_json::Value>,
    /// Badge for the message that first attached a CSV in this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_name: Option<String>,
    /// Structured code-execution output. Live view only.
    #[serde(skip)]
    pub parts: Vec<ResponsePart>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let prefix = match role {
            Role::User => "u",
            Role::Model => "a",
        };
        Self {
            id: format!("{prefix}-{}", uuid::Uuid::new_v4().simple()),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            images: Vec::new(),
            charts: Vec::new(),
            tool_calls: Vec::new(),
            grounding: None,
            csv_name: None,
            json_name: None,
            parts: Vec::new(),
        }
    }

    /// Plain text for model history: text parts if present, else content.
    pub fn history_text(&self) -> String {
        if self.parts.is_empty() {
            return self.content.clone();
        }
        text_of_parts(&self.parts)
    }
}

/// An image stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub id: String,
    pub mime_type: String,
    pub url: String,
}

/// Audit record of one tool call made while producing a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub args: serde_json::Value,
    pub result: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Structured response parts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A part of a code-execution response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePart {
    Text { text: String },
    Code { language: String, code: String },
    Result { outcome: String, output: String },
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
}

/// Join the text parts with newlines, ignoring code, results and images.
pub fn text_of_parts(parts: &[ResponsePart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            ResponsePart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
