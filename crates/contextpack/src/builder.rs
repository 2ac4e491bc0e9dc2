//! Builds the model-bound prompt for one turn, kept apart from the text
//! the transcript shows.

use serde_json::{json, Value};

use crate::attachments::{ChannelData, CsvAttachment, TabularContext};
use crate::routing::TurnIntent;

const DEFAULT_IMAGE_PROMPT: &str = "What do you see in this image?";
const DEFAULT_JSON_PROMPT: &str = "I've uploaded channel data. What would you like to know?";
const DEFAULT_CSV_PROMPT: &str = "Please analyze this CSV data.";

/// Videos sampled into the prompt from channel JSON.
const CHANNEL_SAMPLE_SIZE: usize = 3;

/// Output of prompt assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPrompt {
    /// What the transcript shows and what gets persisted.
    pub display: String,
    /// What the model receives. May carry context blocks and encoded data.
    pub model_prompt: String,
}

/// Everything the assembler reads for one turn.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub text: &'a str,
    pub intent: TurnIntent,
    pub channel: Option<&'a ChannelData>,
    /// CSV chip attached this turn.
    pub pending_csv: Option<&'a CsvAttachment>,
    /// Dataset remembered for the session.
    pub session_csv: Option<&'a TabularContext>,
    pub image_count: usize,
}

fn channel_block(channel: &ChannelData) -> String {
    let sample: Vec<Value> = channel
        .videos()
        .iter()
        .take(CHANNEL_SAMPLE_SIZE)
        .map(|v| {
            json!({
                "title": v.get("title"),
                "duration": v.get("duration"),
                "view_count": v.get("view_count"),
                "like_count": v.get("like_count"),
            })
        })
        .collect();
    let sample = serde_json::to_string_pretty(&sample).unwrap_or_else(|_| "[]".into());

    format!(
        "[JSON Channel Data: \"{name}\" | {summary}]\n\
         Raw JSON stored (jsonId: {id}). Available for analysis and code.\n\
         Sample (first {n} videos, key fields):\n\
         ```json\n{sample}\n```\n\n---\n",
        name = channel.name,
        summary = channel.summary,
        id = channel.json_id,
        n = CHANNEL_SAMPLE_SIZE,
    )
}

fn csv_block(chip: &CsvAttachment, session: Option<&TabularContext>, full_data: bool) -> String {
    let summary = session.map(|s| s.summary.as_str()).unwrap_or("");
    let slim = session
        .and_then(|s| s.slim.as_ref())
        .map(|slim| {
            let label = if slim.is_truncated() {
                format!("Dataset excerpt (key columns, first {} of {} rows)", slim.rows, slim.total_rows)
            } else {
                "Full dataset (key columns)".to_string()
            };
            format!("\n\n{label}:\n```csv\n{}\n```", slim.csv)
        })
        .unwrap_or_default();

    let mut block = format!(
        "[CSV File: \"{}\" | {} rows | Columns: {}]\n\n{summary}{slim}\n\n",
        chip.name,
        chip.row_count,
        chip.headers.join(", "),
    );
    if full_data {
        block.push_str(&format!(
            "IMPORTANT: to load the full data in Python use this exact pattern:\n\
             ```python\n\
             import pandas as pd, io, base64\n\
             df = pd.read_csv(io.BytesIO(base64.b64decode(\"{}\")))\n\
             ```\n\n",
            chip.base64
        ));
    }
    block.push_str("---\n\n");
    block
}

fn schema_memory_block(session: &TabularContext) -> String {
    format!(
        "[CSV columns: {}]\n\n{}\n\n---\n\n",
        session.data.headers.join(", "),
        session.summary
    )
}

/// Assemble display text and model prompt for a turn.
///
/// The base64 payload is only added for code execution that asked for
/// full data; the display text never carries any context block.
pub fn assemble(inputs: &PromptInputs<'_>) -> TurnPrompt {
    let text = inputs.text.trim();
    let full_data = matches!(
        inputs.intent,
        TurnIntent::CodeExecution { attach_full_data: true }
    );

    let mut prefix = String::new();
    if let Some(channel) = inputs.channel {
        prefix.push_str(&channel_block(channel));
    }
    match (inputs.pending_csv, inputs.session_csv) {
        (Some(chip), session) => prefix.push_str(&csv_block(chip, session, full_data)),
        (None, Some(session)) if !session.summary.is_empty() => {
            prefix.push_str(&schema_memory_block(session))
        }
        _ => {}
    }

    let display = if !text.is_empty() {
        text.to_string()
    } else if inputs.image_count > 0 {
        "(Image)".to_string()
    } else if inputs.channel.is_some() {
        "(JSON attached)".to_string()
    } else {
        "(CSV attached)".to_string()
    };

    let question = if !text.is_empty() {
        text
    } else if inputs.image_count > 0 {
        DEFAULT_IMAGE_PROMPT
    } else if inputs.channel.is_some() {
        DEFAULT_JSON_PROMPT
    } else {
        DEFAULT_CSV_PROMPT
    };

    TurnPrompt {
        display,
        model_prompt: format!("{prefix}{question}"),
    }
}
