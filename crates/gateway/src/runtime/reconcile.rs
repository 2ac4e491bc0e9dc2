//! Folds model output into exactly one model message per turn.
//!
//! Streaming turns feed chunks through [`Reconciler::apply`]; tool-calling
//! turns record each invocation and then set the reply text. Whatever
//! happened, [`Reconciler::finish`] produces the message that gets
//! persisted.

use serde_json::Value;

use tc_domain::chart::Chart;
use tc_domain::chat::{text_of_parts, ChatMessage, ResponsePart, ToolInvocation};
use tc_domain::stream::{StreamChunk, Usage};
use tc_domain::tool::Role;

/// Persisted when a stop arrives before any output.
pub const STOPPED_EMPTY: &str = "stopped before any response was received";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Completed => "completed",
            TurnOutcome::Cancelled => "cancelled",
            TurnOutcome::Failed(_) => "failed",
        }
    }
}

/// What a chunk changed in the live view.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate {
    /// Text appended; carries the delta.
    Delta(String),
    /// Structured parts replaced the incremental text.
    Parts(Vec<ResponsePart>),
}

#[derive(Debug, Default)]
pub struct Reconciler {
    text: String,
    parts: Option<Vec<ResponsePart>>,
    grounding: Option<Value>,
    charts: Vec<Chart>,
    tool_calls: Vec<ToolInvocation>,
    usage: Option<Usage>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one streamed chunk. Grounding and usage are kept for the
    /// final message and never surface incrementally.
    pub fn apply(&mut self, chunk: StreamChunk) -> Option<LiveUpdate> {
        match chunk {
            StreamChunk::Text { text } => {
                if text.is_empty() {
                    return None;
                }
                self.text.push_str(&text);
                Some(LiveUpdate::Delta(text))
            }
            StreamChunk::Parts { parts } => {
                self.parts = Some(parts.clone());
                Some(LiveUpdate::Parts(parts))
            }
            StreamChunk::Grounding { metadata } => {
                self.grounding = Some(metadata);
                None
            }
            StreamChunk::Done { usage } => {
                if let Some(u) = usage {
                    self.add_usage(&u);
                }
                None
            }
        }
    }

    /// Final text of a single-shot exchange.
    pub fn set_reply(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Record a tool call in order; chart-shaped results become charts.
    pub fn record_tool(&mut self, name: &str, args: Value, result: Value) {
        if let Some(chart) = Chart::from_tool_result(&result) {
            self.charts.push(chart);
        }
        self.tool_calls.push(ToolInvocation {
            name: name.to_string(),
            args,
            result,
        });
    }

    pub fn add_usage(&mut self, usage: &Usage) {
        self.usage.get_or_insert_with(Usage::default).add(usage);
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Text the live view currently shows.
    pub fn display_text(&self) -> String {
        match &self.parts {
            Some(parts) => text_of_parts(parts),
            None => self.text.clone(),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || self.parts.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Build the model message for `outcome`, reusing the placeholder id.
    pub fn finish(self, id: String, outcome: &TurnOutcome) -> ChatMessage {
        let mut message = ChatMessage::new(Role::Model, String::new());
        message.id = id;

        match outcome {
            TurnOutcome::Failed(reason) => {
                message.content = format!("Error: {reason}");
            }
            TurnOutcome::Cancelled if !self.has_content() => {
                message.content = format!("Error: {STOPPED_EMPTY}");
            }
            TurnOutcome::Completed | TurnOutcome::Cancelled => {
                message.content = self.display_text();
                message.parts = self.parts.unwrap_or_default();
                message.grounding = self.grounding;
            }
        }
        message.charts = self.charts;
        message.tool_calls = self.tool_calls;
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(t: &str) -> StreamChunk {
        StreamChunk::Text { text: t.into() }
    }

    #[test]
    fn streamed_text_accumulates() {
        let mut r = Reconciler::new();
        assert_eq!(r.apply(text("Hel")), Some(LiveUpdate::Delta("Hel".into())));
        r.apply(text("lo"));
        assert_eq!(r.apply(text("")), None);
        let msg = r.finish("a-1".into(), &TurnOutcome::Completed);
        assert_eq!(msg.id, "a-1");
        assert_eq!(msg.role, Role::Model);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn structured_parts_replace_text_and_drop_images_from_content() {
        let mut r = Reconciler::new();
        r.apply(text("draft"));
        r.apply(StreamChunk::Parts {
            parts: vec![
                ResponsePart::Text { text: "Mean is 2.5".into() },
                ResponsePart::Code { language: "PYTHON".into(), code: "print(2.5)".into() },
                ResponsePart::Result { outcome: "OUTCOME_OK".into(), output: "2.5".into() },
                ResponsePart::Image { mime_type: "image/png".into(), data: "iVBORw0KGgo=".into() },
                ResponsePart::Text { text: "Done".into() },
            ],
        });
        assert_eq!(r.display_text(), "Mean is 2.5\nDone");
        let msg = r.finish("a-1".into(), &TurnOutcome::Completed);
        assert_eq!(msg.content, "Mean is 2.5\nDone");
        assert_eq!(msg.parts.len(), 5);
        assert!(!serde_json::to_string(&msg).unwrap().contains("iVBORw0KGgo="));
    }

    #[test]
    fn grounding_is_attached_after_the_fact() {
        let mut r = Reconciler::new();
        assert_eq!(r.apply(StreamChunk::Grounding { metadata: json!({"chunks": 2}) }), None);
        r.apply(text("answer"));
        let msg = r.finish("a".into(), &TurnOutcome::Completed);
        assert_eq!(msg.grounding, Some(json!({"chunks": 2})));
    }

    #[test]
    fn usage_sums_across_exchanges() {
        let mut r = Reconciler::new();
        assert_eq!(r.usage(), None);
        r.add_usage(&Usage { prompt_tokens: 10, completion_tokens: 2, total_tokens: 12 });
        r.apply(StreamChunk::Done {
            usage: Some(Usage { prompt_tokens: 5, completion_tokens: 1, total_tokens: 6 }),
        });
        assert_eq!(r.usage().unwrap().total_tokens, 18);
    }

    #[test]
    fn tool_calls_are_recorded_in_order_with_charts() {
        let mut r = Reconciler::new();
        r.record_tool("compute_stats_json", json!({"field": "view_count"}), json!({"count": 2}));
        r.record_tool(
            "plot_metric_vs_time",
            json!({"metric": "view_count"}),
            json!({"_chartType": "metric_vs_time", "data": [], "metric": "view_count"}),
        );
        r.record_tool("play_video", json!({}), json!({"error": "nope"}));
        r.set_reply("Here you go");

        let msg = r.finish("a".into(), &TurnOutcome::Completed);
        let names: Vec<_> = msg.tool_calls.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["compute_stats_json", "plot_metric_vs_time", "play_video"]);
        assert_eq!(msg.charts.len(), 1);
        assert_eq!(msg.content, "Here you go");
    }

    #[test]
    fn cancelled_turn_keeps_partial_text() {
        let mut r = Reconciler::new();
        r.apply(text("partial"));
        let msg = r.finish("a".into(), &TurnOutcome::Cancelled);
        assert_eq!(msg.content, "partial");
    }

    #[test]
    fn cancelled_before_output_is_an_error_message() {
        let msg = Reconciler::new().finish("a".into(), &TurnOutcome::Cancelled);
        assert_eq!(msg.content, format!("Error: {STOPPED_EMPTY}"));
    }

    #[test]
    fn failure_replaces_content() {
        let mut r = Reconciler::new();
        r.apply(text("half"));
        let msg = r.finish("a".into(), &TurnOutcome::Failed("network down".into()));
        assert_eq!(msg.content, "Error: network down");
        assert!(msg.parts.is_empty());
    }
}
