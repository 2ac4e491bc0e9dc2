//! Per-turn execution mode selection.

use regex::Regex;
use serde::Serialize;
use tc_domain::config::{keyword_regex, RoutingConfig};
use tc_domain::error::{Error, Result};

/// The single execution path chosen for a turn.
///
/// Computed once and handed to both the prompt assembler and the runtime
/// so they can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TurnIntent {
    /// The model runs generated code. `attach_full_data` is set when a
    /// freshly attached CSV must travel as base64 for the code to load.
    CodeExecution { attach_full_data: bool },
    /// The model picks local tools; results are fed back in a loop.
    ToolCalling,
    /// Plain conversation with web-search grounding, streamed.
    GroundedSearch,
}

impl TurnIntent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnIntent::CodeExecution { .. } => "code_execution",
            TurnIntent::ToolCalling => "tool_calling",
            TurnIntent::GroundedSearch => "grounded_search",
        }
    }

    pub fn is_streaming(&self) -> bool {
        !matches!(self, TurnIntent::ToolCalling)
    }
}

/// Inputs the router looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnSignals<'a> {
    pub text: &'a str,
    /// Parsed tabular rows are loaded for the session.
    pub has_rows: bool,
    pub has_json: bool,
    pub has_images: bool,
    /// A CSV chip was attached this turn and has not been sent yet.
    pub pending_csv: bool,
}

/// Text predicates behind routing. Swap in another implementation to
/// change languages or phrase lists.
pub trait IntentClassifier: Send + Sync {
    /// Analysis only executable code can produce.
    fn requires_code(&self, text: &str) -> bool;
    /// Generic "write/run code" phrasing.
    fn asks_for_code(&self, text: &str) -> bool;
    fn wants_image(&self, text: &str) -> bool;
}

/// Keyword-list classifier compiled from [`RoutingConfig`].
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    code_required: Option<Regex>,
    code_general: Option<Regex>,
    image_intent: Option<Regex>,
}

impl KeywordClassifier {
    pub fn from_config(cfg: &RoutingConfig) -> Result<Self> {
        let compile = |field: &str, list: &[String]| {
            keyword_regex(list).map_err(|e| Error::Config(format!("routing.{field}: {e}")))
        };
        Ok(Self {
            code_required: compile("code_required", &cfg.code_required)?,
            code_general: compile("code_general", &cfg.code_general)?,
            image_intent: compile("image_intent", &cfg.image_intent)?,
        })
    }
}

fn hit(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(text))
}

impl IntentClassifier for KeywordClassifier {
    fn requires_code(&self, text: &str) -> bool {
        hit(&self.code_required, text)
    }
    fn asks_for_code(&self, text: &str) -> bool {
        hit(&self.code_general, text)
    }
    fn wants_image(&self, text: &str) -> bool {
        hit(&self.image_intent, text)
    }
}

/// Pick the execution mode. First match wins:
///
/// 1. code execution: code-only analysis requested, or generic code
///    phrasing while no dataset is loaded;
/// 2. tool calling: some dataset, image or image intent is present and no
///    CSV chip is pending;
/// 3. grounded search otherwise.
pub fn route(signals: &TurnSignals<'_>, classifier: &dyn IntentClassifier) -> TurnIntent {
    let requires_code = classifier.requires_code(signals.text);
    let asks_for_code =
        classifier.asks_for_code(signals.text) && !signals.has_rows && !signals.has_json;

    if requires_code || asks_for_code {
        return TurnIntent::CodeExecution {
            attach_full_data: signals.pending_csv && requires_code,
        };
    }

    let tool_context = signals.has_rows
        || signals.has_json
        || signals.has_images
        || classifier.wants_image(signals.text);
    if tool_context && !signals.pending_csv {
        return TurnIntent::ToolCalling;
    }

    TurnIntent::GroundedSearch
}
