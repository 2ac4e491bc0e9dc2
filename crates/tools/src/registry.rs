//! Tool table: name → handler with its declared parameter schema.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tc_domain::tool::ToolDefinition;
use tc_domain::trace::TraceEvent;

use crate::context::ToolContext;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One callable tool.
///
/// `call` returns the result object on success or a user-facing message
/// on failure; the registry wraps the latter as `{"error": ...}`.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Message for a missing or blank required argument.
    fn missing_arg(&self, field: &str) -> String {
        format!("{field} (string) is required.")
    }

    async fn call(&self, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String>;
}

struct Entry {
    definition: ToolDefinition,
    required: Vec<String>,
    handler: Arc<dyn ToolHandler>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ordered tool table. Declarations are built once and reused for every
/// request of a session.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in tools, in declaration order.
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(crate::image::GenerateImage));
        reg.register(Arc::new(crate::channel::PlotMetricVsTime));
        reg.register(Arc::new(crate::channel::PlayVideo));
        reg.register(Arc::new(crate::channel::ComputeStatsJson));
        reg.register(Arc::new(crate::csv::ComputeCsvStats));
        reg.register(Arc::new(crate::csv::PlotEngagement));
        reg
    }

    /// Add a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let definition = handler.definition();
        let required = definition
            .parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let entry = Entry { definition, required, handler };
        match self.entries.iter().position(|e| e.definition.name == entry.definition.name) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(|e| e.definition.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.definition.name.as_str()).collect()
    }

    /// Run one tool call. Always yields a result object.
    pub async fn execute(&self, name: &str, args: &Value, ctx: &ToolContext<'_>) -> Value {
        let started = Instant::now();
        let outcome = self.dispatch(name, args, ctx).await;
        let ok = outcome.is_ok();

        TraceEvent::ToolExecuted {
            tool: name.to_string(),
            ok,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        match outcome {
            Ok(v) => v,
            Err(message) => {
                tracing::debug!(tool = name, error = %message, "tool returned error");
                json!({ "error": message })
            }
        }
    }

    async fn dispatch(&self, name: &str, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.definition.name == name)
            .ok_or_else(|| format!("Unknown tool: {name}"))?;

        let empty = json!({});
        let args = if args.is_null() { &empty } else { args };
        if !args.is_object() {
            return Err(format!("{name}: arguments must be an object"));
        }

        for field in &entry.required {
            let present = match args.get(field) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(entry.handler.missing_arg(field));
            }
        }

        entry.handler.call(args, ctx).await
    }
}
