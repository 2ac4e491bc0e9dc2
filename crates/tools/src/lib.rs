//! Tools the model can call during a tool-calling turn.
//!
//! Every tool runs locally against the turn's in-memory data (channel
//! JSON, the session CSV, attached images) except `generateImage`, which
//! goes through the configured [`ImageGenerator`](tc_providers::ImageGenerator).
//! Failures never escape as errors: the model always receives a result
//! object, `{"error": "..."}` when something went wrong.

pub mod channel;
pub mod context;
pub mod csv;
pub mod image;
pub mod registry;
pub mod stats;

pub use context::ToolContext;
pub use registry::{ToolHandler, ToolRegistry};
pub use stats::{coerce_number, compute_field_stats, describe, Stats};
