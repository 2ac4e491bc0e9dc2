//! Normalizes dropped or pasted files into in-memory attachments.

pub mod channel;
pub mod csv;
pub mod image;

use std::future::Future;

use serde_json::Value;
use tc_domain::config::RoutingConfig;
use tc_domain::error::Result;
use tc_domain::trace::TraceEvent;

pub use channel::{load_channel_json, summarize_channel, videos_of, ChannelData};
pub use csv::{CsvAttachment, Row, TabularData};
pub use image::ImageAttachment;

use crate::engagement::{enrich_with_engagement, RatioEngagement};
use crate::summary::{dataset_summary, slim_csv, SlimCsv};

/// What a file is, judged by extension first and MIME type second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Csv,
    Json,
    Image,
}

impl AttachmentKind {
    pub fn classify(name: &str, mime_type: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") || mime_type == "text/csv" {
            Some(Self::Csv)
        } else if lower.ends_with(".json") || mime_type == "application/json" {
            Some(Self::Json)
        } else if mime_type.starts_with("image/") {
            Some(Self::Image)
        } else {
            None
        }
    }
}

/// Session-level dataset: survives after the CSV chip is sent so tools and
/// later prompts still know the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularContext {
    pub data: TabularData,
    pub summary: String,
    /// Allowlisted-columns projection for direct prompt inclusion.
    pub slim: Option<SlimCsv>,
}

/// Everything a CSV drop produces.
#[derive(Debug, Clone)]
pub struct ProcessedCsv {
    pub chip: CsvAttachment,
    pub context: TabularContext,
}

#[derive(Clone)]
pub struct AttachmentProcessor {
    config: RoutingConfig,
}

impl AttachmentProcessor {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Parse a CSV into the pending chip plus the enriched session dataset.
    pub fn csv(&self, name: &str, text: &str) -> Result<ProcessedCsv> {
        let outcome = self.process_csv(name, text);
        TraceEvent::AttachmentProcessed {
            kind: "csv".into(),
            name: name.to_string(),
            ok: outcome.is_ok(),
        }
        .emit();
        outcome
    }

    fn process_csv(&self, name: &str, text: &str) -> Result<ProcessedCsv> {
        let chip = csv::parse_csv(name, text, self.config.base64_char_cap, self.config.preview_lines)?;
        let mut data = csv::parse_rows(text)?;
        enrich_with_engagement(&mut data, &RatioEngagement);
        let summary = dataset_summary(&data);
        let slim = slim_csv(&data, &self.config.slim_columns, self.config.slim_char_cap);
        Ok(ProcessedCsv { chip, context: TabularContext { data, summary, slim } })
    }

    /// Parse and upload channel JSON. `None` on any failure.
    pub async fn channel_json<F, Fut>(&self, name: &str, text: &str, upload: F) -> Option<ChannelData>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        load_channel_json(name, text, upload).await
    }

    pub fn image(&self, name: &str, mime_type: &str, bytes: &[u8]) -> ImageAttachment {
        TraceEvent::AttachmentProcessed {
            kind: "image".into(),
            name: name.to_string(),
            ok: true,
        }
        .emit();
        ImageAttachment::from_bytes(name, mime_type, bytes)
    }
}
