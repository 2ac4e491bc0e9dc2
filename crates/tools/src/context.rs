use serde_json::Value;
use tc_contextpack::attachments::{videos_of, ImageAttachment, TabularData};
use tc_providers::ImageGenerator;

/// Data a tool call may read, borrowed from the running turn.
#[derive(Clone, Copy, Default)]
pub struct ToolContext<'a> {
    /// Full channel document (`{videos: [...]}`) when JSON is loaded.
    pub channel: Option<&'a Value>,
    /// Session CSV with the derived engagement column.
    pub table: Option<&'a TabularData>,
    /// Images attached to the current turn.
    pub images: &'a [ImageAttachment],
    pub image_generator: Option<&'a dyn ImageGenerator>,
}

pub(crate) const NO_CHANNEL: &str = "No video data. Load JSON channel data first.";
pub(crate) const NO_VIDEOS: &str = "No video data available.";
pub(crate) const NO_TABLE: &str = "No CSV data loaded. Attach a CSV file first.";

impl<'a> ToolContext<'a> {
    /// Videos of the loaded channel. Errors carry the user-facing reason.
    pub(crate) fn videos(&self) -> Result<&'a [Value], String> {
        let channel = self.channel.ok_or_else(|| NO_CHANNEL.to_string())?;
        let videos = videos_of(channel);
        if videos.is_empty() {
            return Err(NO_VIDEOS.to_string());
        }
        Ok(videos)
    }

    pub(crate) fn table(&self) -> Result<&'a TabularData, String> {
        self.table
            .filter(|t| !t.rows.is_empty())
            .ok_or_else(|| NO_TABLE.to_string())
    }
}
