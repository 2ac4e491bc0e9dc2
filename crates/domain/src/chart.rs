use serde::{Deserialize, Serialize};

/// A renderable result produced by a tool. The wire tag matches what the
/// chat UI switches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_chartType", rename_all = "snake_case")]
pub enum Chart {
    MetricVsTime {
        data: Vec<MetricPoint>,
        metric: String,
    },
    PlayVideo {
        #[serde(rename = "videoUrl")]
        video_url: String,
        title: String,
        #[serde(rename = "thumbnailUrl")]
        thumbnail_url: Option<String>,
    },
    GeneratedImage {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Engagement {
        data: Vec<serde_json::Value>,
        #[serde(rename = "metricColumn")]
        metric_column: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub date: String,
    pub value: f64,
}

impl Chart {
    /// Recover a chart from a tool result payload, if it carries one.
    ///
    /// Image generation returns a bare `{imageUrl}` without a tag.
    pub fn from_tool_result(result: &serde_json::Value) -> Option<Chart> {
        if result.get("error").is_some() {
            return None;
        }
        if result.get("_chartType").is_some() {
            return serde_json::from_value(result.clone()).ok();
        }
        result
            .get("imageUrl")
            .and_then(|v| v.as_str())
            .map(|url| Chart::GeneratedImage { image_url: url.to_string() })
    }
}
