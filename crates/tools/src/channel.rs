//! Tools over loaded channel JSON.

use serde_json::{json, Value};
use tc_domain::chart::{Chart, MetricPoint};
use tc_domain::tool::ToolDefinition;

use crate::context::ToolContext;
use crate::registry::ToolHandler;
use crate::stats::{coerce_number, compute_field_stats, NUMERIC_FIELD_HINT};

const NO_MATCH: &str =
    "Could not find a matching video. Try by title (e.g. \"asbestos\"), ordinal (e.g. first=1), or mostViewed.";

fn numeric_field_param() -> Value {
    json!({
        "type": "STRING",
        "description": format!("Numeric field name. Examples: {NUMERIC_FIELD_HINT}."),
    })
}

fn chart_json(chart: &Chart) -> Result<Value, String> {
    serde_json::to_value(chart).map_err(|e| e.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// plot_metric_vs_time
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PlotMetricVsTime;

/// Points of `metric` by release day, oldest first.
///
/// Videos without a numeric value or a `release_date` string are dropped.
pub fn metric_points(videos: &[Value], metric: &str) -> Vec<MetricPoint> {
    let mut points: Vec<MetricPoint> = videos
        .iter()
        .filter_map(|v| {
            let value = v.get(metric).and_then(coerce_number)?;
            let released = v.get("release_date")?.as_str()?;
            let date: String = released.chars().take(10).collect();
            Some(MetricPoint { date, value })
        })
        .collect();
    points.sort_by(|a, b| a.date.cmp(&b.date));
    points
}

#[async_trait::async_trait]
impl ToolHandler for PlotMetricVsTime {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "plot_metric_vs_time".into(),
            description: "Plot a numeric metric from the loaded JSON channel data over time \
                          (by release_date). Use when the user asks to visualize how views, \
                          likes, comments, or duration trend over time."
                .into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": { "metric": numeric_field_param() },
                "required": ["metric"],
            }),
        }
    }

    fn missing_arg(&self, field: &str) -> String {
        format!("{field} (string) is required. Examples: {NUMERIC_FIELD_HINT}.")
    }

    async fn call(&self, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String> {
        let metric = args
            .get("metric")
            .and_then(Value::as_str)
            .map(str::trim)
            .ok_or_else(|| self.missing_arg("metric"))?;
        let videos = ctx.videos()?;

        let data = metric_points(videos, metric);
        if data.is_empty() {
            return Err(format!(
                "Metric \"{metric}\" has no numeric values. Try: {NUMERIC_FIELD_HINT}."
            ));
        }
        chart_json(&Chart::MetricVsTime { data, metric: metric.to_string() })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// play_video
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PlayVideo;

/// How the model asked for a video.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSelector {
    Url(String),
    MostViewed,
    /// 1-based position in the channel list.
    Ordinal(usize),
    Title(String),
}

impl VideoSelector {
    /// First applicable selector in priority order: YouTube URL, most
    /// viewed, ordinal, title substring.
    pub fn from_args(args: &Value) -> Option<Self> {
        if let Some(url) = args.get("videoUrl").and_then(Value::as_str) {
            if url.contains("youtube") {
                return Some(Self::Url(url.to_string()));
            }
        }
        if args.get("mostViewed").and_then(Value::as_bool).unwrap_or(false) {
            return Some(Self::MostViewed);
        }
        if let Some(n) = args.get("ordinal").and_then(Value::as_f64) {
            if n >= 1.0 && n.fract() == 0.0 {
                return Some(Self::Ordinal(n as usize));
            }
        }
        args.get("titleQuery")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| Self::Title(q.to_lowercase()))
    }
}

fn str_field<'v>(video: &'v Value, key: &str) -> Option<&'v str> {
    video.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Resolve a selector to a `play_video` chart.
pub fn resolve_video(videos: &[Value], selector: &VideoSelector) -> Option<Chart> {
    let video = match selector {
        VideoSelector::Url(url) => {
            let known = videos.iter().find(|v| str_field(v, "video_url") == Some(url.as_str()));
            match known {
                Some(v) => v,
                // Unknown but YouTube-looking URLs play as-is.
                None => {
                    return Some(Chart::PlayVideo {
                        video_url: url.clone(),
                        title: "Video".into(),
                        thumbnail_url: None,
                    })
                }
            }
        }
        VideoSelector::MostViewed => {
            let views = |v: &Value| v.get("view_count").and_then(coerce_number).unwrap_or(0.0);
            videos.iter().fold(None::<&Value>, |best, v| match best {
                Some(b) if views(b) >= views(v) => Some(b),
                _ => Some(v),
            })?
        }
        VideoSelector::Ordinal(n) => videos.get(n.checked_sub(1)?)?,
        VideoSelector::Title(q) => videos.iter().find(|v| {
            str_field(v, "title")
                .map(|t| t.to_lowercase().contains(q.as_str()))
                .unwrap_or(false)
        })?,
    };

    Some(Chart::PlayVideo {
        video_url: str_field(video, "video_url")?.to_string(),
        title: str_field(video, "title").unwrap_or("Video").to_string(),
        thumbnail_url: str_field(video, "thumbnail_url").map(str::to_string),
    })
}

#[async_trait::async_trait]
impl ToolHandler for PlayVideo {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "play_video".into(),
            description: "Open or preview a specific video from the channel data. Identify it \
                          by URL, by title words, by position (first=1), or ask for the most \
                          viewed one."
                .into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "videoUrl": {
                        "type": "STRING",
                        "description": "Full YouTube video URL (e.g. https://www.youtube.com/watch?v=VIDEO_ID).",
                    },
                    "titleQuery": {
                        "type": "STRING",
                        "description": "Words from the video title.",
                    },
                    "ordinal": {
                        "type": "INTEGER",
                        "description": "1-based position in the channel list.",
                    },
                    "mostViewed": {
                        "type": "BOOLEAN",
                        "description": "Pick the video with the highest view count.",
                    },
                },
            }),
        }
    }

    async fn call(&self, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String> {
        let videos = ctx.videos()?;
        let chart = VideoSelector::from_args(args)
            .and_then(|sel| resolve_video(videos, &sel))
            .ok_or_else(|| NO_MATCH.to_string())?;
        chart_json(&chart)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// compute_stats_json
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ComputeStatsJson;

#[async_trait::async_trait]
impl ToolHandler for ComputeStatsJson {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "compute_stats_json".into(),
            description: "Compute statistics (mean, median, std, min, max, count) for a numeric \
                          field in the loaded JSON channel data."
                .into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": { "field": numeric_field_param() },
                "required": ["field"],
            }),
        }
    }

    async fn call(&self, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String> {
        let field = args
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| self.missing_arg("field"))?;
        compute_field_stats(ctx.videos()?, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Value {
        json!({"videos": [
            {"title": "Asbestos explained", "view_count": 50, "release_date": "2024-03-01T10:00:00Z",
             "video_url": "https://www.youtube.com/watch?v=a", "thumbnail_url": "https://i.ytimg.com/a.jpg"},
            {"title": "Lead paint", "view_count": "900", "release_date": "2024-01-15T08:00:00Z",
             "video_url": "https://www.youtube.com/watch?v=b"},
            {"title": "Radon", "view_count": "n/a", "release_date": "2024-02-01T00:00:00Z",
             "video_url": "https://www.youtube.com/watch?v=c"}
        ]})
    }

    fn ctx(data: &Value) -> ToolContext<'_> {
        ToolContext { channel: Some(data), ..Default::default() }
    }

    #[tokio::test]
    async fn points_sorted_by_date() {
        let data = channel();
        let out = PlotMetricVsTime.call(&json!({"metric": "view_count"}), &ctx(&data)).await.unwrap();
        assert_eq!(out["_chartType"], "metric_vs_time");
        assert_eq!(out["data"][0]["date"], "2024-01-15");
        assert_eq!(out["data"][1]["date"], "2024-03-01");
        assert_eq!(out["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn plot_without_channel_is_soft_error() {
        let err = PlotMetricVsTime
            .call(&json!({"metric": "view_count"}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(err.contains("No video data"));
    }

    #[tokio::test]
    async fn plot_non_numeric_metric() {
        let data = channel();
        let err = PlotMetricVsTime.call(&json!({"metric": "title"}), &ctx(&data)).await.unwrap_err();
        assert!(err.starts_with("Metric \"title\" has no numeric values."));
    }

    #[test]
    fn selector_priority() {
        let all = json!({
            "videoUrl": "https://www.youtube.com/watch?v=z",
            "mostViewed": true,
            "ordinal": 2,
            "titleQuery": "radon"
        });
        assert!(matches!(VideoSelector::from_args(&all), Some(VideoSelector::Url(_))));
        assert_eq!(
            VideoSelector::from_args(&json!({"videoUrl": "not a link", "ordinal": 2})),
            Some(VideoSelector::Ordinal(2))
        );
        assert_eq!(VideoSelector::from_args(&json!({})), None);
    }

    #[test]
    fn resolves_each_selector() {
        let data = channel();
        let videos = data["videos"].as_array().unwrap();

        let most = resolve_video(videos, &VideoSelector::MostViewed).unwrap();
        assert!(matches!(&most, Chart::PlayVideo { title, .. } if title == "Lead paint"));

        let first = resolve_video(videos, &VideoSelector::Ordinal(1)).unwrap();
        assert!(matches!(&first, Chart::PlayVideo { thumbnail_url: Some(_), .. }));

        let by_title = resolve_video(videos, &VideoSelector::Title("asbestos".into())).unwrap();
        assert!(matches!(&by_title, Chart::PlayVideo { video_url, .. } if video_url.ends_with("v=a")));

        let passthrough =
            resolve_video(videos, &VideoSelector::Url("https://www.youtube.com/watch?v=zz".into())).unwrap();
        assert!(matches!(&passthrough, Chart::PlayVideo { title, thumbnail_url: None, .. } if title == "Video"));

        assert!(resolve_video(videos, &VideoSelector::Ordinal(9)).is_none());
    }

    #[tokio::test]
    async fn play_reports_no_match() {
        let data = channel();
        let err = PlayVideo.call(&json!({"titleQuery": "volcano"}), &ctx(&data)).await.unwrap_err();
        assert_eq!(err, NO_MATCH);
    }

    #[tokio::test]
    async fn stats_over_channel() {
        let data = channel();
        let out = ComputeStatsJson.call(&json!({"field": "view_count"}), &ctx(&data)).await.unwrap();
        assert_eq!(out["count"], 2);
        assert_eq!(out["max"], 900);
    }
}
