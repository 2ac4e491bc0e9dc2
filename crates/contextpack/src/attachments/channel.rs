use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use tc_domain::error::Result;
use tc_domain::trace::TraceEvent;

/// Channel JSON loaded for the current session.
///
/// The full document stays in memory for local tools; the model only ever
/// sees the summary, the blob id and a small sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelData {
    pub name: String,
    #[serde(skip)]
    pub data: Value,
    pub json_id: String,
    pub summary: String,
}

impl ChannelData {
    /// The `videos` entries, empty when absent.
    pub fn videos(&self) -> &[Value] {
        videos_of(&self.data)
    }
}

pub fn videos_of(data: &Value) -> &[Value] {
    data.get("videos")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// One-line description: `"<count> videos. Fields: <names>"`.
///
/// Field names come from the first video, transcripts excluded. Returns
/// `None` when the document has no `videos` array.
pub fn summarize_channel(data: &Value) -> Option<String> {
    let videos = data.get("videos")?.as_array()?;
    let fields = videos
        .first()
        .and_then(Value::as_object)
        .map(|first| {
            first
                .keys()
                .filter(|k| k.as_str() != "transcript")
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    Some(format!("{} videos. Fields: {fields}", videos.len()))
}

/// Parse, upload and summarize a dropped JSON file.
///
/// Any failure is logged and yields `None`: the chat stays usable and the
/// file simply does not attach.
pub async fn load_channel_json<F, Fut>(name: &str, text: &str, upload: F) -> Option<ChannelData>
where
    F: FnOnce(Value) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let outcome = async {
        let data: Value = serde_json::from_str(text)?;
        let summary = summarize_channel(&data).ok_or_else(|| {
            tc_domain::error::Error::Parse(format!("{name}: no `videos` array"))
        })?;
        let json_id = upload(data.clone()).await?;
        Ok::<_, tc_domain::error::Error>(ChannelData {
            name: name.to_string(),
            data,
            json_id,
            summary,
        })
    }
    .await;

    TraceEvent::AttachmentProcessed {
        kind: "json".into(),
        name: name.to_string(),
        ok: outcome.is_ok(),
    }
    .emit();

    match outcome {
        Ok(channel) => Some(channel),
        Err(e) => {
            tracing::warn!(file = %name, error = %e, "channel JSON not attached");
            None
        }
    }
}
