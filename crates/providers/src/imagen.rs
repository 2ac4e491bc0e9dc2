//! Imagen text-to-image adapter.
//!
//! Generated images are written to a directory the gateway serves under
//! `/generated`, and the public URL is returned.

use std::path::PathBuf;

use serde_json::{json, Value};

use crate::traits::{AnchorImage, ImageGenerator};
use crate::util::{from_reqwest, redact_url_key, status_error};
use tc_domain::config::{LlmConfig, ServerConfig, StorageConfig};
use tc_domain::error::{Error, Result};

const PROVIDER_ID: &str = "imagen";

pub struct ImagenGenerator {
    base_url: String,
    api_key: String,
    model: String,
    output_dir: PathBuf,
    public_url: String,
    client: reqwest::Client,
}

impl ImagenGenerator {
    pub fn new(
        llm: &LlmConfig,
        storage: &StorageConfig,
        server: &ServerConfig,
        api_key: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(llm.request_timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: llm.image_model.clone(),
            output_dir: storage.generated_images_dir.clone(),
            public_url: server.public_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn predict_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:predict?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// Persist decoded bytes and return the public URL.
    async fn store(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_name = generated_file_name(mime_type);
        tokio::fs::write(self.output_dir.join(&file_name), bytes).await?;
        Ok(format!("{}/generated/{file_name}", self.public_url))
    }
}

/// `img_<millis>_<random>.<png|jpg>`
pub(crate) fn generated_file_name(mime_type: &str) -> String {
    let ext = if mime_type.contains("jpeg") || mime_type.contains("jpg") {
        "jpg"
    } else {
        "png"
    };
    let rand = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "img_{}_{}.{ext}",
        chrono::Utc::now().timestamp_millis(),
        &rand[..8]
    )
}

/// Pull the first prediction's payload out of a `:predict` reply.
pub(crate) fn parse_prediction(body: &Value) -> Result<(String, String)> {
    let first = body
        .get("predictions")
        .and_then(Value::as_array)
        .and_then(|p| p.first());

    let Some(pred) = first else {
        return Err(Error::Provider {
            provider: PROVIDER_ID.into(),
            message: "No image generated".into(),
        });
    };

    match pred.get("bytesBase64Encoded").and_then(Value::as_str) {
        Some(data) if !data.is_empty() => {
            let mime = pred
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Ok((data.to_string(), mime.to_string()))
        }
        _ => Err(Error::Provider {
            provider: PROVIDER_ID.into(),
            message: pred
                .get("raiFilteredReason")
                .and_then(Value::as_str)
                .unwrap_or("No image generated")
                .to_string(),
        }),
    }
}

#[async_trait::async_trait]
impl ImageGenerator for ImagenGenerator {
    async fn generate(&self, prompt: &str, anchor: Option<&AnchorImage>) -> Result<String> {
        use base64::Engine;

        if let Some(anchor) = anchor {
            // Imagen predict is text-only.
            tracing::debug!(
                anchor = anchor.name.as_deref().unwrap_or("(unnamed)"),
                "anchor image not forwarded to imagen"
            );
        }

        let url = self.predict_url();
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 },
        });
        tracing::debug!(url = %redact_url_key(&url), "imagen request");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(status_error(PROVIDER_ID, status, &text));
        }

        let reply: Value = serde_json::from_str(&text)?;
        let (data, mime) = parse_prediction(&reply)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| Error::Parse(format!("imagen payload: {e}")))?;
        self.store(&bytes, &mime).await
    }
}
