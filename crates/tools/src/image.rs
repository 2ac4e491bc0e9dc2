use serde_json::{json, Value};
use tc_domain::tool::ToolDefinition;
use tc_providers::AnchorImage;

use crate::context::ToolContext;
use crate::registry::ToolHandler;

pub struct GenerateImage;

/// Anchor from the call arguments, else the first image attached this turn.
fn anchor_for(args: &Value, ctx: &ToolContext<'_>) -> Option<AnchorImage> {
    let explicit = args.get("anchorImage").and_then(|a| {
        let data = a.get("base64").and_then(Value::as_str).filter(|d| !d.is_empty())?;
        Some(AnchorImage {
            name: a.get("name").and_then(Value::as_str).map(str::to_string),
            mime_type: a
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png")
                .to_string(),
            data: data.to_string(),
        })
    });
    explicit.or_else(|| {
        ctx.images.first().map(|img| AnchorImage {
            name: Some("anchor".into()),
            mime_type: img.mime_type.clone(),
            data: img.data.clone(),
        })
    })
}

#[async_trait::async_trait]
impl ToolHandler for GenerateImage {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "generateImage".into(),
            description: "Generate an image from a text prompt. Use when the user asks to create, \
                          draw, or generate an image, thumbnail or infographic."
                .into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "prompt": {
                        "type": "STRING",
                        "description": "Detailed text description of the image to generate."
                    },
                    "anchorImage": {
                        "type": "OBJECT",
                        "description": "Optional reference image when user attached an image.",
                        "properties": {
                            "name": { "type": "STRING", "description": "File name." },
                            "mimeType": { "type": "STRING", "description": "MIME type (e.g. image/png, image/jpeg)." },
                            "base64": { "type": "STRING", "description": "Base64-encoded image data." }
                        }
                    }
                },
                "required": ["prompt"]
            }),
        }
    }

    async fn call(&self, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String> {
        let prompt = args
            .get("prompt")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| self.missing_arg("prompt"))?;
        let generator = ctx
            .image_generator
            .ok_or_else(|| "Image generation is not configured.".to_string())?;

        let anchor = anchor_for(args, ctx);
        let url = generator
            .generate(prompt, anchor.as_ref())
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({ "imageUrl": url }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Recorder;
    use tc_contextpack::attachments::ImageAttachment;

    mod fake {
        use std::sync::Mutex;
        use tc_domain::error::{Error, Result};
        use tc_providers::{AnchorImage, ImageGenerator};

        /// Records the last request; fails when the prompt says so.
        #[derive(Default)]
        pub struct Recorder {
            pub seen: Mutex<Option<(String, Option<AnchorImage>)>>,
        }

        #[async_trait::async_trait]
        impl ImageGenerator for Recorder {
            async fn generate(&self, prompt: &str, anchor: Option<&AnchorImage>) -> Result<String> {
                if prompt.contains("fail") {
                    return Err(Error::Provider {
                        provider: "imagen".into(),
                        message: "No image generated".into(),
                    });
                }
                *self.seen.lock().unwrap() = Some((prompt.to_string(), anchor.cloned()));
                Ok("http://localhost:3001/generated/img_1_abcd1234.png".into())
            }
        }
    }

    #[tokio::test]
    async fn returns_image_url_and_uses_attached_image_as_anchor() {
        let gen = Recorder::default();
        let images = vec![ImageAttachment::from_bytes("cat.png", "image/png", &[1, 2, 3])];
        let ctx = ToolContext { images: &images, image_generator: Some(&gen), ..Default::default() };

        let out = GenerateImage.call(&json!({"prompt": " a cat "}), &ctx).await.unwrap();
        assert_eq!(out["imageUrl"], "http://localhost:3001/generated/img_1_abcd1234.png");

        let seen = gen.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.0, "a cat");
        let anchor = seen.1.unwrap();
        assert_eq!(anchor.name.as_deref(), Some("anchor"));
        assert_eq!(anchor.mime_type, "image/png");
    }

    #[tokio::test]
    async fn generator_failure_becomes_message() {
        let gen = Recorder::default();
        let ctx = ToolContext { image_generator: Some(&gen), ..Default::default() };
        let err = GenerateImage.call(&json!({"prompt": "please fail"}), &ctx).await.unwrap_err();
        assert!(err.contains("No image generated"));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let err = GenerateImage.call(&json!({"prompt": ""}), &ToolContext::default()).await.unwrap_err();
        assert_eq!(err, "prompt (string) is required.");
    }
}
