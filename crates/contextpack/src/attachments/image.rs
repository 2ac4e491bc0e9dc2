use base64::Engine as _;
use serde::Serialize;

/// An image waiting to be sent, already base64-encoded for the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub data: String,
}

impl ImageAttachment {
    pub fn from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}
