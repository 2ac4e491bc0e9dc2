//! Content stores: channel JSON documents and uploaded images.
//!
//! Ids are opaque and pattern-checked; no client input can name a path
//! outside the store directory.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::Engine as _;
use regex::Regex;
use serde_json::Value;
use tc_domain::chat::ImageRef;
use tc_domain::error::{Error, Result};

use crate::timestamped_id;

fn json_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^json_\d+_[a-z0-9]+$").expect("valid regex"))
}

fn image_file_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^img_\d+_[a-z0-9]+\.(png|jpg|gif|webp)$").expect("valid regex"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON blobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct JsonBlobStore {
    dir: PathBuf,
}

impl JsonBlobStore {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn is_valid_id(id: &str) -> bool {
        json_id_pattern().is_match(id)
    }

    /// Store a document and return its `json_<millis>_<rand>` id.
    pub async fn put(&self, data: &Value) -> Result<String> {
        if !data.is_object() && !data.is_array() {
            return Err(Error::Validation("JSON body required".into()));
        }
        let id = timestamped_id("json");
        let raw = serde_json::to_vec(data)?;
        tokio::fs::write(self.dir.join(format!("{id}.json")), raw).await?;
        tracing::debug!(json_id = %id, "json blob stored");
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        if !Self::is_valid_id(id) {
            return Err(Error::Validation("Invalid jsonId".into()));
        }
        let path = self.dir.join(format!("{id}.json"));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound("Not found".into()))
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(serde_json::from_slice(&raw)?)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Images
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Images attached to user messages. Transcripts keep only the
/// [`ImageRef`]; the bytes are served back under `url_prefix`.
pub struct ImageStore {
    dir: PathBuf,
    url_prefix: String,
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

pub fn mime_for_file(file: &str) -> &'static str {
    match file.rsplit('.').next() {
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

impl ImageStore {
    pub fn new(dir: &Path, url_prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Decode and store a base64 image.
    pub async fn put(&self, mime_type: &str, data: &str) -> Result<ImageRef> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| Error::Validation(format!("invalid base64 image: {e}")))?;
        let id = timestamped_id("img");
        let file = format!("{id}.{}", extension_for(mime_type));
        tokio::fs::write(self.dir.join(&file), bytes).await?;
        Ok(ImageRef {
            id,
            mime_type: mime_type.to_string(),
            url: format!("{}/{file}", self.url_prefix),
        })
    }

    /// Bytes and MIME type of a stored file.
    pub async fn get(&self, file: &str) -> Result<(Vec<u8>, &'static str)> {
        if !image_file_pattern().is_match(file) {
            return Err(Error::Validation("Invalid image name".into()));
        }
        match tokio::fs::read(self.dir.join(file)).await {
            Ok(bytes) => Ok((bytes, mime_for_file(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound("Not found".into()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_round_trip_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonBlobStore::new(dir.path()).unwrap();
        let id = store.put(&json!({"videos": [{"title": "a"}]})).await.unwrap();
        assert!(JsonBlobStore::is_valid_id(&id), "{id}");
        assert_eq!(store.get(&id).await.unwrap()["videos"][0]["title"], "a");
    }

    #[tokio::test]
    async fn json_ids_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonBlobStore::new(dir.path()).unwrap();
        assert!(matches!(store.get("../etc/passwd").await, Err(Error::Validation(_))));
        assert!(matches!(store.get("json_1_abc").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn scalar_documents_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonBlobStore::new(dir.path()).unwrap();
        assert!(matches!(store.put(&json!(3)).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn images_are_stored_by_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "/api/images/").unwrap();
        let r = store.put("image/jpeg", "AQID").await.unwrap();
        assert!(r.url.starts_with("/api/images/img_"));
        assert!(r.url.ends_with(".jpg"));
        let file = r.url.rsplit('/').next().unwrap();
        let (bytes, mime) = store.get(file).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(mime, "image/jpeg");
        assert!(matches!(store.get("x.png").await, Err(Error::Validation(_))));
    }
}
