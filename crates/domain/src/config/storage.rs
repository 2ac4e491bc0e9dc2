use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// On-disk state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for sessions, transcripts, users, JSON blobs and uploaded images.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Where generated images are written; served under `/generated`.
    #[serde(default = "d_generated_dir")]
    pub generated_images_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            generated_images_dir: d_generated_dir(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_generated_dir() -> PathBuf {
    PathBuf::from("./data/generated")
}
