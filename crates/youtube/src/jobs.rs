//! Download job tracking.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            progress: 0,
            message: "Starting...".into(),
            file_name: None,
            public_url: None,
            video_count: None,
            error: None,
        }
    }

    /// Body of `GET /api/youtube/progress/:jobId`. Pending jobs report as
    /// running.
    pub fn progress_body(&self) -> Value {
        match self.status {
            JobStatus::Complete => json!({
                "ok": true,
                "status": "complete",
                "fileName": self.file_name,
                "publicUrl": self.public_url,
                "videoCount": self.video_count,
            }),
            JobStatus::Error => json!({
                "ok": false,
                "status": "error",
                "error": self.error.as_deref().unwrap_or("Download failed"),
            }),
            JobStatus::Pending | JobStatus::Running => json!({
                "status": "running",
                "progress": self.progress,
                "message": self.message,
            }),
        }
    }
}

/// Where job state lives.
pub trait JobStore: Send + Sync {
    fn insert(&self, id: &str, job: Job);
    fn get(&self, id: &str) -> Option<Job>;
    /// Apply `f` to the job if it exists. Returns whether it did.
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> bool;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, id: &str, job: Job) {
        self.jobs.write().insert(id.to_string(), job);
    }

    fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().get(id).cloned()
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> bool {
        match self.jobs.write().get_mut(id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }
}

/// `job_<unix millis>_<8 lowercase alphanumerics>`
pub fn new_job_id() -> String {
    let rand = uuid::Uuid::new_v4().simple().to_string();
    format!("job_{}_{}", chrono::Utc::now().timestamp_millis(), &rand[..8])
}
