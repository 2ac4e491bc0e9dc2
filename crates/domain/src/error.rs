/// Shared error type used across all tubechat crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    /// Bad caller input (missing field, malformed id or URL).
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("parse: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("session busy: {0}")]
    SessionBusy(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Substrings that mark an upstream failure as transient.
const RETRYABLE_MARKERS: &[&str] = &[
    "429",
    "quota exceeded",
    "resource_exhausted",
    "resource exhausted",
    "too many requests",
    "500",
    "internal server error",
    "503",
    "service unavailable",
];

impl Error {
    /// Whether a retry with backoff has a chance of succeeding.
    ///
    /// Only upstream failures qualify; caller mistakes and local faults
    /// never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout(_) | Error::Provider { .. } | Error::Other(_) => {
                let msg = self.to_string().to_lowercase();
                RETRYABLE_MARKERS.iter().any(|m| msg.contains(m))
            }
            _ => false,
        }
    }

    /// The message without its category prefix, for user-facing bodies.
    pub fn detail(&self) -> String {
        match self {
            Error::Provider { message, .. } => message.clone(),
            Error::Http(m)
            | Error::Timeout(m)
            | Error::Config(m)
            | Error::Validation(m)
            | Error::Parse(m)
            | Error::NotFound(m)
            | Error::Conflict(m)
            | Error::Auth(m)
            | Error::SessionBusy(m)
            | Error::Other(m) => m.clone(),
            Error::Io(_) | Error::Json(_) => self.to_string(),
        }
    }
}
