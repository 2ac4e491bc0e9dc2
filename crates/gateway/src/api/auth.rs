//! Bearer-token guard for the protected routes.
//!
//! The token named by `server.api_token_env` is hashed once in bootstrap;
//! without one the guard lets every request through.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use tc_domain::error::Error;

use super::error::ApiResult;
use crate::state::AppState;

const REJECTED: &str = "invalid or missing API token";

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Compares digests so neither content nor length leaks through timing.
fn token_matches(expected_hash: &[u8], provided: &str) -> bool {
    Sha256::digest(provided.as_bytes()).ct_eq(expected_hash).into()
}

/// Middleware for the protected router; a rejection becomes a 401 `ApiError`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> ApiResult<Response> {
    if let Some(expected) = state.api_token_hash.as_deref() {
        let accepted = bearer_token(req.headers()).is_some_and(|t| token_matches(expected, t));
        if !accepted {
            tracing::debug!(path = %req.uri().path(), "rejected request without a valid API token");
            return Err(Error::Auth(REJECTED.into()).into());
        }
    }
    Ok(next.run(req).await)
}
