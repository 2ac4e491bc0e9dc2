//! Signup and login.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use tc_sessions::NewUser;

use super::error::ApiResult;
use crate::state::AppState;

/// `POST /api/users`
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let user = state.users.signup(body)?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "user": user }))))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /api/users/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<impl IntoResponse> {
    let user = state.users.login(&body.username, &body.password)?;
    Ok(Json(json!({
        "ok": true,
        "username": user.username,
        "firstName": user.first_name,
        "lastName": user.last_name,
    })))
}
