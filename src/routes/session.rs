use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::SessionSigner;
use crate::error::{ApiError, AppJson};
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> { Router::new().route("/jwt", post(issue_session)) }

#[derive(Debug, Deserialize)]
struct SessionRequest {
    #[serde(default)]
    email: Option<String>,
}

async fn issue_session(
    State(state): State<AppState>,
    AppJson(body): AppJson<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = body
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::InvalidArgument("Email is required".to_string()))?;
    let token = state.sessions.issue(&email)?;
    let cookie = SessionSigner::cookie(&token, state.secure_cookies);
    Ok(([(SET_COOKIE, cookie)], Json(json!({"success": true}))))
}
