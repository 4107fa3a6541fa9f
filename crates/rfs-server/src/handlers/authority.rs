//! Session creation handler

use crate::error::{ApiError, ApiResult};
use crate::extractors::session_cookie;
use crate::AppState;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rfs_types::{LoginRequest, MessageResponse};
use tracing::info;

/// POST /api/v1/authority/
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    info!("Authentication request from: {}", req.username);

    let session = state
        .gateway
        .authenticate(&req.username, &req.password)
        .await?;
    let cookie = HeaderValue::from_str(&session_cookie(&session))
        .map_err(|e| ApiError::Internal(format!("invalid session cookie: {}", e)))?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse::new("OK, here is a cookie.")),
    )
        .into_response())
}
