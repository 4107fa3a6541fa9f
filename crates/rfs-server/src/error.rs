//! API error types
//!
//! The single place where failures become HTTP statuses and `{message}`
//! bodies.

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rfs_core::RfsError;
use rfs_types::{routes, MessageResponse};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authorization Required")]
    AuthenticationRequired,

    #[error("Wrong username or password")]
    InvalidCredentials,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] RfsError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(e) => match e {
                RfsError::Decode(_) => StatusCode::BAD_REQUEST,
                RfsError::NotFound(_) | RfsError::NotAFile(_) => StatusCode::NOT_FOUND,
                RfsError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                RfsError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let mut response = (status, Json(MessageResponse::new(self.to_string()))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(routes::AUTHORITY),
            );
        }
        response
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
