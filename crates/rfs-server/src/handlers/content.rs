//! Streaming handlers for file content and archives

use crate::error::{ApiError, ApiResult};
use crate::storage::SessionContext;
use crate::AppState;
use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rfs_core::StreamableArtifact;
use std::fmt::Write;

/// GET /api/v1/content/{node_id}
pub async fn get(
    State(state): State<AppState>,
    session: SessionContext,
    segment: Result<Path<String>, PathRejection>,
) -> ApiResult<Response> {
    let node_id = super::node_id(segment)?;
    content(&state, &session, &node_id).await
}

/// GET /api/v1/content/
pub async fn get_root(
    State(state): State<AppState>,
    session: SessionContext,
) -> ApiResult<Response> {
    content(&state, &session, "").await
}

/// GET /api/v1/download/{node_id}
pub async fn archive(
    State(state): State<AppState>,
    session: SessionContext,
    segment: Result<Path<String>, PathRejection>,
) -> ApiResult<Response> {
    let node_id = super::node_id(segment)?;
    download(&state, &session, &node_id).await
}

/// GET /api/v1/download/ archives the filesystem root.
pub async fn archive_root(
    State(state): State<AppState>,
    session: SessionContext,
) -> ApiResult<Response> {
    download(&state, &session, "").await
}

async fn content(
    state: &AppState,
    session: &SessionContext,
    node_id: &str,
) -> ApiResult<Response> {
    let artifact = state.gateway.get_content(session, node_id).await?;
    stream_response(state, artifact).await
}

async fn download(
    state: &AppState,
    session: &SessionContext,
    node_id: &str,
) -> ApiResult<Response> {
    let artifact = state.gateway.get_archive(session, node_id).await?;
    stream_response(state, artifact).await
}

/// Stream an artifact as the response body.
///
/// The body owns the stream, so a client disconnect drops it and the
/// artifact's cleanup runs.
async fn stream_response(state: &AppState, artifact: StreamableArtifact) -> ApiResult<Response> {
    let stream = state.gateway.stream(artifact).await?;

    let content_type = HeaderValue::from_str(&stream.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = content_disposition(&stream.filename)?;
    let length = HeaderValue::from(stream.content_length);

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, disposition),
            (CONTENT_LENGTH, length),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `filename="..."` for plain ASCII names, RFC 5987 `filename*` otherwise.
fn content_disposition(filename: &str) -> ApiResult<HeaderValue> {
    let plain = filename
        .bytes()
        .all(|b| (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\');

    let value = if plain {
        format!("filename=\"{}\"", filename)
    } else {
        let mut encoded = String::from("filename*=UTF-8''");
        for b in filename.bytes() {
            if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
                encoded.push(b as char);
            } else {
                let _ = write!(encoded, "%{:02X}", b);
            }
        }
        encoded
    };

    HeaderValue::from_str(&value)
        .map_err(|e| ApiError::Internal(format!("invalid content disposition: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_filename() {
        assert_eq!(
            content_disposition("report final.pdf").unwrap(),
            "filename=\"report final.pdf\""
        );
    }

    #[test]
    fn test_non_ascii_filename_is_encoded() {
        assert_eq!(
            content_disposition("données.txt").unwrap(),
            "filename*=UTF-8''donn%C3%A9es.txt"
        );
        assert_eq!(
            content_disposition("say \"hi\"").unwrap(),
            "filename*=UTF-8''say%20%22hi%22"
        );
    }
}
