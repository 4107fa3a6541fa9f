//! HTTP handlers

pub mod authority;
pub mod content;
pub mod health;
pub mod node;

pub use health::health;

use crate::error::ApiResult;
use axum::extract::rejection::PathRejection;
use axum::extract::Path;
use rfs_core::RfsError;

/// Identifier from the `:node_id` segment. A segment that cannot be
/// extracted, e.g. one that does not percent-decode to UTF-8, is malformed.
fn node_id(segment: Result<Path<String>, PathRejection>) -> ApiResult<String> {
    match segment {
        Ok(Path(id)) => Ok(id),
        Err(e) => Err(RfsError::Decode(e.body_text()).into()),
    }
}
