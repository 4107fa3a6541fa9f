//! Node metadata handler

use crate::error::ApiResult;
use crate::storage::SessionContext;
use crate::AppState;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use rfs_types::NodeDescriptor;

/// GET /api/v1/node/{node_id}
pub async fn get(
    State(state): State<AppState>,
    session: SessionContext,
    segment: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<NodeDescriptor>> {
    let node_id = super::node_id(segment)?;
    describe(&state, &session, &node_id).await
}

/// GET /api/v1/node/ names the filesystem root.
pub async fn get_root(
    State(state): State<AppState>,
    session: SessionContext,
) -> ApiResult<Json<NodeDescriptor>> {
    describe(&state, &session, "").await
}

async fn describe(
    state: &AppState,
    session: &SessionContext,
    node_id: &str,
) -> ApiResult<Json<NodeDescriptor>> {
    let node = state.gateway.get_node(session, node_id).await?;
    Ok(Json(node))
}
