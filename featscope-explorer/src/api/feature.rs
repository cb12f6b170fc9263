//! Current feature and similarity graph

use axum::{
    extract::{Path, State},
    Json,
};
use featscope_common::FeatureId;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::graph::SimilarityGraph;
use crate::session::Snapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub feature: FeatureId,
}

/// PUT /api/sessions/:id/feature
///
/// Number entry, search pick and history click all land here.
pub async fn look_up_feature(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<Snapshot>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.look_up(request.feature).await?))
}

/// GET /api/sessions/:id/graph
pub async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SimilarityGraph>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.snapshot().graph.clone()))
}

/// DELETE /api/sessions/:id/graph
pub async fn reset_graph(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Snapshot>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.reset_graph().await?))
}
