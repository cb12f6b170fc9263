//! Inspect and drill-down endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use featscope_common::FeatureId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::expansion::{ExpandOutcome, ExpansionError};
use crate::layout::{layout_feature, FeatureLayout, LayoutMode};
use crate::session::Snapshot;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InspectRequest {
    /// Defaults to the session's current feature
    #[serde(default)]
    pub feature: Option<FeatureId>,
}

/// POST /api/sessions/:id/inspect
///
/// Fails with 502 (and leaves the registry untouched) when the effects
/// query fails; the UI shows the error as an alert.
pub async fn inspect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<InspectRequest>>,
) -> Result<Json<Snapshot>> {
    let feature = request.and_then(|Json(r)| r.feature);
    let session = state.sessions.get(id).await?;
    Ok(Json(session.inspect(feature).await?))
}

#[derive(Debug, Deserialize)]
pub struct ExpandRequest {
    /// Inspected feature whose drill-down is being changed
    pub feature: FeatureId,
    /// Row containing the clicked element
    pub row: usize,
    /// Position of the clicked element within the row
    pub element: usize,
}

#[derive(Debug, Serialize)]
pub struct ExpandResponse {
    #[serde(flatten)]
    pub outcome: ExpandOutcome,
    pub snapshot: Snapshot,
}

/// POST /api/sessions/:id/expand
pub async fn expand(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ExpandRequest>,
) -> Result<Json<ExpandResponse>> {
    let session = state.sessions.get(id).await?;
    let (outcome, snapshot) = session
        .expand(request.feature, request.row, request.element)
        .await?;
    Ok(Json(ExpandResponse { outcome, snapshot }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LayoutQuery {
    #[serde(default)]
    pub mode: LayoutMode,
}

/// GET /api/sessions/:id/expanded/:feature/layout?mode=bars|sankey
pub async fn get_layout(
    State(state): State<AppState>,
    Path((id, feature)): Path<(Uuid, FeatureId)>,
    Query(query): Query<LayoutQuery>,
) -> Result<Json<FeatureLayout>> {
    let session = state.sessions.get(id).await?;
    let snapshot = session.snapshot();
    let expanded = snapshot
        .expanded
        .get(feature)
        .ok_or(ExpansionError::FeatureNotExpanded(feature))?;
    Ok(Json(layout_feature(expanded, query.mode)))
}
