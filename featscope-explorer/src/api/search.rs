//! Search box endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::session::Snapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchInput {
    pub query: String,
}

/// PUT /api/sessions/:id/search
///
/// Accepted immediately; results arrive later in a snapshot once the
/// debounce delay has passed.
pub async fn type_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SearchInput>,
) -> Result<(StatusCode, Json<Snapshot>)> {
    let session = state.sessions.get(id).await?;
    let snapshot = session.type_search(input.query).await?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// DELETE /api/sessions/:id/search
pub async fn clear_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Snapshot>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.clear_search().await?))
}
