//! Error types for the explorer service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use featscope_common::FeatureId;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::client::ClientError;
use crate::expansion::ExpansionError;

/// Explorer result type
pub type Result<T> = std::result::Result<T, ExploreError>;

#[derive(Debug, Error)]
pub enum ExploreError {
    /// Feature Data Service failure on a path that must surface it
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// The session was disposed while the request was in flight
    #[error("Session {0} has been closed")]
    SessionClosed(Uuid),

    #[error("No feature selected")]
    NoCurrentFeature,

    /// The drill-down path of the feature changed while its effects were fetched
    #[error("Expansion of feature {0} was superseded by a newer change")]
    Superseded(FeatureId),
}

impl ExploreError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExploreError::Client(_) => StatusCode::BAD_GATEWAY,
            ExploreError::Expansion(ExpansionError::FeatureNotExpanded(_)) => StatusCode::NOT_FOUND,
            ExploreError::Expansion(ExpansionError::StaleElement { .. }) => StatusCode::CONFLICT,
            ExploreError::Expansion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ExploreError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ExploreError::SessionClosed(_) => StatusCode::GONE,
            ExploreError::NoCurrentFeature => StatusCode::UNPROCESSABLE_ENTITY,
            ExploreError::Superseded(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ExploreError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}
