//! Stateless geometry and viewer helpers

use axum::{
    extract::{Path, State},
    Json,
};
use featscope_common::FeatureId;
use serde::{Deserialize, Serialize};

use crate::linker::{Connector, Rect};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectorRequest {
    /// Bounding box of the clicked bar
    pub parent: Rect,
    /// Bounding box of the child row container
    pub child: Rect,
    /// Element the path is drawn in; when given, both boxes are made relative to it
    #[serde(default)]
    pub container: Option<Rect>,
}

#[derive(Debug, Serialize)]
pub struct ConnectorResponse {
    pub path: String,
    pub connector: Connector,
}

/// POST /api/connector
///
/// Called by the page after every render and window resize.
pub async fn get_connector(Json(request): Json<ConnectorRequest>) -> Json<ConnectorResponse> {
    let connector = match &request.container {
        Some(container) => Connector::within(&request.parent, &request.child, container),
        None => Connector::between(&request.parent, &request.child),
    };

    Json(ConnectorResponse {
        path: connector.svg_path(),
        connector,
    })
}

#[derive(Debug, Serialize)]
pub struct ViewerUrl {
    pub feature: FeatureId,
    pub url: String,
}

/// GET /api/viewer/:feature
pub async fn get_viewer_url(
    State(state): State<AppState>,
    Path(feature): Path<FeatureId>,
) -> Json<ViewerUrl> {
    Json(ViewerUrl {
        feature,
        url: state.settings.viewer.url(feature),
    })
}
