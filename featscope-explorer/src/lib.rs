//! featscope-explorer library
//!
//! Browser-facing service for exploring model features by number, by
//! description search, or by drilling into top effects.

use axum::Router;
use featscope_common::events::EventBus;
use std::sync::Arc;

pub mod api;
pub mod client;
pub mod error;
pub mod expansion;
pub mod filter;
pub mod graph;
pub mod history;
pub mod layout;
pub mod linker;
pub mod search;
pub mod session;
pub mod viewer;

pub use error::{ExploreError, Result};

use client::FeatureSource;
use session::{SessionSettings, SessionStore};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Feature Data Service
    pub source: Arc<dyn FeatureSource>,
    /// Open browsing sessions
    pub sessions: Arc<SessionStore>,
    /// Behaviour applied to every new session
    pub settings: SessionSettings,
    /// Session activity fan-out for SSE clients
    pub events: EventBus,
}

impl AppState {
    /// Create new application state
    pub fn new(source: Arc<dyn FeatureSource>, settings: SessionSettings) -> Self {
        Self {
            source,
            sessions: Arc::new(SessionStore::new()),
            settings,
            events: EventBus::new(256),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};
    use tower_http::trace::TraceLayer;

    let sessions = Router::new()
        .route("/api/sessions", post(api::create_session))
        .route(
            "/api/sessions/:id",
            get(api::get_session).delete(api::close_session),
        )
        .route("/api/sessions/:id/events", get(api::session_events))
        .route("/api/sessions/:id/feature", put(api::look_up_feature))
        .route("/api/sessions/:id/inspect", post(api::inspect))
        .route("/api/sessions/:id/expand", post(api::expand))
        .route(
            "/api/sessions/:id/expanded/:feature/layout",
            get(api::get_layout),
        )
        .route(
            "/api/sessions/:id/search",
            put(api::type_search).delete(api::clear_search),
        )
        .route(
            "/api/sessions/:id/graph",
            get(api::get_graph).delete(api::reset_graph),
        );

    let stateless = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .route("/api/connector", post(api::get_connector))
        .route("/api/viewer/:feature", get(api::get_viewer_url))
        .merge(api::health_routes());

    Router::new()
        .merge(sessions)
        .merge(stateless)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
