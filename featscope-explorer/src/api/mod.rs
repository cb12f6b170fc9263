//! HTTP API handlers for featscope-explorer

pub mod connector;
pub mod expansion;
pub mod feature;
pub mod health;
pub mod search;
pub mod sessions;
pub mod ui;

pub use connector::{get_connector, get_viewer_url};
pub use expansion::{expand, get_layout, inspect};
pub use feature::{get_graph, look_up_feature, reset_graph};
pub use health::health_routes;
pub use search::{clear_search, type_search};
pub use sessions::{close_session, create_session, get_session, session_events};
pub use ui::{serve_app_js, serve_index};
