//! Session lifecycle and event stream
//!
//! One session per browser page: created on load, disposed on unload.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Json,
};
use featscope_common::sse;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::session::{Session, SessionState, Snapshot};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub session_id: Uuid,
}

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreatedSession>) {
    let session = Session::new(
        state.source.clone(),
        state.settings.clone(),
        state.events.clone(),
    );
    let session_id = session.id();
    state.sessions.insert(session).await;
    info!(%session_id, "Session created");

    (StatusCode::CREATED, Json(CreatedSession { session_id }))
}

/// GET /api/sessions/:id
///
/// Latest snapshot of the session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Snapshot>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.snapshot()))
}

/// DELETE /api/sessions/:id
pub async fn close_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn snapshot_event(snapshot: &SessionState) -> Option<Event> {
    Event::default().event("Snapshot").json_data(snapshot).ok()
}

/// GET /api/sessions/:id/events
///
/// Streams the current snapshot, then one `Snapshot` event per change,
/// interleaved with the session's alerts (e.g. `ExpansionFailed`). The
/// stream ends when the session is closed.
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let session = state.sessions.get(id).await?;
    let mut snapshots = session.subscribe();
    let mut alerts = Box::pin(sse::session_event_stream(&state.events, id));
    debug!(session = %id, "SSE client connected");

    let stream = async_stream::stream! {
        let initial = snapshots.borrow_and_update().clone();
        if let Some(frame) = snapshot_event(&initial) {
            yield Ok(frame);
        }

        loop {
            let next = tokio::select! {
                changed = snapshots.changed() => match changed {
                    Ok(()) => {
                        let snapshot = snapshots.borrow_and_update().clone();
                        Some(snapshot_event(&snapshot))
                    }
                    Err(_) => None,
                },
                alert = alerts.next() => alert.map(|frame| frame.ok()),
            };

            match next {
                Some(Some(frame)) => yield Ok(frame),
                Some(None) => continue,
                None => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(sse::keep_alive()))
}
