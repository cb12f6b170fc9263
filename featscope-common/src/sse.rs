//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE helpers for featscope services.

use axum::response::sse::{Event, KeepAlive};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{EventBus, ExplorerEvent};

/// Heartbeat interval for every SSE connection
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Keep-alive configuration shared by all SSE endpoints
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}

/// Convert an explorer event to an SSE frame named after its type
pub fn to_sse_event(event: &ExplorerEvent) -> Option<Event> {
    Event::default()
        .event(event.event_type())
        .json_data(event)
        .ok()
}

/// Stream of the EventBus events that belong to one session
///
/// Ends when the session's `SessionClosed` event passes through or the bus
/// is dropped. Lagged receivers skip the missed events and keep going.
pub fn session_event_stream(
    bus: &EventBus,
    session_id: Uuid,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut rx = bus.subscribe();

    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if event.session_id() == session_id => {
                    let closing = matches!(event, ExplorerEvent::SessionClosed { .. });
                    if let Some(frame) = to_sse_event(&event) {
                        yield Ok(frame);
                    }
                    if closing {
                        debug!(%session_id, "SSE: session closed, ending event stream");
                        break;
                    }
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%session_id, skipped, "SSE: event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
