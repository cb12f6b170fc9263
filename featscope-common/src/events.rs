//! Event types for the featscope event system
//!
//! Provides the shared event definitions and the EventBus used to fan
//! session activity out to SSE clients and log subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::FeatureId;

/// Explorer event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. Every event belongs to exactly one browsing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExplorerEvent {
    /// A browser page opened a new session
    SessionOpened {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session was disposed; late fetch completions are discarded from now on
    SessionClosed {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current feature changed (number entry, search pick, history click)
    FeatureLookedUp {
        session_id: Uuid,
        feature: FeatureId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A feature was inspected and moved to the front of the registry
    FeatureInspected {
        session_id: Uuid,
        feature: FeatureId,
        /// Entries in the freshly computed first row
        effect_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The drill-down path of an expanded feature changed
    RowsChanged {
        session_id: Uuid,
        feature: FeatureId,
        /// Number of rows after the change
        depth: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Fetching effect data failed; shown to the user as an alert
    ExpansionFailed {
        session_id: Uuid,
        feature: FeatureId,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A debounced search completed
    SearchCompleted {
        session_id: Uuid,
        query: String,
        result_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ExplorerEvent {
    /// SSE event name for this event
    pub fn event_type(&self) -> &str {
        match self {
            ExplorerEvent::SessionOpened { .. } => "SessionOpened",
            ExplorerEvent::SessionClosed { .. } => "SessionClosed",
            ExplorerEvent::FeatureLookedUp { .. } => "FeatureLookedUp",
            ExplorerEvent::FeatureInspected { .. } => "FeatureInspected",
            ExplorerEvent::RowsChanged { .. } => "RowsChanged",
            ExplorerEvent::ExpansionFailed { .. } => "ExpansionFailed",
            ExplorerEvent::SearchCompleted { .. } => "SearchCompleted",
        }
    }

    /// Session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            ExplorerEvent::SessionOpened { session_id, .. }
            | ExplorerEvent::SessionClosed { session_id, .. }
            | ExplorerEvent::FeatureLookedUp { session_id, .. }
            | ExplorerEvent::FeatureInspected { session_id, .. }
            | ExplorerEvent::RowsChanged { session_id, .. }
            | ExplorerEvent::ExpansionFailed { session_id, .. }
            | ExplorerEvent::SearchCompleted { session_id, .. } => *session_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks on slow
/// subscribers, subscribers clean up when dropped, and lagging receivers
/// observe `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use featscope_common::events::{EventBus, ExplorerEvent};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ExplorerEvent::SessionOpened {
///     session_id: Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ExplorerEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ExplorerEvent) {
        let _ = self.tx.send(event);
    }
}
