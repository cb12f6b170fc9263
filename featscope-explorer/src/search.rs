//! Search box debouncing
//!
//! Every keystroke restarts a quiet-period timer; only the query that
//! survives the full delay is run. Each timer owns a child of the session's
//! cancellation token: the next keystroke cancels it, and so does closing
//! the session. A timer that has already fired is not affected by later
//! keystrokes, so overlapping searches can still land out of order (the
//! last one to land wins).

use featscope_common::config::SearchConfig;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct SearchDebouncer {
    delay: Duration,
    min_query_len: usize,
    /// Session token; every timer is one of its children
    parent: CancellationToken,
    /// Token of the timer that has not fired yet, if any
    pending: Mutex<Option<CancellationToken>>,
}

impl SearchDebouncer {
    pub fn new(config: &SearchConfig, parent: CancellationToken) -> Self {
        Self {
            delay: Duration::from_millis(config.debounce_ms),
            min_query_len: config.min_query_len,
            parent,
            pending: Mutex::new(None),
        }
    }

    /// Queries this short (after trimming) never reach the service
    pub fn is_searchable(&self, query: &str) -> bool {
        query.trim().chars().count() >= self.min_query_len
    }

    /// Schedule `run(query)` after the quiet period, cancelling any pending one
    pub async fn submit<F, Fut>(&self, query: String, run: F)
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.parent.child_token();
        if let Some(previous) = self.pending.lock().await.replace(token.clone()) {
            previous.cancel();
        }
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(query = %query, "Search superseded before firing");
                }
                _ = tokio::time::sleep(delay) => {
                    run(query).await;
                }
            }
        });
    }

    /// Drop the pending timer, if any
    pub async fn cancel(&self) {
        if let Some(pending) = self.pending.lock().await.take() {
            pending.cancel();
        }
    }
}
