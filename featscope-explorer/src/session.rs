//! Browsing sessions
//!
//! A session is one browser page: it exclusively owns the registry of
//! expanded features, the visit history, the search box state and the
//! similarity graph. Views never mutate it directly; they call the methods
//! here and observe immutable snapshots published through a watch channel.
//!
//! Fetches run without holding the state lock, so the user can overlap
//! requests. Whichever completion commits last wins. A failed fetch commits
//! nothing. Closing a session cancels its token: fetches still in flight are
//! abandoned and nothing commits afterwards.
//!
//! Sessions without a live event stream that see no request for the
//! configured idle period are evicted by [`spawn_idle_reaper`].

use featscope_common::config::{SearchConfig, TomlConfig};
use featscope_common::events::{EventBus, ExplorerEvent};
use featscope_common::types::{EffectSample, SearchHit};
use featscope_common::FeatureId;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::FeatureSource;
use crate::error::{ExploreError, Result};
use crate::expansion::{ExpandOutcome, ExpandPlan, ExpandedFeature, ExpandedFeatureRegistry};
use crate::filter::fetch_filtered_effects;
use crate::graph::SimilarityGraph;
use crate::history::History;
use crate::search::SearchDebouncer;
use crate::viewer::EmbedViewer;

/// Behaviour knobs shared by all sessions
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub effect_cap: usize,
    pub discard_stale: bool,
    pub search: SearchConfig,
    pub viewer: EmbedViewer,
}

impl SessionSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            effect_cap: config.expansion.effect_cap,
            discard_stale: config.expansion.discard_stale,
            search: config.search.clone(),
            viewer: EmbedViewer::new(&config.viewer),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

/// The feature shown in the side panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentFeature {
    pub feature: FeatureId,
    pub description: String,
    /// Similarity lookup result; `None` when the lookup failed
    pub similar: Option<EffectSample>,
    pub embed_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<SearchHit>,
}

/// Everything a view can render, as of one revision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub revision: u64,
    pub current: Option<CurrentFeature>,
    pub expanded: ExpandedFeatureRegistry,
    pub history: History,
    pub search: SearchState,
    pub graph: SimilarityGraph,
}

impl SessionState {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            revision: 0,
            current: None,
            expanded: ExpandedFeatureRegistry::new(),
            history: History::new(),
            search: SearchState::default(),
            graph: SimilarityGraph::new(),
        }
    }
}

/// Immutable view of a session
pub type Snapshot = Arc<SessionState>;

pub struct Session {
    id: Uuid,
    source: Arc<dyn FeatureSource>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<Snapshot>,
    events: EventBus,
    /// Cancelled when the session is closed
    cancel: CancellationToken,
    last_active: Mutex<Instant>,
    debouncer: SearchDebouncer,
}

impl Session {
    pub fn new(source: Arc<dyn FeatureSource>, settings: SessionSettings, events: EventBus) -> Arc<Self> {
        let id = Uuid::new_v4();
        let state = SessionState::new(id);
        let (snapshots, _) = watch::channel(Arc::new(state.clone()));
        let cancel = CancellationToken::new();
        let debouncer = SearchDebouncer::new(&settings.search, cancel.clone());

        events.emit_lossy(ExplorerEvent::SessionOpened {
            session_id: id,
            timestamp: chrono::Utc::now(),
        });

        Arc::new(Self {
            id,
            source,
            settings,
            state: Mutex::new(state),
            snapshots,
            events,
            cancel,
            last_active: Mutex::new(Instant::now()),
            debouncer,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record that the page used the session just now
    pub async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    /// Time since the last request or commit
    pub async fn idle_for(&self) -> Duration {
        self.last_active.lock().await.elapsed()
    }

    /// Whether an event stream is currently attached
    pub fn has_subscribers(&self) -> bool {
        self.snapshots.receiver_count() > 0
    }

    /// Run `fut` unless the session is closed first
    async fn unless_closed<T>(&self, fut: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(session = %self.id, "Abandoning fetch for closed session");
                Err(ExploreError::SessionClosed(self.id))
            }
            out = fut => Ok(out),
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Observe every future snapshot (the current one is marked seen-able)
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Apply a mutation and publish the resulting snapshot
    async fn commit<R>(
        &self,
        mutate: impl FnOnce(&mut SessionState) -> Result<R>,
    ) -> Result<(R, Snapshot)> {
        if self.is_closed() {
            debug!(session = %self.id, "Dropping completion for closed session");
            return Err(ExploreError::SessionClosed(self.id));
        }

        let mut state = self.state.lock().await;
        let result = mutate(&mut state)?;
        state.revision += 1;
        let snapshot = Arc::new(state.clone());
        drop(state);

        self.touch().await;
        self.snapshots.send_replace(Arc::clone(&snapshot));
        Ok((result, snapshot))
    }

    async fn fetch_description(&self, feature: FeatureId) -> String {
        match self.source.descriptions(&[feature]).await {
            Ok(mut map) => map.remove(&feature).unwrap_or_default(),
            Err(e) => {
                warn!(feature, error = %e, "Description lookup failed");
                String::new()
            }
        }
    }

    fn report_expansion_failure(&self, feature: FeatureId, err: &ExploreError) {
        error!(session = %self.id, feature, error = %err, "Expansion failed");
        self.events.emit_lossy(ExplorerEvent::ExpansionFailed {
            session_id: self.id,
            feature,
            message: err.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Make `feature` the current feature
    ///
    /// Similarity and description are fetched concurrently; either failing
    /// degrades (no similarity data, empty description) instead of aborting.
    pub async fn look_up(&self, feature: FeatureId) -> Result<Snapshot> {
        let (similar, description) = self
            .unless_closed(async {
                tokio::join!(self.source.similar(feature), self.fetch_description(feature))
            })
            .await?;

        let similar = similar
            .inspect_err(|e| warn!(feature, error = %e, "Similarity lookup failed"))
            .ok();
        let embed_url = self.settings.viewer.url(feature);

        let ((), snapshot) = self
            .commit(|state| {
                if let Some(sample) = &similar {
                    if let Err(e) = state.graph.merge(feature, sample) {
                        debug!(error = %e, "Similarity graph unchanged");
                    }
                }
                state.history.visit(feature, description.clone());
                state.current = Some(CurrentFeature {
                    feature,
                    description,
                    similar,
                    embed_url,
                });
                Ok(())
            })
            .await?;

        info!(session = %self.id, feature, "Feature looked up");
        self.events.emit_lossy(ExplorerEvent::FeatureLookedUp {
            session_id: self.id,
            feature,
            timestamp: chrono::Utc::now(),
        });
        Ok(snapshot)
    }

    /// Inspect `feature` (the current feature when `None`)
    ///
    /// Computes a fresh first row and moves the feature to the front of the
    /// registry, replacing any earlier drill-down of it.
    pub async fn inspect(&self, feature: Option<FeatureId>) -> Result<Snapshot> {
        let known = {
            let state = self.state.lock().await;
            let current = state.current.as_ref();
            let feature = feature
                .or(current.map(|c| c.feature))
                .ok_or(ExploreError::NoCurrentFeature)?;
            let description = current
                .filter(|c| c.feature == feature)
                .map(|c| c.description.clone())
                .or_else(|| state.expanded.get(feature).map(|e| e.description.clone()));
            (feature, description)
        };

        let (feature, description) = match known {
            (feature, Some(description)) => (feature, description),
            (feature, None) => (
                feature,
                self.unless_closed(self.fetch_description(feature)).await?,
            ),
        };

        let entry = match self
            .unless_closed(ExpandedFeature::fetch(
                self.source.as_ref(),
                feature,
                description,
                self.settings.effect_cap,
            ))
            .await?
        {
            Ok(entry) => entry,
            Err(e) => {
                let err = ExploreError::from(e);
                self.report_expansion_failure(feature, &err);
                return Err(err);
            }
        };
        let effect_count = entry.rows()[0].len();

        let ((), snapshot) = self
            .commit(|state| {
                state.expanded.promote(entry);
                Ok(())
            })
            .await?;

        info!(session = %self.id, feature, effect_count, "Feature inspected");
        self.events.emit_lossy(ExplorerEvent::FeatureInspected {
            session_id: self.id,
            feature,
            effect_count,
            timestamp: chrono::Utc::now(),
        });
        Ok(snapshot)
    }

    /// Click element `element` of row `row` in the drill-down of `feature`
    pub async fn expand(
        &self,
        feature: FeatureId,
        row: usize,
        element: usize,
    ) -> Result<(ExpandOutcome, Snapshot)> {
        let (plan, revision) = {
            let mut state = self.state.lock().await;
            let entry = state.expanded.require_mut(feature)?;
            (entry.plan_expand(row, element)?, entry.revision())
        };

        let (outcome, snapshot) = match plan {
            ExpandPlan::Collapse => {
                self.commit(|state| Ok(state.expanded.require_mut(feature)?.collapse(row)?))
                    .await?
            }
            ExpandPlan::Fetch { child } => {
                let child_row = match self
                    .unless_closed(fetch_filtered_effects(
                        self.source.as_ref(),
                        child,
                        self.settings.effect_cap,
                    ))
                    .await?
                {
                    Ok(set) => set,
                    Err(e) => {
                        let err = ExploreError::from(e);
                        self.report_expansion_failure(child, &err);
                        return Err(err);
                    }
                };

                let discard_stale = self.settings.discard_stale;
                self.commit(|state| {
                    let entry = state.expanded.require_mut(feature)?;
                    if discard_stale && entry.revision() != revision {
                        return Err(ExploreError::Superseded(feature));
                    }
                    Ok(entry.apply_child(row, element, child, child_row)?)
                })
                .await?
            }
        };

        let depth = match outcome {
            ExpandOutcome::Collapsed { depth } | ExpandOutcome::Expanded { depth, .. } => depth,
        };
        debug!(session = %self.id, feature, row, element, depth, "Drill-down changed");
        self.events.emit_lossy(ExplorerEvent::RowsChanged {
            session_id: self.id,
            feature,
            depth,
            timestamp: chrono::Utc::now(),
        });
        Ok((outcome, snapshot))
    }

    /// Record a keystroke in the search box
    ///
    /// The query text is published immediately; the service is queried only
    /// after the debounce delay, and only for long enough queries.
    pub async fn type_search(self: &Arc<Self>, query: String) -> Result<Snapshot> {
        let text = query.clone();
        let ((), snapshot) = self
            .commit(|state| {
                state.search.query = text;
                Ok(())
            })
            .await?;

        let session = Arc::clone(self);
        self.debouncer
            .submit(query, move |query| async move { session.run_search(query).await })
            .await;

        Ok(snapshot)
    }

    async fn run_search(&self, query: String) {
        let results = if self.debouncer.is_searchable(&query) {
            let Ok(found) = self.unless_closed(self.source.search(&query)).await else {
                return;
            };
            match found {
                Ok(mut hits) => {
                    hits.truncate(self.settings.search.max_results);
                    hits
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let result_count = results.len();

        let committed = self
            .commit(|state| {
                state.search.results = results;
                Ok(())
            })
            .await;

        if committed.is_ok() {
            self.events.emit_lossy(ExplorerEvent::SearchCompleted {
                session_id: self.id,
                query,
                result_count,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Hide search results (search box lost focus or a result was picked)
    ///
    /// A search still waiting out its debounce delay is dropped as well.
    pub async fn clear_search(&self) -> Result<Snapshot> {
        self.debouncer.cancel().await;
        let ((), snapshot) = self
            .commit(|state| {
                state.search.results.clear();
                Ok(())
            })
            .await?;
        Ok(snapshot)
    }

    /// Start a fresh similarity graph
    pub async fn reset_graph(&self) -> Result<Snapshot> {
        let ((), snapshot) = self
            .commit(|state| {
                state.graph = SimilarityGraph::new();
                Ok(())
            })
            .await?;
        Ok(snapshot)
    }

    /// Dispose the session; in-flight fetches and pending searches are cancelled
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        info!(session = %self.id, "Session closed");
        self.events.emit_lossy(ExplorerEvent::SessionClosed {
            session_id: self.id,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// All open sessions, keyed by id
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<Session>) {
        self.sessions.write().await.insert(session.id(), session);
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: Uuid) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ExploreError::SessionNotFound(id))?;
        session.touch().await;
        Ok(session)
    }

    /// Remove and close a session
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(ExploreError::SessionNotFound(id))?;
        session.close();
        Ok(())
    }

    /// Close and remove sessions idle for at least `max_idle` with no event stream attached
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<Uuid> {
        let candidates: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut stale = Vec::new();
        for session in candidates {
            if !session.has_subscribers() && session.idle_for().await >= max_idle {
                stale.push(session.id());
            }
        }

        if !stale.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &stale {
                if let Some(session) = sessions.remove(id) {
                    session.close();
                }
            }
            info!(evicted = stale.len(), "Evicted idle sessions");
        }
        stale
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Periodically evict idle sessions until `shutdown` is cancelled
pub fn spawn_idle_reaper(
    store: Arc<SessionStore>,
    max_idle: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let period = max_idle.min(Duration::from_secs(60));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Idle session reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    store.evict_idle(max_idle).await;
                }
            }
        }
    })
}
