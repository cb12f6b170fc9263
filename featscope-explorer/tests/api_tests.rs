//! Integration tests for featscope-explorer API endpoints
//!
//! The Feature Data Service is replaced by an in-memory fake so every
//! request runs through the real router, sessions and expansion model.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use featscope_common::events::EventBus;
use featscope_common::types::{EffectSample, SearchHit};
use featscope_common::FeatureId;
use featscope_explorer::client::{ClientError, FeatureSource};
use featscope_explorer::session::{Session, SessionSettings};
use featscope_explorer::{build_router, AppState, ExploreError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tower::util::ServiceExt; // for `oneshot` method

// =============================================================================
// Fake Feature Data Service
// =============================================================================

/// Holds a top-effects fetch in flight until the test releases it
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct FakeService {
    similar: HashMap<FeatureId, EffectSample>,
    effects: HashMap<FeatureId, EffectSample>,
    descriptions: HashMap<FeatureId, String>,
    hits: Vec<SearchHit>,
    searches: Mutex<Vec<String>>,
    gates: HashMap<FeatureId, Arc<Gate>>,
}

#[async_trait]
impl FeatureSource for FakeService {
    async fn similar(&self, feature: FeatureId) -> Result<EffectSample, ClientError> {
        self.similar
            .get(&feature)
            .cloned()
            .ok_or_else(|| ClientError::Status(404, format!("no similarity for {}", feature)))
    }

    async fn top_effects(&self, feature: FeatureId) -> Result<EffectSample, ClientError> {
        if let Some(gate) = self.gates.get(&feature) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.effects
            .get(&feature)
            .cloned()
            .ok_or_else(|| ClientError::Status(500, format!("no effects for {}", feature)))
    }

    async fn descriptions(
        &self,
        keys: &[FeatureId],
    ) -> Result<HashMap<FeatureId, String>, ClientError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.descriptions.get(k).map(|d| (*k, d.clone())))
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
        self.searches.lock().unwrap().push(query.to_string());
        Ok(self.hits.clone())
    }
}

/// Feature 123 with a small effect tree below it; feature 3 has no effects
fn base_service() -> FakeService {
    let mut service = FakeService::default();

    service
        .similar
        .insert(123, EffectSample::new(vec![123, 7, 8], vec![1.0, 0.9, 0.5]));
    service
        .similar
        .insert(7, EffectSample::new(vec![7, 123], vec![1.0, 0.9]));

    service.effects.insert(
        123,
        EffectSample::new(vec![5, 1, 2, 3], vec![0.5, 0.0, 0.25, 0.25]),
    );
    service
        .effects
        .insert(7, EffectSample::new(vec![8], vec![0.3]));
    service
        .effects
        .insert(5, EffectSample::new(vec![10, 11], vec![0.75, 0.25]));
    service
        .effects
        .insert(2, EffectSample::new(vec![12], vec![0.1]));

    for (id, text) in [
        (123, "cats and kittens"),
        (7, "dogs"),
        (5, "whiskers"),
        (2, "paws"),
        (3, "tails"),
        (10, "fur"),
    ] {
        service.descriptions.insert(id, text.to_string());
    }

    service.hits = vec![
        SearchHit("cats and kittens".to_string(), 123),
        SearchHit("cat food".to_string(), 44),
    ];

    service
}

fn fake_service() -> Arc<FakeService> {
    Arc::new(base_service())
}

/// Base service whose top-effects fetch for `feature` waits on the returned gate
fn gated_service(feature: FeatureId) -> (FakeService, Arc<Gate>) {
    let gate = Arc::new(Gate::default());
    let mut service = base_service();
    service.gates.insert(feature, Arc::clone(&gate));
    (service, gate)
}

// =============================================================================
// Helpers
// =============================================================================

fn setup_app(service: Arc<FakeService>) -> Router {
    setup_app_with(service, SessionSettings::default())
}

fn setup_app_with(service: Arc<FakeService>, settings: SessionSettings) -> Router {
    let state = AppState::new(service, settings);
    build_router(state)
}

/// Start an expand request that runs until its gated fetch is released
fn spawn_expand(
    app: &Router,
    id: &str,
    row: usize,
    element: usize,
) -> tokio::task::JoinHandle<(StatusCode, Value)> {
    let app = app.clone();
    let uri = format!("/api/sessions/{}/expand", id);
    tokio::spawn(async move {
        send(
            &app,
            "POST",
            &uri,
            Some(json!({ "feature": 123, "row": row, "element": element })),
        )
        .await
    })
}

fn rows_of(snapshot: &Value) -> Vec<Vec<u64>> {
    snapshot["expanded"][0]["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(indices)
        .collect()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, json)
}

async fn open_session(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

fn indices(row: &Value) -> Vec<u64> {
    row["indices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect()
}

fn expanded_order(snapshot: &Value) -> Vec<u64> {
    snapshot["expanded"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["feature"].as_u64().unwrap())
        .collect()
}

// =============================================================================
// Health and static assets
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(fake_service());
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "featscope-explorer");
}

#[tokio::test]
async fn test_index_page_is_served() {
    let app = setup_app(fake_service());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/static/app.js"));
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_session_lifecycle() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    let (status, body) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], id.as_str());
    assert_eq!(body["revision"], 0);
    assert!(body["current"].is_null());
    assert_eq!(body["expanded"], json!([]));

    let (status, _) = send(&app, "DELETE", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Session not found"));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = setup_app(fake_service());
    let uri = format!("/api/sessions/{}/feature", uuid::Uuid::new_v4());

    let (status, _) = send(&app, "PUT", &uri, Some(json!({ "feature": 123 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_stream_opens_for_known_session() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/sessions/{}/events", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
}

// =============================================================================
// Feature lookup and history
// =============================================================================

#[tokio::test]
async fn test_look_up_sets_current_feature() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/feature", id),
        Some(json!({ "feature": 123 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["feature"], 123);
    assert_eq!(body["current"]["description"], "cats and kittens");
    assert_eq!(body["current"]["similar"]["indices"], json!([123, 7, 8]));
    assert_eq!(
        body["current"]["embed_url"],
        "https://neuronpedia.org/gemma-2b/6-res-jb/123?embed=true"
    );
    assert_eq!(body["history"][0]["feature"], 123);
}

#[tokio::test]
async fn test_look_up_degrades_when_service_knows_nothing() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/feature", id),
        Some(json!({ "feature": 999 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["feature"], 999);
    assert_eq!(body["current"]["description"], "");
    assert!(body["current"]["similar"].is_null());
}

#[tokio::test]
async fn test_revisit_moves_feature_to_end_of_history() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;
    let uri = format!("/api/sessions/{}/feature", id);

    send(&app, "PUT", &uri, Some(json!({ "feature": 123 }))).await;
    send(&app, "PUT", &uri, Some(json!({ "feature": 7 }))).await;
    let (_, body) = send(&app, "PUT", &uri, Some(json!({ "feature": 123 }))).await;

    let visited: Vec<u64> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["feature"].as_u64().unwrap())
        .collect();
    assert_eq!(visited, vec![7, 123]);
}

#[tokio::test]
async fn test_similarity_graph_accumulates_and_resets() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;
    let uri = format!("/api/sessions/{}/feature", id);
    let graph_uri = format!("/api/sessions/{}/graph", id);

    send(&app, "PUT", &uri, Some(json!({ "feature": 123 }))).await;
    send(&app, "PUT", &uri, Some(json!({ "feature": 7 }))).await;

    let (status, graph) = send(&app, "GET", &graph_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(graph["links"].as_array().unwrap().len(), 3);
    assert_eq!(graph["nodes"][0]["name"], "Feature 123");

    let (status, body) = send(&app, "DELETE", &graph_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["graph"]["nodes"], json!([]));
}

// =============================================================================
// Inspect and drill-down
// =============================================================================

#[tokio::test]
async fn test_enter_then_inspect_feature_123() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/feature", id),
        Some(json!({ "feature": 123 })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(expanded_order(&body), vec![123]);

    let entry = &body["expanded"][0];
    assert_eq!(entry["description"], "cats and kittens");
    assert_eq!(entry["rows"].as_array().unwrap().len(), 1);
    assert_eq!(indices(&entry["rows"][0]), vec![5, 2, 3]);
    assert_eq!(entry["rows"][0]["values"], json!([0.5, 0.25, 0.25]));
    assert_eq!(
        entry["rows"][0]["descriptions"],
        json!(["whiskers", "paws", "tails"])
    );
}

#[tokio::test]
async fn test_inspect_without_body_uses_current_feature() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/feature", id),
        Some(json!({ "feature": 7 })),
    )
    .await;
    let (status, body) = send(&app, "POST", &format!("/api/sessions/{}/inspect", id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(expanded_order(&body), vec![7]);
}

#[tokio::test]
async fn test_inspect_without_current_feature_is_rejected() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_reinspect_promotes_to_front_without_duplicates() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;
    let uri = format!("/api/sessions/{}/inspect", id);

    send(&app, "POST", &uri, Some(json!({ "feature": 123 }))).await;
    let (_, body) = send(&app, "POST", &uri, Some(json!({ "feature": 7 }))).await;
    assert_eq!(expanded_order(&body), vec![7, 123]);

    let (_, body) = send(&app, "POST", &uri, Some(json!({ "feature": 123 }))).await;
    assert_eq!(expanded_order(&body), vec![123, 7]);
}

#[tokio::test]
async fn test_inspect_failure_leaves_registry_untouched() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("500"));

    let (_, snapshot) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(snapshot["expanded"], json!([]));
}

#[tokio::test]
async fn test_expand_collapse_and_switch_sibling() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;
    let expand_uri = format!("/api/sessions/{}/expand", id);

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 123 })),
    )
    .await;

    // Expand feature 5 (row 0, element 0)
    let (status, body) = send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "expanded");
    assert_eq!(body["child"], 5);
    assert_eq!(body["depth"], 2);
    let entry = &body["snapshot"]["expanded"][0];
    assert_eq!(indices(&entry["rows"][1]), vec![10, 11]);
    assert_eq!(entry["rows"][1]["descriptions"], json!(["fur", ""]));
    assert_eq!(entry["selections"], json!([0]));

    // Same element again collapses
    let (_, body) = send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 0 })),
    )
    .await;
    assert_eq!(body["outcome"], "collapsed");
    assert_eq!(body["depth"], 1);
    assert_eq!(body["snapshot"]["expanded"][0]["selections"], json!([]));

    // Expand 5 again, then switch to its sibling 2; the deeper row is replaced
    send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 0 })),
    )
    .await;
    let (status, body) = send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["child"], 2);
    assert_eq!(body["depth"], 2);
    let entry = &body["snapshot"]["expanded"][0];
    assert_eq!(indices(&entry["rows"][1]), vec![12]);
    assert_eq!(entry["selections"], json!([1]));
}

#[tokio::test]
async fn test_failed_expansion_changes_nothing() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 123 })),
    )
    .await;
    let (_, before) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;

    // Element 2 of row 0 is feature 3, which has no effects
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/expand", id),
        Some(json!({ "feature": 123, "row": 0, "element": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, after) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_invalid_expand_requests() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;
    let expand_uri = format!("/api/sessions/{}/expand", id);

    let (status, _) = send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 123 })),
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 1, "element": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// Overlapping expansions
// =============================================================================

#[tokio::test]
async fn test_late_child_for_replaced_bar_is_rejected() {
    let (mut service, gate) = gated_service(10);
    service
        .effects
        .insert(10, EffectSample::new(vec![900], vec![0.9]));
    let app = setup_app(Arc::new(service));
    let id = open_session(&app).await;
    let expand_uri = format!("/api/sessions/{}/expand", id);

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 123 })),
    )
    .await;
    send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 0 })),
    )
    .await;

    // Feature 10 (row 1, element 0) is fetched slowly...
    let slow = spawn_expand(&app, &id, 1, 0);
    gate.entered.notified().await;

    // ...while row 1 is replaced by the expansion of feature 2
    let (status, _) = send(
        &app,
        "POST",
        &expand_uri,
        Some(json!({ "feature": 123, "row": 0, "element": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    gate.release.notify_one();
    let (status, body) = slow.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("is now 12, not 10"));

    let (_, snapshot) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(rows_of(&snapshot), vec![vec![5, 2, 3], vec![12]]);
    assert_eq!(snapshot["expanded"][0]["selections"], json!([1]));
}

#[tokio::test]
async fn test_overlapping_expansions_last_commit_wins_by_default() {
    let (service, gate) = gated_service(5);
    let app = setup_app(Arc::new(service));
    let id = open_session(&app).await;

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 123 })),
    )
    .await;

    let slow = spawn_expand(&app, &id, 0, 0);
    gate.entered.notified().await;
    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/expand", id),
        Some(json!({ "feature": 123, "row": 0, "element": 1 })),
    )
    .await;

    gate.release.notify_one();
    let (status, body) = slow.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["child"], 5);
    assert_eq!(rows_of(&body["snapshot"]), vec![vec![5, 2, 3], vec![10, 11]]);
    assert_eq!(body["snapshot"]["expanded"][0]["selections"], json!([0]));
}

#[tokio::test]
async fn test_discard_stale_rejects_superseded_expansion() {
    let (service, gate) = gated_service(5);
    let settings = SessionSettings {
        discard_stale: true,
        ..SessionSettings::default()
    };
    let app = setup_app_with(Arc::new(service), settings);
    let id = open_session(&app).await;

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 123 })),
    )
    .await;

    let slow = spawn_expand(&app, &id, 0, 0);
    gate.entered.notified().await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/expand", id),
        Some(json!({ "feature": 123, "row": 0, "element": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, before) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;

    gate.release.notify_one();
    let (status, body) = slow.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("superseded"));

    let (_, after) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(before, after);
    assert_eq!(rows_of(&after), vec![vec![5, 2, 3], vec![12]]);
}

#[tokio::test]
async fn test_closing_session_abandons_in_flight_fetch() {
    let (service, gate) = gated_service(123);
    let service = Arc::new(service);
    let session = Session::new(service, SessionSettings::default(), EventBus::new(16));

    let inspecting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.inspect(Some(123)).await })
    };
    gate.entered.notified().await;
    session.close();

    // The fetch is never released; cancellation alone ends the request
    let err = inspecting.await.unwrap().unwrap_err();
    assert!(matches!(err, ExploreError::SessionClosed(_)));
    assert!(session.snapshot().expanded.is_empty());
}

// =============================================================================
// Layout, connector and viewer
// =============================================================================

#[tokio::test]
async fn test_layout_in_both_modes() {
    let app = setup_app(fake_service());
    let id = open_session(&app).await;

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/inspect", id),
        Some(json!({ "feature": 123 })),
    )
    .await;
    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/expand", id),
        Some(json!({ "feature": 123, "row": 0, "element": 0 })),
    )
    .await;

    let (status, bars) = send(
        &app,
        "GET",
        &format!("/api/sessions/{}/expanded/123/layout", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bars["mode"], "bars");
    assert!(bars["root"].is_null());
    let sizes: Vec<f64> = bars["rows"][0]["elements"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["size"].as_f64().unwrap())
        .collect();
    assert_eq!(sizes, vec![50.0, 25.0, 25.0]);
    assert_eq!(bars["rows"][0]["elements"][0]["selected"], true);
    assert_eq!(bars["rows"][1]["elements"][0]["size"], 75.0);

    let (_, sankey) = send(
        &app,
        "GET",
        &format!("/api/sessions/{}/expanded/123/layout?mode=sankey", id),
        None,
    )
    .await;
    assert_eq!(sankey["mode"], "sankey");
    assert_eq!(sankey["root"]["size"], 600.0);
    assert_eq!(sankey["rows"][0]["elements"][0]["size"], 300.0);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/sessions/{}/expanded/7/layout", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connector_path() {
    let app = setup_app(fake_service());

    let (status, body) = send(
        &app,
        "POST",
        "/api/connector",
        Some(json!({
            "parent": { "left": 10.0, "top": 0.0, "right": 30.0, "bottom": 20.0 },
            "child": { "left": 0.0, "top": 40.0, "right": 100.0, "bottom": 60.0 }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["path"],
        "M 10,20 C 10,31 0,31 0,42 L 100,42 C 100,31 30,31 30,20 Z"
    );
    assert_eq!(body["connector"]["mid_y"], 31.0);
}

#[tokio::test]
async fn test_connector_relative_to_container() {
    let app = setup_app(fake_service());

    let (_, body) = send(
        &app,
        "POST",
        "/api/connector",
        Some(json!({
            "parent": { "left": 110.0, "top": 100.0, "right": 130.0, "bottom": 120.0 },
            "child": { "left": 100.0, "top": 140.0, "right": 200.0, "bottom": 160.0 },
            "container": { "left": 100.0, "top": 100.0, "right": 300.0, "bottom": 300.0 }
        })),
    )
    .await;

    assert_eq!(
        body["path"],
        "M 10,20 C 10,31 0,31 0,42 L 100,42 C 100,31 30,31 30,20 Z"
    );
}

#[tokio::test]
async fn test_viewer_url() {
    let app = setup_app(fake_service());
    let (status, body) = send(&app, "GET", "/api/viewer/42", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feature"], 42);
    assert_eq!(body["url"], "https://neuronpedia.org/gemma-2b/6-res-jb/42?embed=true");
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_rapid_typing_sends_one_search() {
    let service = fake_service();
    let app = setup_app(service.clone());
    let id = open_session(&app).await;
    let uri = format!("/api/sessions/{}/search", id);

    let (status, body) = send(&app, "PUT", &uri, Some(json!({ "query": "cat" }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["search"]["query"], "cat");

    tokio::time::sleep(Duration::from_millis(100)).await;
    send(&app, "PUT", &uri, Some(json!({ "query": "cats" }))).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(*service.searches.lock().unwrap(), vec!["cats".to_string()]);

    let (_, snapshot) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(snapshot["search"]["query"], "cats");
    assert_eq!(
        snapshot["search"]["results"],
        json!([["cats and kittens", 123], ["cat food", 44]])
    );

    let (_, cleared) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(cleared["search"]["results"], json!([]));
}

#[tokio::test(start_paused = true)]
async fn test_single_character_query_is_not_sent() {
    let service = fake_service();
    let app = setup_app(service.clone());
    let id = open_session(&app).await;

    send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/search", id),
        Some(json!({ "query": "c" })),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(service.searches.lock().unwrap().is_empty());
    let (_, snapshot) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(snapshot["search"]["results"], json!([]));
}

// =============================================================================
// Session disposal
// =============================================================================

#[tokio::test]
async fn test_closed_session_ignores_completions() {
    let session = Session::new(fake_service(), SessionSettings::default(), EventBus::new(16));
    session.look_up(123).await.unwrap();
    let before = session.snapshot();

    session.close();
    session.close();

    let err = session.inspect(None).await.unwrap_err();
    assert!(matches!(err, ExploreError::SessionClosed(_)));
    assert_eq!(session.snapshot(), before);
    assert!(session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_search() {
    let service = fake_service();
    let session = Session::new(service.clone(), SessionSettings::default(), EventBus::new(16));

    session.type_search("cats".to_string()).await.unwrap();
    session.close();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(service.searches.lock().unwrap().is_empty());
}
