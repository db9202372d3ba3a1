use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use podwatch_daemon::api::create_router;
use podwatch_daemon::api::rest::state::AppState;
use podwatch_daemon::Scheduler;
use podwatch_reconciler::{
    DebugOverride, InMemoryPlatform, InMemoryStateManager, Reconciler, ReconcilerConfig,
    ReconcilerMetrics,
};
use podwatch_types::{RunPhase, RunState, StateData, WorkflowId, WorkflowInstance};
use prometheus::Registry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    platform: Arc<InMemoryPlatform>,
    states: Arc<InMemoryStateManager>,
    debug: DebugOverride,
    scheduler: Arc<Scheduler>,
    reconcile_rx: tokio::sync::mpsc::Receiver<()>,
}

fn app() -> TestApp {
    let platform = Arc::new(InMemoryPlatform::new("workflows"));
    let states = Arc::new(InMemoryStateManager::new());
    let debug = DebugOverride::default();
    let registry = Registry::new_custom(Some("podwatch".to_string()), None).unwrap();
    let metrics = Arc::new(ReconcilerMetrics::new(&registry));

    let reconciler = Reconciler::new(
        ReconcilerConfig::default(),
        platform.clone(),
        states.clone(),
        debug.clone(),
    )
    .with_metrics(metrics);
    let (scheduler, reconcile_rx) =
        Scheduler::new(Duration::from_secs(60), Arc::new(reconciler));

    let state = AppState::new(
        states.clone(),
        scheduler.clone(),
        debug.clone(),
        registry,
        "workflows",
    );

    TestApp {
        router: create_router(state, false),
        platform,
        states,
        debug,
        scheduler,
        reconcile_rx,
    }
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn call_json(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = call(router, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn instance(parameter: &str) -> WorkflowInstance {
    WorkflowInstance::new(WorkflowId::new("styx", "daily").unwrap(), parameter).unwrap()
}

fn running(parameter: &str, execution_id: &str) -> RunState {
    RunState::new(
        instance(parameter),
        RunPhase::Running,
        StateData::default().with_execution_id(execution_id),
    )
}

#[tokio::test]
async fn health_reports_version() {
    let app = app();
    let (status, body) = call_json(&app.router, Method::GET, "/api/v1/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn debug_override_round_trip() {
    let app = app();

    let (_, body) = call_json(&app.router, Method::GET, "/api/v1/debug", None).await;
    assert_eq!(body["enabled"], false);

    let (status, body) = call_json(
        &app.router,
        Method::PUT,
        "/api/v1/debug",
        Some(json!({ "enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "enabled": true, "previous": false }));
    assert!(app.debug.get());
}

#[tokio::test]
async fn instances_can_be_published_and_closed() {
    let app = app();
    let state = serde_json::to_value(running("2016-05-01", "eid1")).unwrap();

    let (status, _) = call_json(&app.router, Method::PUT, "/api/v1/instances", Some(state)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call_json(&app.router, Method::GET, "/api/v1/instances", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["phase"], "RUNNING");

    let key = "styx%23daily%232016-05-01";
    let (status, body) = call_json(
        &app.router,
        Method::DELETE,
        &format!("/api/v1/instances/{key}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["closed"], true);
    assert!(app.states.states().await.is_empty());

    let (status, body) = call_json(
        &app.router,
        Method::DELETE,
        &format!("/api/v1/instances/{key}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_instance_key_is_rejected() {
    let app = app();
    let (status, body) =
        call_json(&app.router, Method::DELETE, "/api/v1/instances/no-separator", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn closed_phase_cannot_be_published() {
    let app = app();
    let state = serde_json::to_value(RunState::new(
        instance("x"),
        RunPhase::Done,
        StateData::default(),
    ))
    .unwrap();

    let (status, _) = call_json(&app.router, Method::PUT, "/api/v1/instances", Some(state)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn identity_that_cannot_round_trip_is_rejected() {
    let app = app();
    let mut state = serde_json::to_value(running("2016-05-01", "eid1")).unwrap();
    state["instance"]["workflow_id"]["component_id"] = json!("styx#daily");
    state["instance"]["parameter"] = json!("run#1");

    let (status, body) =
        call_json(&app.router, Method::PUT, "/api/v1/instances", Some(state)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(app.states.states().await.is_empty());

    let request = json!({
        "instance": {
            "workflow_id": { "component_id": "styx", "id": "daily" },
            "parameter": "run#1"
        },
        "run_spec": { "execution_id": "eid1", "image": "busybox:1.36" }
    });
    let (status, body) =
        call_json(&app.router, Method::POST, "/api/v1/manifests", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn manifest_with_reserved_volume_name_is_rejected() {
    let app = app();
    let request = json!({
        "instance": serde_json::to_value(instance("2016-05-01")).unwrap(),
        "run_spec": { "execution_id": "eid1", "image": "busybox:1.36" },
        "secrets": {
            "custom_secret": { "name": "service-account-key", "mount_path": "/etc/custom" },
            "service_account_secret": "sa-key-1"
        }
    });

    let (status, body) =
        call_json(&app.router, Method::POST, "/api/v1/manifests", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn trigger_is_accepted_and_coalesced() {
    let app = app();

    let (status, body) = call_json(&app.router, Method::POST, "/api/v1/reconcile", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["triggered"], true);

    let (_, body) = call_json(&app.router, Method::POST, "/api/v1/reconcile", None).await;
    assert_eq!(body["triggered"], false);
}

#[tokio::test]
async fn cycle_results_show_in_events_status_and_metrics() {
    let app = app();
    app.states.upsert(running("2016-05-01", "eid1")).await;
    assert!(!app.platform.contains("eid1").await);

    // The first tick runs a cycle as soon as the loop starts.
    let scheduler = app.scheduler.clone();
    let handle = tokio::spawn(scheduler.clone().start(app.reconcile_rx));
    for _ in 0..100 {
        if scheduler.last_cycle().await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    scheduler.stop().await;
    handle.abort();

    let (_, events) = call_json(&app.router, Method::GET, "/api/v1/events?limit=5", None).await;
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"]["type"], "run_error");
    assert_eq!(
        events[0]["event"]["message"],
        "No pod associated with this instance"
    );
    assert_eq!(events[0]["delivery"], "Applied");

    let (_, status) = call_json(&app.router, Method::GET, "/api/v1/status", None).await;
    assert_eq!(status["namespace"], "workflows");
    assert_eq!(status["last_cycle"]["report"]["missing"]["applied"], 1);

    let (status, bytes) = call(&app.router, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("podwatch_run_errors_total{delivery=\"applied\"} 1"));
}

#[tokio::test]
async fn manifest_is_rendered_without_launching() {
    let app = app();
    let request = json!({
        "instance": serde_json::to_value(instance("2016-05-01")).unwrap(),
        "run_spec": { "execution_id": "eid1", "image": "busybox:1.36", "args": ["echo", "hi"] }
    });

    let (status, body) =
        call_json(&app.router, Method::POST, "/api/v1/manifests", Some(request)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "Pod");
    assert_eq!(body["metadata"]["name"], "eid1");
    assert_eq!(
        body["metadata"]["annotations"]["podwatch-workflow-instance"],
        "styx#daily#2016-05-01"
    );
    assert!(app.platform.containers().await.is_empty());
}
