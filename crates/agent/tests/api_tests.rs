//! Integration tests for the agent API endpoints

#[path = "../src/api.rs"]
#[allow(dead_code)]
mod api;

use alert_agent_lib::{
    health::{components, HealthRegistry},
    models::{AlertReport, Finding, ObjectRef},
    observability::AgentMetrics,
    ResourceKind,
};
use api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::REGISTRY).await;
    health_registry.register(components::SCHEDULER).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = AgentMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["scheduler"].is_object());
    assert!(health["components"]["notifier"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_notifier_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::NOTIFIER, "1 notification(s) failed")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["notifier"]["message"],
        "1 notification(s) failed"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_scheduler_stopped() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::SCHEDULER, "Startup run could not reach any cluster")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_waits_for_checks() {
    let (app, state) = setup_test_app().await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_agent_metrics() {
    let (app, state) = setup_test_app().await;

    let finding = Finding::new(
        ObjectRef::new(ResourceKind::Route, "web", Some("shop".to_string())),
        "Route web is paused; Namespace: shop",
    )
    .unwrap();
    let report =
        AlertReport::new("PausedAcmeRoutes", "https://api.test:6443").with_findings(vec![finding]);

    state.metrics.observe_run(2.0);
    state.metrics.record_report(&report);
    state.metrics.inc_notifications("sent");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("alert_agent_runs_total"));
    assert!(metrics_text.contains("alert_agent_run_duration_seconds_bucket"));
    assert!(metrics_text.contains("alert_agent_findings_detected_total{check=\"PausedAcmeRoutes\"}"));
    assert!(metrics_text.contains("alert_agent_notifications_total{outcome=\"sent\"}"));
}
