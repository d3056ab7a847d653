//! End-to-end runs against an in-memory cluster

use std::sync::Arc;
use std::time::Duration;

use alert_agent_lib::checks::PAUSED_ANNOTATION;
use alert_agent_lib::{
    AgentMetrics, AlertRegistry, ClusterRunner, Dispatcher, HealthRegistry, InMemoryGateway,
    NotificationPolicy, RecordingTransport, ResourceKind, Scheduler, SchedulerConfig,
    StaticConnector, StructuredLogger,
};

const HOST: &str = "https://api.prod.example.com:6443";

struct Harness {
    gateway: Arc<InMemoryGateway>,
    transport: Arc<RecordingTransport>,
    scheduler: Scheduler,
}

fn harness(remediation_enabled: bool, suppress_on_full_success: bool) -> Harness {
    let gateway = Arc::new(
        InMemoryGateway::new()
            .with_project("shop")
            .with_project("blog")
            .with_route("shop", "storefront", &[(PAUSED_ANNOTATION, "true")])
            .with_route("blog", "www", &[("kubernetes.io/tls-acme", "true")]),
    );
    let transport = Arc::new(RecordingTransport::new());

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new("e2e");
    let connector = StaticConnector::new().with_cluster("prod", HOST, gateway.clone());

    let scheduler = Scheduler::new(
        SchedulerConfig {
            interval: Duration::from_secs(3600),
            startup_delay: Duration::ZERO,
            contexts: vec!["prod".to_string()],
            remediation_enabled,
        },
        Arc::new(connector),
        Arc::new(AlertRegistry::discover().unwrap()),
        ClusterRunner::new(metrics.clone(), logger.clone()),
        Dispatcher::new(
            transport.clone(),
            NotificationPolicy::new(suppress_on_full_success),
            metrics,
            logger.clone(),
        ),
        HealthRegistry::new(),
        logger,
    );

    Harness {
        gateway,
        transport,
        scheduler,
    }
}

#[tokio::test]
async fn test_paused_route_alerts_without_remediation() {
    let h = harness(false, false);

    let summary = h.scheduler.run_once().await;

    assert_eq!(summary.findings, 1);
    assert_eq!(h.gateway.patch_count(), 0);

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, format!("PausedAcmeRoutes - {}", HOST));
    assert_eq!(
        sent[0].body,
        "Alert(s) found:\n\n\tRoute storefront is paused; Namespace: shop"
    );

    let annotations = h
        .gateway
        .annotations(ResourceKind::Route, Some("shop"), "storefront")
        .unwrap();
    assert!(annotations.contains_key(PAUSED_ANNOTATION));
}

#[tokio::test]
async fn test_paused_route_remediated_and_reported() {
    let h = harness(true, false);

    let summary = h.scheduler.run_once().await;

    assert_eq!(summary.findings, 1);
    assert_eq!(summary.notifications_sent, 1);

    let annotations = h
        .gateway
        .annotations(ResourceKind::Route, Some("shop"), "storefront")
        .unwrap();
    assert!(!annotations.contains_key(PAUSED_ANNOTATION));

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .body
        .ends_with("Route storefront is paused; Namespace: shop - Successfully remediated"));
}

#[tokio::test]
async fn test_successful_remediation_suppressed() {
    let h = harness(true, true);

    let summary = h.scheduler.run_once().await;

    assert_eq!(summary.notifications_suppressed, 1);
    assert!(h.transport.sent().is_empty());
    assert_eq!(h.gateway.patch_count(), 1);
}

#[tokio::test]
async fn test_failed_remediation_is_never_suppressed() {
    let h = harness(true, true);
    h.gateway.stick_annotation(PAUSED_ANNOTATION);

    h.scheduler.run_once().await;

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Route storefront"));
    assert!(sent[0].body.contains("Failed remediation"));
}

#[tokio::test]
async fn test_second_run_finds_nothing_after_remediation() {
    let h = harness(true, false);

    h.scheduler.run_once().await;
    let summary = h.scheduler.run_once().await;

    assert_eq!(summary.findings, 0);
    assert_eq!(h.transport.sent().len(), 1);
    assert_eq!(h.gateway.patch_count(), 1);
}
