//! Observability infrastructure for the alert agent
//!
//! Provides:
//! - Prometheus metrics (run latency, findings, remediation outcomes, notifications)
//! - Structured logging helpers with consistent event names

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

use crate::models::{AlertReport, RemediationOutcome};

/// Histogram buckets for a full run over all clusters (in seconds)
const RUN_DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    runs: IntCounter,
    run_duration_seconds: Histogram,
    cluster_connect_failures: IntCounter,
    findings_detected: IntCounterVec,
    remediations: IntCounterVec,
    check_failures: IntCounterVec,
    notifications: IntCounterVec,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            runs: register_int_counter!(
                "alert_agent_runs_total",
                "Number of completed scheduler runs"
            )
            .expect("Failed to register runs_total"),

            run_duration_seconds: register_histogram!(
                "alert_agent_run_duration_seconds",
                "Time spent processing all clusters in one run",
                RUN_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register run_duration_seconds"),

            cluster_connect_failures: register_int_counter!(
                "alert_agent_cluster_connect_failures_total",
                "Number of cluster connections that could not be established"
            )
            .expect("Failed to register cluster_connect_failures_total"),

            findings_detected: register_int_counter_vec!(
                "alert_agent_findings_detected_total",
                "Number of findings detected per check",
                &["check"]
            )
            .expect("Failed to register findings_detected_total"),

            remediations: register_int_counter_vec!(
                "alert_agent_remediations_total",
                "Remediation attempts per check and outcome",
                &["check", "outcome"]
            )
            .expect("Failed to register remediations_total"),

            check_failures: register_int_counter_vec!(
                "alert_agent_check_failures_total",
                "Unexpected check failures per check",
                &["check"]
            )
            .expect("Failed to register check_failures_total"),

            notifications: register_int_counter_vec!(
                "alert_agent_notifications_total",
                "Notification decisions and deliveries by outcome",
                &["outcome"]
            )
            .expect("Failed to register notifications_total"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    /// Record a completed run and its duration
    pub fn observe_run(&self, duration_secs: f64) {
        self.inner().runs.inc();
        self.inner().run_duration_seconds.observe(duration_secs);
    }

    pub fn inc_cluster_connect_failures(&self) {
        self.inner().cluster_connect_failures.inc();
    }

    pub fn inc_check_failures(&self, check: &str) {
        self.inner().check_failures.with_label_values(&[check]).inc();
    }

    /// Count findings and remediation outcomes of a finished report
    pub fn record_report(&self, report: &AlertReport) {
        let inner = self.inner();
        inner
            .findings_detected
            .with_label_values(&[report.check.as_str()])
            .inc_by(report.findings.len() as u64);

        for outcome in [RemediationOutcome::Succeeded, RemediationOutcome::Failed] {
            let count = report.count(outcome);
            if count > 0 {
                inner
                    .remediations
                    .with_label_values(&[report.check.as_str(), outcome.to_string().as_str()])
                    .inc_by(count as u64);
            }
        }
    }

    /// Count a notification outcome (`sent`, `suppressed`, `failed`)
    pub fn inc_notifications(&self, outcome: &str) {
        self.inner().notifications.with_label_values(&[outcome]).inc();
    }
}

/// Structured logger for agent events
///
/// Per-cluster events carry `scope = "cluster"` so log consumers can nest
/// them under the surrounding run.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, checks: &[&str], remediation_enabled: bool) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            checks = ?checks,
            remediation_enabled = remediation_enabled,
            "Alert agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Alert agent shutting down"
        );
    }

    pub fn log_cluster_started(&self, host: &str) {
        info!(
            event = "cluster_scan_started",
            cluster = %host,
            "Processing alerts for Cluster: {} ...",
            host
        );
    }

    pub fn log_cluster_finished(&self, host: &str, findings: usize) {
        info!(
            event = "cluster_scan_finished",
            cluster = %host,
            findings = findings,
            "Finished processing alerts for Cluster: {}.",
            host
        );
    }

    pub fn log_connect_failed(&self, context: &str, error: &str) {
        error!(
            event = "cluster_connect_failed",
            context = %context,
            error = %error,
            "Unable to connect to cluster, skipping"
        );
    }

    pub fn log_check_failure(&self, host: &str, check: &str, stage: &str, error: &str) {
        error!(
            event = "check_failed",
            scope = "cluster",
            cluster = %host,
            check = %check,
            stage = %stage,
            error = %error,
            "Alert check failed"
        );
    }

    pub fn log_report(&self, report: &AlertReport) {
        if report.is_empty() {
            return;
        }

        info!(
            event = "check_report",
            scope = "cluster",
            cluster = %report.cluster,
            check = %report.check,
            findings = report.findings.len(),
            remediated = report.count(RemediationOutcome::Succeeded),
            remediation_failed = report.count(RemediationOutcome::Failed),
            "Alert check reported findings"
        );
    }

    pub fn log_notification_failed(&self, subject: &str, error: &str, body: &str) {
        error!(
            event = "notification_failed",
            subject = %subject,
            error = %error,
            body = %body,
            "Unable to send alert notification"
        );
    }

    pub fn log_run_completed(&self, clusters: usize, failed_clusters: usize, duration_secs: f64) {
        if failed_clusters > 0 {
            warn!(
                event = "run_completed",
                clusters = clusters,
                failed_clusters = failed_clusters,
                duration_secs = duration_secs,
                "Run completed with unreachable clusters"
            );
        } else {
            info!(
                event = "run_completed",
                clusters = clusters,
                duration_secs = duration_secs,
                "Run completed"
            );
        }
    }
}
