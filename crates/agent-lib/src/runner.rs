//! Per-cluster execution of alert checks
//!
//! Runs every registered check against one cluster in registry order,
//! remediates when enabled and supported, and contains check failures so one
//! misbehaving check never affects the others.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::debug;

use crate::checks::{AlertCheck, CheckError};
use crate::cluster::Cluster;
use crate::models::{AlertReport, Finding};
use crate::observability::{AgentMetrics, StructuredLogger};

/// Phase of a check in which a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    Detect,
    Remediate,
}

impl std::fmt::Display for CheckStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStage::Detect => write!(f, "detect"),
            CheckStage::Remediate => write!(f, "remediate"),
        }
    }
}

/// A check returned an error or panicked
#[derive(Debug, Error)]
#[error("check {check} failed during {stage}: {message}")]
pub struct CheckFailure {
    pub check: String,
    pub stage: CheckStage,
    pub message: String,
}

impl CheckFailure {
    fn from_error(check: &str, stage: CheckStage, error: CheckError) -> Self {
        Self {
            check: check.to_string(),
            stage,
            message: error.to_string(),
        }
    }

    fn from_join(check: &str, stage: CheckStage, error: JoinError) -> Self {
        let message = if error.is_panic() {
            "check panicked".to_string()
        } else {
            error.to_string()
        };
        Self {
            check: check.to_string(),
            stage,
            message,
        }
    }
}

/// Binds a cluster to the set of checks and produces reports
#[derive(Clone)]
pub struct ClusterRunner {
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl ClusterRunner {
    pub fn new(metrics: AgentMetrics, logger: StructuredLogger) -> Self {
        Self { metrics, logger }
    }

    /// Run all checks against one cluster, one report per check
    pub async fn run(
        &self,
        cluster: &Cluster,
        checks: &[Arc<dyn AlertCheck>],
        remediation_enabled: bool,
    ) -> Vec<AlertReport> {
        let mut reports = Vec::with_capacity(checks.len());

        for check in checks {
            let report = self.run_check(cluster, check, remediation_enabled).await;
            self.metrics.record_report(&report);
            self.logger.log_report(&report);
            reports.push(report);
        }

        reports
    }

    async fn run_check(
        &self,
        cluster: &Cluster,
        check: &Arc<dyn AlertCheck>,
        remediation_enabled: bool,
    ) -> AlertReport {
        let report = AlertReport::new(check.name(), cluster.host());

        let findings = match Self::detect(cluster, check).await {
            Ok(findings) => findings,
            Err(failure) => {
                self.record_failure(cluster, &failure);
                return report;
            }
        };

        if findings.is_empty() {
            return report;
        }

        if !remediation_enabled || check.remediator().is_none() {
            debug!(check = %check.name(), "Remediation skipped");
            return report.with_findings(findings);
        }

        let mut report = match Self::remediate(cluster, check, findings.clone()).await {
            Ok(remediated) => report.with_findings(remediated),
            Err(failure) => {
                self.record_failure(cluster, &failure);
                report.with_findings(findings)
            }
        };
        report.remediation_attempted = true;
        report
    }

    fn record_failure(&self, cluster: &Cluster, failure: &CheckFailure) {
        self.metrics.inc_check_failures(&failure.check);
        self.logger.log_check_failure(
            cluster.host(),
            &failure.check,
            &failure.stage.to_string(),
            &failure.message,
        );
    }

    /// Run detection on its own task so a panic stays contained
    async fn detect(
        cluster: &Cluster,
        check: &Arc<dyn AlertCheck>,
    ) -> Result<Vec<Finding>, CheckFailure> {
        let name = check.name().to_string();
        let task_cluster = cluster.clone();
        let task_check = Arc::clone(check);

        let handle = tokio::spawn(async move { task_check.detect(&task_cluster).await });

        match handle.await {
            Ok(Ok(findings)) => Ok(findings),
            Ok(Err(e)) => Err(CheckFailure::from_error(&name, CheckStage::Detect, e)),
            Err(e) => Err(CheckFailure::from_join(&name, CheckStage::Detect, e)),
        }
    }

    async fn remediate(
        cluster: &Cluster,
        check: &Arc<dyn AlertCheck>,
        findings: Vec<Finding>,
    ) -> Result<Vec<Finding>, CheckFailure> {
        let name = check.name().to_string();
        let task_cluster = cluster.clone();
        let task_check = Arc::clone(check);

        let handle = tokio::spawn(async move {
            match task_check.remediator() {
                Some(remediator) => remediator.remediate(&task_cluster, findings).await,
                None => Ok(findings),
            }
        });

        match handle.await {
            Ok(Ok(findings)) => Ok(findings),
            Ok(Err(e)) => Err(CheckFailure::from_error(&name, CheckStage::Remediate, e)),
            Err(e) => Err(CheckFailure::from_join(&name, CheckStage::Remediate, e)),
        }
    }
}
