//! Recurring alert runs
//!
//! One run walks every configured cluster in order, runs all checks against
//! it and dispatches the resulting reports. Runs never overlap: a slow run
//! pushes the next tick back instead of stacking ticks up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tokio::sync::broadcast;
use tokio::time::{interval_at, sleep, MissedTickBehavior};
use tracing::info;

use crate::cluster::{ClusterConnector, CURRENT_CONTEXT};
use crate::health::{components, HealthRegistry};
use crate::notification::{DispatchOutcome, Dispatcher};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::registry::AlertRegistry;
use crate::runner::ClusterRunner;

/// Default period between runs
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default delay before the first run
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(30);

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub startup_delay: Duration,
    /// Kubeconfig contexts, processed in this order
    pub contexts: Vec<String>,
    pub remediation_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            startup_delay: DEFAULT_STARTUP_DELAY,
            contexts: vec![CURRENT_CONTEXT.to_string()],
            remediation_enabled: false,
        }
    }
}

/// Outcome of one run over all clusters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub clusters: usize,
    pub failed_clusters: usize,
    pub findings: usize,
    pub notifications_sent: usize,
    pub notifications_suppressed: usize,
    pub notifications_failed: usize,
}

impl TickSummary {
    pub fn all_clusters_failed(&self) -> bool {
        self.clusters > 0 && self.failed_clusters == self.clusters
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    connector: Arc<dyn ClusterConnector>,
    registry: Arc<AlertRegistry>,
    runner: ClusterRunner,
    dispatcher: Dispatcher,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        connector: Arc<dyn ClusterConnector>,
        registry: Arc<AlertRegistry>,
        runner: ClusterRunner,
        dispatcher: Dispatcher,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            config,
            connector,
            registry,
            runner,
            dispatcher,
            health,
            metrics: AgentMetrics::new(),
            logger,
        }
    }

    /// Process every configured cluster once
    pub async fn run_once(&self) -> TickSummary {
        let start = Instant::now();
        let mut summary = TickSummary::default();

        for context in &self.config.contexts {
            summary.clusters += 1;

            let cluster = match self.connector.connect(context).await {
                Ok(cluster) => cluster,
                Err(e) => {
                    self.metrics.inc_cluster_connect_failures();
                    self.logger.log_connect_failed(context, &e.to_string());
                    summary.failed_clusters += 1;
                    continue;
                }
            };

            self.logger.log_cluster_started(cluster.host());

            let reports = self
                .runner
                .run(
                    &cluster,
                    self.registry.checks(),
                    self.config.remediation_enabled,
                )
                .await;

            let findings: usize = reports.iter().map(|r| r.findings.len()).sum();
            summary.findings += findings;

            for report in &reports {
                match self.dispatcher.dispatch(report).await {
                    DispatchOutcome::Skipped => {}
                    DispatchOutcome::Suppressed => summary.notifications_suppressed += 1,
                    DispatchOutcome::Sent => summary.notifications_sent += 1,
                    DispatchOutcome::Failed => summary.notifications_failed += 1,
                }
            }

            self.logger.log_cluster_finished(cluster.host(), findings);
        }

        self.update_health(&summary).await;

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.observe_run(elapsed);
        self.logger
            .log_run_completed(summary.clusters, summary.failed_clusters, elapsed);

        summary
    }

    async fn update_health(&self, summary: &TickSummary) {
        if summary.all_clusters_failed() {
            self.health
                .set_degraded(components::SCHEDULER, "No configured cluster could be reached")
                .await;
        } else {
            self.health.set_healthy(components::SCHEDULER).await;
        }

        if summary.notifications_failed > 0 {
            self.health
                .set_degraded(
                    components::NOTIFIER,
                    format!("{} notification(s) failed", summary.notifications_failed),
                )
                .await;
        } else if summary.notifications_sent > 0 {
            self.health.set_healthy(components::NOTIFIER).await;
        }
    }

    /// Run until shutdown.
    ///
    /// Fails if the startup run cannot reach a single cluster. Shutdown is
    /// only observed between runs.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        if self.config.interval.is_zero() {
            bail!("scheduler interval must be greater than zero");
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            startup_delay_secs = self.config.startup_delay.as_secs(),
            contexts = ?self.config.contexts,
            remediation_enabled = self.config.remediation_enabled,
            "Starting alert scheduler"
        );

        if !self.config.startup_delay.is_zero() {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Shutdown requested before first run");
                    return Ok(());
                }
                _ = sleep(self.config.startup_delay) => {}
            }
        }

        let summary = self.run_once().await;
        if summary.all_clusters_failed() {
            self.health
                .set_unhealthy(components::SCHEDULER, "Startup run could not reach any cluster")
                .await;
            bail!(
                "none of the {} configured cluster(s) could be reached",
                summary.clusters
            );
        }

        let mut ticker = interval_at(
            tokio::time::Instant::now() + self.config.interval,
            self.config.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Shutting down alert scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        Ok(())
    }
}
