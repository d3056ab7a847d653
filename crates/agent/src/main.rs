//! Alert Agent - cluster alerting and remediation
//!
//! Periodically runs every registered alert check against each configured
//! cluster, optionally remediates what it finds and emails the results.

use alert_agent_lib::{
    health::{components, HealthRegistry},
    notification::{Dispatcher, SmtpTransport},
    observability::{AgentMetrics, StructuredLogger},
    AlertRegistry, ClusterRunner, KubeConnector, Scheduler,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

use config::{AgentConfig, LogFormat};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(config: &AgentConfig) {
    let filter = EnvFilter::try_new(config.log_directive()).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[cfg(unix)]
async fn terminate_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::load()?;
    init_tracing(&config);

    info!(node_name = %config.node_name, "Starting alert-agent");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCHEDULER).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let registry = Arc::new(AlertRegistry::discover().context("Failed to load alert checks")?);
    health_registry.register(components::REGISTRY).await;

    let scheduler_config = config.scheduler_config();
    logger.log_startup(
        AGENT_VERSION,
        &registry.names(),
        scheduler_config.remediation_enabled,
    );

    let transport = SmtpTransport::new(&config.smtp_config())
        .context("Failed to configure SMTP transport")?;
    let dispatcher = Dispatcher::new(
        Arc::new(transport),
        config.notification_policy(),
        metrics.clone(),
        logger.clone(),
    )
    .with_timeout(config.notification_timeout());

    let connector = KubeConnector::new()
        .kubeconfig(config.kube_config_file.clone())
        .in_cluster(config.internal_cluster)
        .call_timeout(config.gateway_timeout());

    let scheduler = Scheduler::new(
        scheduler_config,
        Arc::new(connector),
        registry,
        ClusterRunner::new(metrics.clone(), logger.clone()),
        dispatcher,
        health_registry.clone(),
        logger.clone(),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start health and metrics server
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    health_registry.set_ready(true).await;

    let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    let reason = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            "SIGINT received"
        }
        result = terminate_signal() => {
            result.context("Failed to listen for SIGTERM")?;
            "SIGTERM received"
        }
        result = &mut scheduler_handle => {
            let _ = shutdown_tx.send(());
            let _ = api_handle.await;
            return match result.context("Scheduler task panicked")? {
                Ok(()) => Ok(()),
                Err(e) => {
                    error!(error = %e, "Scheduler stopped");
                    Err(e)
                }
            };
        }
    };

    logger.log_shutdown(reason);
    let _ = shutdown_tx.send(());

    // Let the current run finish before exiting
    scheduler_handle
        .await
        .context("Scheduler task panicked")?
        .context("Scheduler failed")?;

    if let Ok(Err(e)) = api_handle.await {
        error!(error = %e, "API server error");
    }

    info!("Shutdown complete");
    Ok(())
}
