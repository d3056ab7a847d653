//! Cluster connections
//!
//! A `Cluster` is a gateway plus the identity shown in logs and notification
//! subjects. Connections are built fresh for every run by a `ClusterConnector`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::gateway::ResourceGateway;

/// Context name meaning "whatever the kubeconfig currently points at"
pub const CURRENT_CONTEXT: &str = "current";

/// Failure to build a connection for one configured context
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to load configuration for context {context}: {message}")]
    Config { context: String, message: String },

    #[error("failed to create client for context {context}: {message}")]
    Client { context: String, message: String },
}

/// Connection handle for one cluster
#[derive(Clone)]
pub struct Cluster {
    context: String,
    host: String,
    gateway: Arc<dyn ResourceGateway>,
}

impl Cluster {
    pub fn new(
        context: impl Into<String>,
        host: impl Into<String>,
        gateway: Arc<dyn ResourceGateway>,
    ) -> Self {
        Self {
            context: context.into(),
            host: host.into(),
            gateway,
        }
    }

    /// Configured context name
    pub fn context(&self) -> &str {
        &self.context
    }

    /// API server URL, used as the display identity
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn gateway(&self) -> &dyn ResourceGateway {
        self.gateway.as_ref()
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("context", &self.context)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Builds cluster connections from configured context names
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, context: &str) -> Result<Cluster, ConnectError>;
}

/// Connector over a fixed set of prebuilt gateways, keyed by context.
///
/// Contexts that were not added fail to connect.
#[derive(Default)]
pub struct StaticConnector {
    clusters: BTreeMap<String, (String, Arc<dyn ResourceGateway>)>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(
        mut self,
        context: impl Into<String>,
        host: impl Into<String>,
        gateway: Arc<dyn ResourceGateway>,
    ) -> Self {
        self.clusters.insert(context.into(), (host.into(), gateway));
        self
    }
}

#[async_trait]
impl ClusterConnector for StaticConnector {
    async fn connect(&self, context: &str) -> Result<Cluster, ConnectError> {
        let (host, gateway) = self.clusters.get(context).ok_or_else(|| ConnectError::Config {
            context: context.to_string(),
            message: "context not found".to_string(),
        })?;
        Ok(Cluster::new(context, host.clone(), Arc::clone(gateway)))
    }
}
