//! Kubernetes/OpenShift gateway backed by `kube`
//!
//! Every call is bounded by a timeout and its failure classified:
//! HTTP 403 becomes `AccessDenied`, 404 becomes `NotFound`, everything
//! else (including timeouts) becomes `Transport`.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;
use tracing::debug;

use super::{describe_operation, GatewayError, Resource, ResourceGateway, ResourceKind};
use crate::cluster::{Cluster, ClusterConnector, ConnectError, CURRENT_CONTEXT};

/// Default timeout for a single API call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway talking to a live API server
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    timeout: Duration,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = kind.api_resource();
        match namespace {
            Some(ns) if kind.namespaced() => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Run an API call under the timeout and classify its failure
    async fn call<T, F>(&self, operation: String, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = kube::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(kube::Error::Api(response))) => {
                debug!(operation = %operation, code = response.code, reason = %response.reason, "API call rejected");
                match response.code {
                    403 => Err(GatewayError::AccessDenied { operation }),
                    404 => Err(GatewayError::NotFound { operation }),
                    _ => Err(GatewayError::Transport {
                        operation,
                        message: response.message,
                    }),
                }
            }
            Ok(Err(e)) => Err(GatewayError::Transport {
                operation,
                message: e.to_string(),
            }),
            Err(_) => Err(GatewayError::Transport {
                operation,
                message: format!("timed out after {}s", self.timeout.as_secs()),
            }),
        }
    }
}

#[async_trait]
impl ResourceGateway for KubeGateway {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Resource>, GatewayError> {
        let api = self.api(kind, namespace);
        let operation = describe_operation("LIST", kind, None, namespace);
        let list = self
            .call(operation, api.list(&ListParams::default()))
            .await?;
        Ok(list.items)
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Resource, GatewayError> {
        let api = self.api(kind, namespace);
        let operation = describe_operation("GET", kind, Some(name), namespace);
        self.call(operation, api.get(name)).await
    }

    async fn patch_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<Resource, GatewayError> {
        let api = self.api(kind, namespace);
        let operation = describe_operation("PATCH", kind, Some(name), namespace);
        self.call(
            operation,
            api.patch(name, &PatchParams::default(), &Patch::Merge(patch)),
        )
        .await
    }
}

/// Builds `KubeGateway` clusters from kubeconfig contexts or in-cluster config
#[derive(Debug, Clone, Default)]
pub struct KubeConnector {
    kubeconfig_path: Option<PathBuf>,
    in_cluster: bool,
    timeout: Option<Duration>,
}

impl KubeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read contexts from this kubeconfig instead of the default lookup
    pub fn kubeconfig(mut self, path: Option<PathBuf>) -> Self {
        self.kubeconfig_path = path;
        self
    }

    /// Use the pod's service account instead of a kubeconfig
    pub fn in_cluster(mut self, in_cluster: bool) -> Self {
        self.in_cluster = in_cluster;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn load_config(&self, context: &str) -> Result<Config, ConnectError> {
        let config_error = |e: &dyn std::fmt::Display| ConnectError::Config {
            context: context.to_string(),
            message: e.to_string(),
        };

        if self.in_cluster {
            return Config::incluster().map_err(|e| config_error(&e));
        }

        let options = KubeConfigOptions {
            context: (context != CURRENT_CONTEXT).then(|| context.to_string()),
            ..KubeConfigOptions::default()
        };

        match &self.kubeconfig_path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| config_error(&e))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| config_error(&e))
            }
            None => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| config_error(&e)),
        }
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, context: &str) -> Result<Cluster, ConnectError> {
        let config = self.load_config(context).await?;
        let host = config.cluster_url.to_string();

        let client = Client::try_from(config).map_err(|e| ConnectError::Client {
            context: context.to_string(),
            message: e.to_string(),
        })?;

        let mut gateway = KubeGateway::new(client);
        if let Some(timeout) = self.timeout {
            gateway = gateway.with_timeout(timeout);
        }

        Ok(Cluster::new(context, host, Arc::new(gateway)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_builder() {
        let connector = KubeConnector::new()
            .kubeconfig(Some(PathBuf::from("/tmp/kubeconfig")))
            .in_cluster(false)
            .call_timeout(Duration::from_secs(5));

        assert_eq!(connector.kubeconfig_path, Some(PathBuf::from("/tmp/kubeconfig")));
        assert_eq!(connector.timeout, Some(Duration::from_secs(5)));
        assert!(!connector.in_cluster);
    }

    #[tokio::test]
    async fn test_missing_kubeconfig_is_a_connect_error() {
        let connector =
            KubeConnector::new().kubeconfig(Some(PathBuf::from("/nonexistent/alert-agent/kubeconfig")));

        let err = connector.connect("staging").await.err().unwrap();
        assert!(matches!(err, ConnectError::Config { ref context, .. } if context == "staging"));
    }
}
