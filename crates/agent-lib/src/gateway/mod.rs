//! Resource access against a single cluster
//!
//! This module provides:
//! - The `ResourceGateway` trait used by alert checks
//! - A Kubernetes/OpenShift implementation built on `kube`
//! - An in-memory implementation for tests and dry runs
//!
//! Gateway failures are classified as access denied, not found or transport
//! errors. None of them is fatal; callers decide whether a failure means
//! "empty scope" or "operation failed".

mod memory;
mod openshift;

pub use memory::InMemoryGateway;
pub use openshift::{KubeConnector, KubeGateway};

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Resources are handled untyped; checks only look at metadata
pub type Resource = DynamicObject;

/// Kinds of resources the shipped checks work with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Project,
    Route,
}

impl ResourceKind {
    pub fn group(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project.openshift.io",
            ResourceKind::Route => "route.openshift.io",
        }
    }

    pub fn version(&self) -> &'static str {
        "v1"
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::Route => "routes",
        }
    }

    pub fn namespaced(&self) -> bool {
        matches!(self, ResourceKind::Route)
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group().to_string(),
            version: self.version().to_string(),
            api_version: format!("{}/{}", self.group(), self.version()),
            kind: self.to_string(),
            plural: self.plural().to_string(),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Project => write!(f, "Project"),
            ResourceKind::Route => write!(f, "Route"),
        }
    }
}

/// Classified gateway failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("403 Forbidden: {operation}")]
    AccessDenied { operation: String },

    #[error("404 Not Found: {operation}")]
    NotFound { operation: String },

    #[error("Unable to {operation}: {message}")]
    Transport { operation: String, message: String },
}

impl GatewayError {
    pub fn is_access_denied(&self) -> bool {
        matches!(self, GatewayError::AccessDenied { .. })
    }

    /// Log the failure at the level matching its class
    pub fn log(&self) {
        match self {
            GatewayError::AccessDenied { .. } => info!(error = %self, "Access denied"),
            GatewayError::NotFound { .. } => debug!(error = %self, "Resource not found"),
            GatewayError::Transport { .. } => warn!(error = %self, "Gateway call failed"),
        }
    }
}

/// Human-readable description of a gateway call, e.g. `LIST Route - shop`
pub fn describe_operation(
    verb: &str,
    kind: ResourceKind,
    name: Option<&str>,
    namespace: Option<&str>,
) -> String {
    let mut operation = format!("{} {}", verb, kind);
    if let Some(name) = name {
        operation.push_str(" - ");
        operation.push_str(name);
    }
    if let Some(namespace) = namespace {
        operation.push_str(" - ");
        operation.push_str(namespace);
    }
    operation
}

/// List/get/patch access to one cluster
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    /// List resources of a kind, optionally restricted to a namespace
    async fn list_resources(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Resource>, GatewayError>;

    /// Read a single resource
    async fn get_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Resource, GatewayError>;

    /// Apply a JSON merge patch; `null` values remove keys
    async fn patch_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<Resource, GatewayError>;
}

/// List resources, treating any failure as an empty scope
pub async fn list_or_empty(
    gateway: &dyn ResourceGateway,
    kind: ResourceKind,
    namespace: Option<&str>,
) -> Vec<Resource> {
    match gateway.list_resources(kind, namespace).await {
        Ok(items) => items,
        Err(e) => {
            e.log();
            Vec::new()
        }
    }
}

/// Apply an RFC 7386 JSON merge patch to `target` in place
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }

    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(
                    target_map.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_operation() {
        assert_eq!(
            describe_operation("LIST", ResourceKind::Route, None, Some("shop")),
            "LIST Route - shop"
        );
        assert_eq!(
            describe_operation("PATCH", ResourceKind::Route, Some("web"), Some("shop")),
            "PATCH Route - web - shop"
        );
    }

    #[test]
    fn test_api_resource_for_route() {
        let ar = ResourceKind::Route.api_resource();
        assert_eq!(ar.api_version, "route.openshift.io/v1");
        assert_eq!(ar.kind, "Route");
        assert_eq!(ar.plural, "routes");
        assert!(!ResourceKind::Project.namespaced());
    }

    #[test]
    fn test_merge_patch_null_removes_key() {
        let mut target = json!({
            "metadata": {
                "name": "web",
                "annotations": {
                    "kubernetes.io/tls-acme": "true",
                    "kubernetes.io/tls-acme-paused": "true"
                }
            }
        });
        let patch = json!({
            "metadata": {"annotations": {"kubernetes.io/tls-acme-paused": null}}
        });

        merge_patch(&mut target, &patch);

        assert_eq!(
            target,
            json!({
                "metadata": {
                    "name": "web",
                    "annotations": {"kubernetes.io/tls-acme": "true"}
                }
            })
        );
    }

    #[test]
    fn test_merge_patch_creates_nested_objects() {
        let mut target = json!({"metadata": {"name": "web"}});
        merge_patch(&mut target, &json!({"metadata": {"labels": {"team": "web"}}}));
        assert_eq!(target["metadata"]["labels"]["team"], "web");
    }

    #[test]
    fn test_access_denied_classification() {
        let err = GatewayError::AccessDenied {
            operation: describe_operation("LIST", ResourceKind::Route, None, Some("kube-system")),
        };
        assert!(err.is_access_denied());
        assert_eq!(err.to_string(), "403 Forbidden: LIST Route - kube-system");
    }
}
