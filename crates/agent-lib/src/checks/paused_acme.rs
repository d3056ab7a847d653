//! Routes whose ACME certificate renewal has been paused
//!
//! openshift-acme stops managing a route's certificate while the
//! `kubernetes.io/tls-acme-paused` annotation is present. Remediation removes
//! the annotation and re-reads the route to confirm it is gone.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use super::{AlertCheck, CheckError, Remediator};
use crate::cluster::Cluster;
use crate::gateway::{list_or_empty, Resource, ResourceGateway, ResourceKind};
use crate::models::{Finding, ObjectRef};

/// Annotation set on routes whose ACME renewal is paused
pub const PAUSED_ANNOTATION: &str = "kubernetes.io/tls-acme-paused";

/// Detects and un-pauses ACME-managed routes
#[derive(Debug, Default, Clone, Copy)]
pub struct PausedAcmeRoutes;

impl PausedAcmeRoutes {
    pub const NAME: &'static str = "PausedAcmeRoutes";

    pub fn new() -> Self {
        Self
    }

    fn is_paused(route: &Resource) -> bool {
        route
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|annotations| annotations.contains_key(PAUSED_ANNOTATION))
    }

    /// Clear the marker if present and confirm by re-reading the route
    async fn unpause(gateway: &dyn ResourceGateway, target: &ObjectRef) -> bool {
        let namespace = target.namespace.as_deref();

        match gateway.get_resource(target.kind, &target.name, namespace).await {
            Ok(route) if !Self::is_paused(&route) => return true,
            Ok(_) => {}
            Err(e) => {
                e.log();
                return false;
            }
        }

        let patch = json!({ "metadata": { "annotations": { PAUSED_ANNOTATION: null } } });
        if let Err(e) = gateway
            .patch_resource(target.kind, &target.name, namespace, &patch)
            .await
        {
            e.log();
            return false;
        }

        match gateway.get_resource(target.kind, &target.name, namespace).await {
            Ok(route) => !Self::is_paused(&route),
            Err(e) => {
                e.log();
                false
            }
        }
    }
}

#[async_trait]
impl AlertCheck for PausedAcmeRoutes {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn detect(&self, cluster: &Cluster) -> Result<Vec<Finding>, CheckError> {
        let gateway = cluster.gateway();
        let mut findings = Vec::new();

        for project in list_or_empty(gateway, ResourceKind::Project, None).await {
            let Some(namespace) = project.metadata.name.as_deref() else {
                continue;
            };

            for route in list_or_empty(gateway, ResourceKind::Route, Some(namespace)).await {
                if !Self::is_paused(&route) {
                    continue;
                }
                let Some(name) = route.metadata.name.clone() else {
                    continue;
                };
                let route_namespace = route
                    .metadata
                    .namespace
                    .clone()
                    .unwrap_or_else(|| namespace.to_string());

                let message = format!("Route {} is paused; Namespace: {}", name, route_namespace);
                info!(
                    scope = "cluster",
                    cluster = %cluster.host(),
                    route = %name,
                    namespace = %route_namespace,
                    "{}",
                    message
                );

                let object_ref = ObjectRef::new(ResourceKind::Route, name, Some(route_namespace));
                findings.push(Finding::new(object_ref, message)?);
            }
        }

        Ok(findings)
    }

    fn remediator(&self) -> Option<&dyn Remediator> {
        Some(self)
    }
}

#[async_trait]
impl Remediator for PausedAcmeRoutes {
    async fn remediate(
        &self,
        cluster: &Cluster,
        mut findings: Vec<Finding>,
    ) -> Result<Vec<Finding>, CheckError> {
        for finding in findings.iter_mut() {
            let target = finding.object_ref().clone();
            let fixed = Self::unpause(cluster.gateway(), &target).await;

            if fixed {
                info!(
                    scope = "cluster",
                    cluster = %cluster.host(),
                    "Route {} remediation successful; Namespace: {}",
                    target.name,
                    target.namespace_or_empty()
                );
            } else {
                warn!(
                    scope = "cluster",
                    cluster = %cluster.host(),
                    "Route {} remediation failed; Namespace: {}",
                    target.name,
                    target.namespace_or_empty()
                );
            }

            if !finding.record_remediation(fixed) {
                warn!(route = %target.name, "Remediation outcome already recorded, keeping the first one");
            }
        }

        Ok(findings)
    }
}
