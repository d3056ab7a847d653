//! In-memory resource gateway
//!
//! Holds resources in a sorted map so listings are deterministic. Failure
//! modes of a real API server can be injected: access denied per namespace,
//! transport failure for every call, and annotations a patch cannot remove.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::Value;

use super::{describe_operation, merge_patch, GatewayError, Resource, ResourceGateway, ResourceKind};

type Key = (ResourceKind, Option<String>, String);

/// Resource gateway backed by a local map
#[derive(Default)]
pub struct InMemoryGateway {
    objects: Mutex<BTreeMap<Key, Resource>>,
    denied_namespaces: Mutex<BTreeSet<String>>,
    sticky_annotations: Mutex<BTreeSet<String>>,
    unreachable: AtomicBool,
    patches: AtomicUsize,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cluster-scoped project
    pub fn with_project(self, name: &str) -> Self {
        self.insert(ResourceKind::Project, None, name, &[]);
        self
    }

    /// Add a route with the given annotations
    pub fn with_route(self, namespace: &str, name: &str, annotations: &[(&str, &str)]) -> Self {
        self.insert(ResourceKind::Route, Some(namespace), name, annotations);
        self
    }

    /// Insert or replace a resource
    pub fn insert(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        annotations: &[(&str, &str)],
    ) {
        let mut object = DynamicObject::new(name, &kind.api_resource());
        if let Some(ns) = namespace {
            object = object.within(ns);
        }
        if !annotations.is_empty() {
            object.metadata.annotations = Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }

        self.lock_objects()
            .insert(key(kind, namespace, name), object);
    }

    /// Every call touching this namespace fails with `AccessDenied`
    pub fn deny_namespace(&self, namespace: &str) {
        lock(&self.denied_namespaces).insert(namespace.to_string());
    }

    /// Patches silently keep this annotation in place
    pub fn stick_annotation(&self, annotation: &str) {
        lock(&self.sticky_annotations).insert(annotation.to_string());
    }

    /// Every call fails with a `Transport` error while set
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of patch calls that reached a stored resource
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    /// Current annotations of a resource, if it exists
    pub fn annotations(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<BTreeMap<String, String>> {
        self.lock_objects()
            .get(&key(kind, namespace, name))
            .map(|o| o.metadata.annotations.clone().unwrap_or_default())
    }

    fn lock_objects(&self) -> MutexGuard<'_, BTreeMap<Key, Resource>> {
        lock(&self.objects)
    }

    fn check_access(&self, operation: &str, namespace: Option<&str>) -> Result<(), GatewayError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport {
                operation: operation.to_string(),
                message: "connection refused".to_string(),
            });
        }

        if let Some(ns) = namespace {
            if lock(&self.denied_namespaces).contains(ns) {
                return Err(GatewayError::AccessDenied {
                    operation: operation.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ResourceGateway for InMemoryGateway {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Resource>, GatewayError> {
        let operation = describe_operation("LIST", kind, None, namespace);
        self.check_access(&operation, namespace)?;

        let items = self
            .lock_objects()
            .iter()
            .filter(|((k, ns, _), _)| {
                *k == kind && (namespace.is_none() || ns.as_deref() == namespace)
            })
            .map(|(_, object)| object.clone())
            .collect();
        Ok(items)
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Resource, GatewayError> {
        let operation = describe_operation("GET", kind, Some(name), namespace);
        self.check_access(&operation, namespace)?;

        self.lock_objects()
            .get(&key(kind, namespace, name))
            .cloned()
            .ok_or(GatewayError::NotFound { operation })
    }

    async fn patch_resource(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<Resource, GatewayError> {
        let operation = describe_operation("PATCH", kind, Some(name), namespace);
        self.check_access(&operation, namespace)?;

        let sticky = lock(&self.sticky_annotations).clone();
        let mut objects = self.lock_objects();
        let Some(object) = objects.get_mut(&key(kind, namespace, name)) else {
            return Err(GatewayError::NotFound { operation });
        };

        let kept: BTreeMap<String, String> = object
            .metadata
            .annotations
            .iter()
            .flatten()
            .filter(|(k, _)| sticky.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut document = serde_json::to_value(&*object).map_err(|e| GatewayError::Transport {
            operation: operation.clone(),
            message: e.to_string(),
        })?;
        merge_patch(&mut document, patch);
        let mut patched: Resource =
            serde_json::from_value(document).map_err(|e| GatewayError::Transport {
                operation: operation.clone(),
                message: e.to_string(),
            })?;

        if !kept.is_empty() {
            patched
                .metadata
                .annotations
                .get_or_insert_with(BTreeMap::new)
                .extend(kept);
        }

        *object = patched.clone();
        self.patches.fetch_add(1, Ordering::SeqCst);
        Ok(patched)
    }
}

fn key(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Key {
    (kind, namespace.map(str::to_string), name.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
