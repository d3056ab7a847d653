//! Alert checks
//!
//! An alert check detects one misconfiguration on a cluster and may offer a
//! remediation for it. Detection is always available; remediation is an
//! optional capability exposed through `AlertCheck::remediator`.

mod paused_acme;

pub use paused_acme::{PausedAcmeRoutes, PAUSED_ANNOTATION};

use async_trait::async_trait;
use thiserror::Error;

use crate::cluster::Cluster;
use crate::gateway::GatewayError;
use crate::models::{EmptyFindingMessage, Finding};

/// Unexpected failure inside a check
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    InvalidFinding(#[from] EmptyFindingMessage),

    #[error("{0}")]
    Failed(String),
}

/// Detection rule run against one cluster
#[async_trait]
pub trait AlertCheck: Send + Sync {
    /// Name used in logs, metrics and notification subjects
    fn name(&self) -> &str;

    /// Scan the cluster without modifying it.
    ///
    /// Returns an empty list when nothing is wrong. Access failures for
    /// individual resources mean "no finding for that resource".
    async fn detect(&self, cluster: &Cluster) -> Result<Vec<Finding>, CheckError>;

    /// Remediation capability, if the check has one
    fn remediator(&self) -> Option<&dyn Remediator> {
        None
    }
}

/// Corrective action for findings of one check
#[async_trait]
pub trait Remediator: Send + Sync {
    /// Fix each finding and record whether the fix was verified.
    ///
    /// A finding only counts as remediated when re-reading the resource shows
    /// the corrected state. Must be safe to run on already-fixed resources.
    async fn remediate(
        &self,
        cluster: &Cluster,
        findings: Vec<Finding>,
    ) -> Result<Vec<Finding>, CheckError>;
}
