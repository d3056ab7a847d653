//! Core data models for the alert agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::ResourceKind;

/// Outcome of a remediation attempt for a single finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemediationOutcome {
    #[default]
    NotAttempted,
    Succeeded,
    Failed,
}

impl RemediationOutcome {
    /// Text appended to a finding's message in notification bodies
    pub fn annotation(&self) -> &'static str {
        match self {
            RemediationOutcome::NotAttempted => "Not attempted",
            RemediationOutcome::Succeeded => "Successfully remediated",
            RemediationOutcome::Failed => "Failed remediation",
        }
    }
}

impl std::fmt::Display for RemediationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemediationOutcome::NotAttempted => write!(f, "not_attempted"),
            RemediationOutcome::Succeeded => write!(f, "succeeded"),
            RemediationOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Handle back to the resource a finding was raised for.
///
/// The orchestration layer only carries it from detection to remediation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
}

impl ObjectRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace,
        }
    }

    /// Namespace for display, empty for cluster-scoped objects
    pub fn namespace_or_empty(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("finding message must not be empty")]
pub struct EmptyFindingMessage;

/// One detected problem instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    object_ref: ObjectRef,
    message: String,
    remediated: RemediationOutcome,
}

impl Finding {
    pub fn new(object_ref: ObjectRef, message: impl Into<String>) -> Result<Self, EmptyFindingMessage> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(EmptyFindingMessage);
        }

        Ok(Self {
            object_ref,
            message,
            remediated: RemediationOutcome::NotAttempted,
        })
    }

    pub fn object_ref(&self) -> &ObjectRef {
        &self.object_ref
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn remediated(&self) -> RemediationOutcome {
        self.remediated
    }

    /// Record the result of a remediation step.
    ///
    /// The outcome can only be set once; returns false if it was already set.
    pub fn record_remediation(&mut self, succeeded: bool) -> bool {
        if self.remediated != RemediationOutcome::NotAttempted {
            return false;
        }

        self.remediated = if succeeded {
            RemediationOutcome::Succeeded
        } else {
            RemediationOutcome::Failed
        };
        true
    }
}

/// Findings of one check against one cluster
#[derive(Debug, Clone, Serialize)]
pub struct AlertReport {
    pub check: String,
    pub cluster: String,
    pub findings: Vec<Finding>,
    pub remediation_attempted: bool,
}

impl AlertReport {
    pub fn new(check: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            cluster: cluster.into(),
            findings: Vec::new(),
            remediation_attempted: false,
        }
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// True when every finding was successfully remediated
    pub fn fully_remediated(&self) -> bool {
        !self.findings.is_empty()
            && self
                .findings
                .iter()
                .all(|f| f.remediated() == RemediationOutcome::Succeeded)
    }

    pub fn count(&self, outcome: RemediationOutcome) -> usize {
        self.findings
            .iter()
            .filter(|f| f.remediated() == outcome)
            .count()
    }
}
