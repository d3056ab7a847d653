//! Alert check registry
//!
//! Checks are registered in a literal list compiled into the binary. The
//! registry instantiates each one once at startup; the resulting order is
//! the order checks run in for the lifetime of the process.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::checks::{AlertCheck, CheckError, PausedAcmeRoutes};

/// Constructor for one check
pub type CheckFactory = fn() -> Result<Box<dyn AlertCheck>, CheckError>;

/// A named check constructor
#[derive(Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub factory: CheckFactory,
}

/// Every check shipped with the agent, in run order
pub const REGISTRATIONS: &[Registration] = &[Registration {
    name: PausedAcmeRoutes::NAME,
    factory: paused_acme_routes,
}];

fn paused_acme_routes() -> Result<Box<dyn AlertCheck>, CheckError> {
    Ok(Box::new(PausedAcmeRoutes::new()))
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no alert checks could be loaded")]
    Empty,
}

/// Immutable set of instantiated checks
pub struct AlertRegistry {
    checks: Vec<Arc<dyn AlertCheck>>,
}

impl AlertRegistry {
    /// Instantiate every shipped check
    pub fn discover() -> Result<Self, RegistryError> {
        Self::from_registrations(REGISTRATIONS)
    }

    /// Instantiate the given registrations, skipping any that fail
    pub fn from_registrations(registrations: &[Registration]) -> Result<Self, RegistryError> {
        let mut checks: Vec<Arc<dyn AlertCheck>> = Vec::with_capacity(registrations.len());

        for registration in registrations {
            match (registration.factory)() {
                Ok(check) => {
                    info!(check = registration.name, "Loaded alert check");
                    checks.push(Arc::from(check));
                }
                Err(e) => {
                    error!(check = registration.name, error = %e, "Failed to load alert check, skipping");
                }
            }
        }

        Self::from_checks(checks)
    }

    /// Build a registry from already constructed checks
    pub fn from_checks(checks: Vec<Arc<dyn AlertCheck>>) -> Result<Self, RegistryError> {
        if checks.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self { checks })
    }

    pub fn checks(&self) -> &[Arc<dyn AlertCheck>] {
        &self.checks
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
