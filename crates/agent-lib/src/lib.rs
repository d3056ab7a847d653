//! Agent library for cluster alerting and remediation
//!
//! This crate provides the core functionality for:
//! - Alert checks that detect (and optionally fix) problems in a cluster
//! - Access to cluster resources through a narrow gateway
//! - Per-cluster check execution and notification decisions
//! - Scheduling of recurring runs
//! - Health checks and observability

pub mod checks;
pub mod cluster;
pub mod gateway;
pub mod health;
pub mod models;
pub mod notification;
pub mod observability;
pub mod registry;
pub mod runner;
pub mod scheduler;

pub use checks::{AlertCheck, CheckError, Remediator};
pub use cluster::{Cluster, ClusterConnector, ConnectError, StaticConnector};
pub use gateway::{GatewayError, InMemoryGateway, KubeConnector, ResourceGateway, ResourceKind};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use notification::{
    Dispatcher, NotificationError, NotificationPolicy, NotificationTransport, RecordingTransport,
    SmtpConfig, SmtpTransport,
};
pub use observability::{AgentMetrics, StructuredLogger};
pub use registry::{AlertRegistry, RegistryError};
pub use runner::ClusterRunner;
pub use scheduler::{Scheduler, SchedulerConfig, TickSummary};
