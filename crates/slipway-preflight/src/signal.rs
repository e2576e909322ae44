//! The SignalSource port: read-only telemetry about a target environment.
//!
//! Checks never talk to infrastructure directly; everything they know
//! arrives through this trait. Production wiring reads an operations
//! endpoint over HTTP; tests inject fixed readings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slipway_core::Environment;

/// Point-in-time resource utilization, each as a fraction of capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
}

/// Reachability of one named upstream dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub reachable: bool,
}

/// Security scan summary for the target environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPosture {
    pub open_vulnerabilities: u32,
    pub failed_controls: Vec<String>,
}

impl SecurityPosture {
    /// Whether the posture is clean (zero findings of either kind).
    pub fn is_clean(&self) -> bool {
        self.open_vulnerabilities == 0 && self.failed_controls.is_empty()
    }
}

/// Read-only telemetry feed for one environment.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Aggregate system health score between 0.0 and 1.0.
    async fn health_score(&self, environment: Environment) -> anyhow::Result<f64>;

    /// Current resource utilization fractions.
    async fn resource_usage(&self, environment: Environment) -> anyhow::Result<ResourceUsage>;

    /// Reachability of every named upstream dependency.
    async fn dependencies(&self, environment: Environment)
    -> anyhow::Result<Vec<DependencyStatus>>;

    /// Latest security scan summary.
    async fn security_posture(&self, environment: Environment) -> anyhow::Result<SecurityPosture>;

    /// Age of the most recent completed backup.
    async fn last_backup_age(&self, environment: Environment) -> anyhow::Result<Duration>;
}
