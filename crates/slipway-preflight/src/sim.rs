//! Simulated signal source.
//!
//! Returns fixed readings instead of querying live telemetry. Used by
//! the daemon's dry-run mode and by tests; defaults describe a healthy
//! environment.

use std::time::Duration;

use async_trait::async_trait;
use slipway_core::Environment;

use crate::signal::{DependencyStatus, ResourceUsage, SecurityPosture, SignalSource};

/// Signal source with scripted readings.
pub struct SimSignals {
    pub health: f64,
    pub usage: ResourceUsage,
    pub deps: Vec<DependencyStatus>,
    pub posture: SecurityPosture,
    pub backup_age: Duration,
}

impl Default for SimSignals {
    fn default() -> Self {
        Self {
            health: 0.95,
            usage: ResourceUsage {
                cpu: 0.40,
                memory: 0.55,
                storage: 0.30,
            },
            deps: vec![
                DependencyStatus {
                    name: "database".to_string(),
                    reachable: true,
                },
                DependencyStatus {
                    name: "cache".to_string(),
                    reachable: true,
                },
            ],
            posture: SecurityPosture {
                open_vulnerabilities: 0,
                failed_controls: vec![],
            },
            backup_age: Duration::from_secs(2 * 3600),
        }
    }
}

impl SimSignals {
    pub fn with_dependency(mut self, name: &str, reachable: bool) -> Self {
        self.deps.push(DependencyStatus {
            name: name.to_string(),
            reachable,
        });
        self
    }
}

#[async_trait]
impl SignalSource for SimSignals {
    async fn health_score(&self, _: Environment) -> anyhow::Result<f64> {
        Ok(self.health)
    }

    async fn resource_usage(&self, _: Environment) -> anyhow::Result<ResourceUsage> {
        Ok(self.usage)
    }

    async fn dependencies(&self, _: Environment) -> anyhow::Result<Vec<DependencyStatus>> {
        Ok(self.deps.clone())
    }

    async fn security_posture(&self, _: Environment) -> anyhow::Result<SecurityPosture> {
        Ok(self.posture.clone())
    }

    async fn last_backup_age(&self, _: Environment) -> anyhow::Result<Duration> {
        Ok(self.backup_age)
    }
}
