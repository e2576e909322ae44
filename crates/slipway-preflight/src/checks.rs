//! The five readiness checks.
//!
//! Each check reads one signal, compares it against its configured
//! threshold, and reports pass/fail with a human-readable detail. The
//! detail always names every violation it found, not just the first,
//! so the aggregated report gives the operator the complete picture.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use slipway_core::{Environment, config::PreflightConfig};

use crate::signal::SignalSource;

/// What a check decided, before the runner stamps identity and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// One readiness check. Critical checks gate the deployment outright;
/// non-critical ones still fail the aggregate report but mark
/// conditions an operator may deliberately accept.
#[async_trait]
pub trait PreflightCheck: Send + Sync {
    fn name(&self) -> &'static str;
    fn critical(&self) -> bool;
    async fn run(
        &self,
        signals: &dyn SignalSource,
        environment: Environment,
    ) -> anyhow::Result<CheckOutcome>;
}

/// The standard check set in its fixed run order, thresholds taken
/// from configuration.
pub fn standard_checks(config: &PreflightConfig) -> Vec<Arc<dyn PreflightCheck>> {
    vec![
        Arc::new(HealthScoreCheck::new(config.min_health_score)),
        Arc::new(ResourceHeadroomCheck::new(
            config.max_cpu_usage,
            config.max_memory_usage,
            config.max_storage_usage,
        )),
        Arc::new(DependencyCheck::new(config.max_unreachable_dependencies)),
        Arc::new(SecurityPostureCheck),
        Arc::new(BackupFreshnessCheck::new(Duration::from_secs(
            config.max_backup_age_hours * 3600,
        ))),
    ]
}

// ── Health score ──────────────────────────────────────────────────

/// Aggregate health score against the configured minimum. Critical.
pub struct HealthScoreCheck {
    min_score: f64,
}

impl HealthScoreCheck {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }
}

#[async_trait]
impl PreflightCheck for HealthScoreCheck {
    fn name(&self) -> &'static str {
        "health_score"
    }

    fn critical(&self) -> bool {
        true
    }

    async fn run(
        &self,
        signals: &dyn SignalSource,
        environment: Environment,
    ) -> anyhow::Result<CheckOutcome> {
        let score = signals.health_score(environment).await?;
        Ok(if score >= self.min_score {
            CheckOutcome::pass(format!(
                "health score {score:.2} meets minimum {:.2}",
                self.min_score
            ))
        } else {
            CheckOutcome::fail(format!(
                "health score {score:.2} below minimum {:.2}",
                self.min_score
            ))
        })
    }
}

// ── Resource headroom ─────────────────────────────────────────────

/// CPU, memory, and storage each against their own ceiling. Critical.
/// Every exceeded resource is named in the detail.
pub struct ResourceHeadroomCheck {
    max_cpu: f64,
    max_memory: f64,
    max_storage: f64,
}

impl ResourceHeadroomCheck {
    pub fn new(max_cpu: f64, max_memory: f64, max_storage: f64) -> Self {
        Self {
            max_cpu,
            max_memory,
            max_storage,
        }
    }
}

#[async_trait]
impl PreflightCheck for ResourceHeadroomCheck {
    fn name(&self) -> &'static str {
        "resource_headroom"
    }

    fn critical(&self) -> bool {
        true
    }

    async fn run(
        &self,
        signals: &dyn SignalSource,
        environment: Environment,
    ) -> anyhow::Result<CheckOutcome> {
        let usage = signals.resource_usage(environment).await?;
        let mut exceeded = Vec::new();
        for (resource, used, ceiling) in [
            ("cpu", usage.cpu, self.max_cpu),
            ("memory", usage.memory, self.max_memory),
            ("storage", usage.storage, self.max_storage),
        ] {
            if used > ceiling {
                exceeded.push(format!("{resource} at {used:.2} exceeds ceiling {ceiling:.2}"));
            }
        }
        Ok(if exceeded.is_empty() {
            CheckOutcome::pass(format!(
                "cpu {:.2}, memory {:.2}, storage {:.2} within ceilings",
                usage.cpu, usage.memory, usage.storage
            ))
        } else {
            CheckOutcome::fail(exceeded.join("; "))
        })
    }
}

// ── Dependencies ──────────────────────────────────────────────────

/// Upstream dependency reachability, tolerant of a configured number
/// of unreachable entries. Not critical.
pub struct DependencyCheck {
    max_unreachable: usize,
}

impl DependencyCheck {
    pub fn new(max_unreachable: usize) -> Self {
        Self { max_unreachable }
    }
}

#[async_trait]
impl PreflightCheck for DependencyCheck {
    fn name(&self) -> &'static str {
        "dependencies"
    }

    fn critical(&self) -> bool {
        false
    }

    async fn run(
        &self,
        signals: &dyn SignalSource,
        environment: Environment,
    ) -> anyhow::Result<CheckOutcome> {
        let deps = signals.dependencies(environment).await?;
        let unreachable: Vec<&str> = deps
            .iter()
            .filter(|d| !d.reachable)
            .map(|d| d.name.as_str())
            .collect();
        Ok(if unreachable.is_empty() {
            CheckOutcome::pass(format!("all {} dependencies reachable", deps.len()))
        } else if unreachable.len() <= self.max_unreachable {
            CheckOutcome::pass(format!(
                "{}/{} dependencies unreachable ({}), within tolerance {}",
                unreachable.len(),
                deps.len(),
                unreachable.join(", "),
                self.max_unreachable
            ))
        } else {
            CheckOutcome::fail(format!(
                "{}/{} dependencies unreachable ({}), tolerance {}",
                unreachable.len(),
                deps.len(),
                unreachable.join(", "),
                self.max_unreachable
            ))
        })
    }
}

// ── Security posture ──────────────────────────────────────────────

/// Zero-tolerance security gate: any open vulnerability or failed
/// control fails the check. Critical.
pub struct SecurityPostureCheck;

#[async_trait]
impl PreflightCheck for SecurityPostureCheck {
    fn name(&self) -> &'static str {
        "security_posture"
    }

    fn critical(&self) -> bool {
        true
    }

    async fn run(
        &self,
        signals: &dyn SignalSource,
        environment: Environment,
    ) -> anyhow::Result<CheckOutcome> {
        let posture = signals.security_posture(environment).await?;
        Ok(if posture.is_clean() {
            CheckOutcome::pass("no open vulnerabilities, all controls passing")
        } else {
            let mut parts = Vec::new();
            if posture.open_vulnerabilities > 0 {
                parts.push(format!("{} open vulnerabilities", posture.open_vulnerabilities));
            }
            if !posture.failed_controls.is_empty() {
                parts.push(format!(
                    "failed controls: {}",
                    posture.failed_controls.join(", ")
                ));
            }
            CheckOutcome::fail(parts.join("; "))
        })
    }
}

// ── Backup freshness ──────────────────────────────────────────────

/// Most recent backup age against the configured ceiling. Not critical.
pub struct BackupFreshnessCheck {
    max_age: Duration,
}

impl BackupFreshnessCheck {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

#[async_trait]
impl PreflightCheck for BackupFreshnessCheck {
    fn name(&self) -> &'static str {
        "backup_freshness"
    }

    fn critical(&self) -> bool {
        false
    }

    async fn run(
        &self,
        signals: &dyn SignalSource,
        environment: Environment,
    ) -> anyhow::Result<CheckOutcome> {
        let age = signals.last_backup_age(environment).await?;
        let age_hours = age.as_secs() / 3600;
        let max_hours = self.max_age.as_secs() / 3600;
        Ok(if age <= self.max_age {
            CheckOutcome::pass(format!(
                "last backup {age_hours}h old, within ceiling {max_hours}h"
            ))
        } else {
            CheckOutcome::fail(format!(
                "last backup {age_hours}h old exceeds ceiling {max_hours}h"
            ))
        })
    }
}
