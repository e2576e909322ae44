//! The EffectDriver port: every infrastructure mutation a strategy
//! can perform, as named effects with declared outcomes.
//!
//! Executors hold no randomness and no transport details; given the
//! same driver responses they always take the same path. Monitoring
//! windows and pauses are driver calls too, so a simulated driver can
//! run a whole strategy without sleeping.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slipway_core::{Environment, ReleaseVersion};

/// Blue/green slot assignment at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    /// Slot currently serving production traffic.
    pub live: String,
    /// Idle slot the new version deploys into.
    pub idle: String,
}

/// Smoke test summary from a freshly deployed slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeReport {
    pub passed: u32,
    pub failed: u32,
    /// Names of the failing tests.
    pub failures: Vec<String>,
}

impl SmokeReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }
}

/// Metric readings aggregated over one monitoring window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RolloutMetrics {
    /// Error rate as a percentage (0.0 - 100.0).
    pub error_rate_pct: f64,
    /// P99 latency in milliseconds.
    pub p99_latency_ms: u64,
}

/// Infrastructure effects available to strategy executors and the
/// compensator.
#[async_trait]
pub trait EffectDriver: Send + Sync {
    // ── Blue/green ─────────────────────────────────────────────────

    /// Which slot is live and which is idle.
    async fn slot_layout(&self, environment: Environment) -> anyhow::Result<SlotLayout>;

    /// Install a version into a slot without routing traffic to it.
    async fn deploy_to_slot(&self, slot: &str, version: &ReleaseVersion) -> anyhow::Result<()>;

    /// Run the smoke suite against a slot.
    async fn run_smoke_tests(&self, slot: &str) -> anyhow::Result<SmokeReport>;

    /// Route the given percentage of traffic to a slot.
    async fn shift_traffic(&self, slot: &str, percent: u32) -> anyhow::Result<()>;

    // ── Canary ─────────────────────────────────────────────────────

    /// Route the given percentage of traffic to the canary set.
    async fn route_canary(&self, percent: u32) -> anyhow::Result<()>;

    /// Tear the canary down, returning all traffic to the stable set.
    async fn remove_canary(&self) -> anyhow::Result<()>;

    // ── Rolling ────────────────────────────────────────────────────

    /// Instance identifiers making up the fleet.
    async fn fleet(&self, environment: Environment) -> anyhow::Result<Vec<String>>;

    /// Update a batch of instances to a version.
    async fn update_instances(
        &self,
        instances: &[String],
        version: &ReleaseVersion,
    ) -> anyhow::Result<()>;

    /// Whether every instance in the batch passed its health gate.
    async fn instances_healthy(&self, instances: &[String]) -> anyhow::Result<bool>;

    /// Revert the whole fleet to the previously deployed version.
    async fn revert_fleet(&self, environment: Environment) -> anyhow::Result<()>;

    // ── Hotfix / shared ────────────────────────────────────────────

    /// Deploy a build directly to the live serving path.
    async fn deploy_build(
        &self,
        environment: Environment,
        version: &ReleaseVersion,
    ) -> anyhow::Result<()>;

    /// One verification pass against the environment's health endpoint.
    async fn verify_health(&self, environment: Environment) -> anyhow::Result<bool>;

    /// Restore the previously deployed release.
    async fn revert_release(&self, environment: Environment) -> anyhow::Result<()>;

    // ── Windows ────────────────────────────────────────────────────

    /// Observe traffic for the given window and report its metrics.
    async fn monitor(&self, window: Duration) -> anyhow::Result<RolloutMetrics>;

    /// Pause between steps.
    async fn hold(&self, pause: Duration) -> anyhow::Result<()>;
}
