//! Scripted in-process effect driver.
//!
//! Stands in for real infrastructure in tests and dry runs: every
//! effect records itself to a call log and returns a scripted answer
//! instantly. Holds and monitor windows do not sleep.

use std::time::Duration;

use async_trait::async_trait;
use slipway_core::{Environment, ReleaseVersion};
use tokio::sync::Mutex;

use crate::driver::{EffectDriver, RolloutMetrics, SlotLayout, SmokeReport};

const SMOKE_SUITE_SIZE: u32 = 12;

/// Knobs controlling what the simulated infrastructure reports.
#[derive(Debug, Clone)]
pub struct SimScript {
    /// Instances returned by `fleet()`.
    pub fleet: Vec<String>,
    /// Named smoke tests that fail on the idle slot.
    pub smoke_failures: Vec<String>,
    /// Metrics returned by successive `monitor()` calls, in order.
    /// Once exhausted, further windows report healthy metrics.
    pub monitor_results: Vec<RolloutMetrics>,
    /// 1-based health-gate ordinals that report unhealthy.
    pub unhealthy_batches: Vec<usize>,
    /// Verdict of `verify_health()`.
    pub healthy: bool,
    /// Effect names that fail when invoked.
    pub fail_effects: Vec<String>,
    /// Fail the compensation effects (remove_canary, revert_fleet,
    /// revert_release) while leaving forward effects untouched.
    pub fail_compensation: bool,
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            fleet: (1..=4).map(|i| format!("i-{i}")).collect(),
            smoke_failures: Vec::new(),
            monitor_results: Vec::new(),
            unhealthy_batches: Vec::new(),
            healthy: true,
            fail_effects: Vec::new(),
            fail_compensation: false,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    calls: Vec<String>,
    monitor_cursor: usize,
    health_gates: usize,
}

/// Effect driver that executes a [`SimScript`].
#[derive(Debug)]
pub struct SimDriver {
    script: SimScript,
    state: Mutex<SimState>,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new(SimScript::default())
    }
}

impl SimDriver {
    pub fn new(script: SimScript) -> Self {
        Self {
            script,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Every effect invoked so far, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Number of logged calls whose entry starts with `prefix`.
    pub async fn count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    async fn record(&self, name: &str, entry: String) -> anyhow::Result<()> {
        self.state.lock().await.calls.push(entry);
        if self.script.fail_effects.iter().any(|f| f == name) {
            anyhow::bail!("simulated {name} failure");
        }
        Ok(())
    }

    async fn record_compensation(&self, name: &str, entry: String) -> anyhow::Result<()> {
        self.record(name, entry).await?;
        if self.script.fail_compensation {
            anyhow::bail!("simulated compensation failure");
        }
        Ok(())
    }
}

#[async_trait]
impl EffectDriver for SimDriver {
    async fn slot_layout(&self, _environment: Environment) -> anyhow::Result<SlotLayout> {
        self.record("slot_layout", "slot_layout".to_string()).await?;
        Ok(SlotLayout {
            live: "blue".to_string(),
            idle: "green".to_string(),
        })
    }

    async fn deploy_to_slot(&self, slot: &str, version: &ReleaseVersion) -> anyhow::Result<()> {
        self.record("deploy_to_slot", format!("deploy_to_slot:{slot}:{version}"))
            .await
    }

    async fn run_smoke_tests(&self, slot: &str) -> anyhow::Result<SmokeReport> {
        self.record("run_smoke_tests", format!("run_smoke_tests:{slot}"))
            .await?;
        let failures = self.script.smoke_failures.clone();
        let failed = failures.len() as u32;
        Ok(SmokeReport {
            passed: SMOKE_SUITE_SIZE - failed,
            failed,
            failures,
        })
    }

    async fn shift_traffic(&self, slot: &str, percent: u32) -> anyhow::Result<()> {
        self.record("shift_traffic", format!("shift_traffic:{slot}:{percent}"))
            .await
    }

    async fn route_canary(&self, percent: u32) -> anyhow::Result<()> {
        self.record("route_canary", format!("route_canary:{percent}"))
            .await
    }

    async fn remove_canary(&self) -> anyhow::Result<()> {
        self.record_compensation("remove_canary", "remove_canary".to_string())
            .await
    }

    async fn fleet(&self, environment: Environment) -> anyhow::Result<Vec<String>> {
        self.record("fleet", format!("fleet:{environment}")).await?;
        Ok(self.script.fleet.clone())
    }

    async fn update_instances(
        &self,
        instances: &[String],
        _version: &ReleaseVersion,
    ) -> anyhow::Result<()> {
        self.record("update_instances", format!("update_instances:{}", instances.len()))
            .await
    }

    async fn instances_healthy(&self, instances: &[String]) -> anyhow::Result<bool> {
        let gate = {
            let mut state = self.state.lock().await;
            state
                .calls
                .push(format!("instances_healthy:{}", instances.len()));
            state.health_gates += 1;
            state.health_gates
        };
        if self.script.fail_effects.iter().any(|f| f == "instances_healthy") {
            anyhow::bail!("simulated instances_healthy failure");
        }
        Ok(!self.script.unhealthy_batches.contains(&gate))
    }

    async fn revert_fleet(&self, environment: Environment) -> anyhow::Result<()> {
        self.record_compensation("revert_fleet", format!("revert_fleet:{environment}"))
            .await
    }

    async fn deploy_build(
        &self,
        environment: Environment,
        version: &ReleaseVersion,
    ) -> anyhow::Result<()> {
        self.record("deploy_build", format!("deploy_build:{environment}:{version}"))
            .await
    }

    async fn verify_health(&self, environment: Environment) -> anyhow::Result<bool> {
        self.record("verify_health", format!("verify_health:{environment}"))
            .await?;
        Ok(self.script.healthy)
    }

    async fn revert_release(&self, environment: Environment) -> anyhow::Result<()> {
        self.record_compensation("revert_release", format!("revert_release:{environment}"))
            .await
    }

    async fn monitor(&self, window: Duration) -> anyhow::Result<RolloutMetrics> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("monitor:{}", window.as_secs()));
        if self.script.fail_effects.iter().any(|f| f == "monitor") {
            anyhow::bail!("simulated monitor failure");
        }
        let metrics = self
            .script
            .monitor_results
            .get(state.monitor_cursor)
            .copied()
            .unwrap_or(RolloutMetrics {
                error_rate_pct: 0.5,
                p99_latency_ms: 120,
            });
        state.monitor_cursor += 1;
        Ok(metrics)
    }

    async fn hold(&self, pause: Duration) -> anyhow::Result<()> {
        // Simulated time: record the pause, return immediately.
        self.record("hold", format!("hold:{}", pause.as_secs())).await
    }
}
