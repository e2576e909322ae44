//! Strategy executors — blue/green, canary, rolling, hotfix.
//!
//! Each executor drives its phases strictly in order against the
//! [`EffectDriver`], gating progression on smoke results, health
//! verdicts, and monitoring metrics. A failing gate aborts the run
//! immediately; later phases never execute. Every error carries the
//! rollback plan matching the work done so far.

use std::sync::Arc;
use std::time::{Duration, Instant};

use slipway_core::{
    CanaryStageResult, DeploymentRequest, PhaseOutcome, RollbackPlan, Strategy, StrategyResult,
    config::{MonitorThresholds, RolloutConfig},
};
use tracing::{debug, info, warn};

use crate::driver::{EffectDriver, RolloutMetrics};
use crate::error::{ExecutionError, ExecutionResult};

/// Result of a successful strategy run: the outcome payload for the
/// record plus the rollback plan prepared in case it is needed later.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub result: StrategyResult,
    pub plan: RollbackPlan,
}

/// Dispatches a validated request to its strategy implementation.
pub struct StrategyExecutor {
    driver: Arc<dyn EffectDriver>,
    config: RolloutConfig,
}

impl StrategyExecutor {
    pub fn new(driver: Arc<dyn EffectDriver>, config: RolloutConfig) -> Self {
        Self { driver, config }
    }

    /// Run the request's strategy to completion.
    pub async fn execute(&self, request: &DeploymentRequest) -> ExecutionResult<StrategyOutcome> {
        info!(
            strategy = %request.strategy,
            environment = %request.environment,
            version = %request.version,
            "executing rollout strategy"
        );
        let outcome = match request.strategy {
            Strategy::BlueGreen => self.blue_green(request).await,
            Strategy::Canary => self.canary(request).await,
            Strategy::Rolling => self.rolling(request).await,
            Strategy::Hotfix => self.hotfix(request).await,
        }?;
        info!(
            strategy = %request.strategy,
            phases = outcome.result.phases.len(),
            duration_ms = outcome.result.duration.as_millis() as u64,
            "strategy completed"
        );
        Ok(outcome)
    }

    // ── Blue/green ─────────────────────────────────────────────────

    async fn blue_green(&self, request: &DeploymentRequest) -> ExecutionResult<StrategyOutcome> {
        let cfg = &self.config.blue_green;
        let started = Instant::now();
        let mut phases = Vec::new();

        // Before the layout is known there is no slot to switch back to.
        let layout = self
            .driver
            .slot_layout(request.environment)
            .await
            .map_err(|e| {
                ExecutionError::new("slot_layout", e.to_string(), RollbackPlan::immediate_rollback())
            })?;
        phases.push(PhaseOutcome {
            phase: "slot_layout".to_string(),
            detail: format!("live slot {}, idle slot {}", layout.live, layout.idle),
        });

        let plan = RollbackPlan::switch_traffic(layout.idle.clone(), layout.live.clone());

        self.driver
            .deploy_to_slot(&layout.idle, &request.version)
            .await
            .map_err(|e| ExecutionError::new("deploy_idle_slot", e.to_string(), plan.clone()))?;
        phases.push(PhaseOutcome {
            phase: "deploy_idle_slot".to_string(),
            detail: format!("version {} installed on {}", request.version, layout.idle),
        });

        let smoke = self
            .driver
            .run_smoke_tests(&layout.idle)
            .await
            .map_err(|e| ExecutionError::new("smoke_tests", e.to_string(), plan.clone()))?;
        if !smoke.all_passed() {
            warn!(slot = %layout.idle, failed = smoke.failed, "smoke tests failed");
            return Err(ExecutionError::new(
                "smoke_tests",
                format!(
                    "{} of {} smoke tests failed: {}",
                    smoke.failed,
                    smoke.total(),
                    smoke.failures.join(", ")
                ),
                plan,
            ));
        }
        phases.push(PhaseOutcome {
            phase: "smoke_tests".to_string(),
            detail: format!("{} smoke tests passed", smoke.passed),
        });

        let steps = &cfg.traffic_steps;
        for (index, step) in steps.iter().enumerate() {
            let phase = format!("traffic_step_{step}");
            self.driver
                .shift_traffic(&layout.idle, *step)
                .await
                .map_err(|e| ExecutionError::new(phase.clone(), e.to_string(), plan.clone()))?;
            debug!(slot = %layout.idle, percent = step, "traffic shifted");
            phases.push(PhaseOutcome {
                phase,
                detail: format!("{step}% of traffic on {}", layout.idle),
            });
            if index + 1 < steps.len() {
                self.driver
                    .hold(Duration::from_secs(cfg.step_pause_secs))
                    .await
                    .map_err(|e| ExecutionError::new("step_pause", e.to_string(), plan.clone()))?;
            }
        }

        // Hold window: watch the majority-traffic side before cutover.
        let window = Duration::from_secs(cfg.hold_window_secs);
        let metrics = self
            .driver
            .monitor(window)
            .await
            .map_err(|e| ExecutionError::new("hold_window", e.to_string(), plan.clone()))?;
        if let Err(detail) = metrics_within(&metrics, &self.config.monitor) {
            warn!(slot = %layout.idle, %detail, "hold window metrics failed");
            return Err(ExecutionError::new("hold_window", detail, plan));
        }
        phases.push(PhaseOutcome {
            phase: "hold_window".to_string(),
            detail: format!(
                "held {}s, error rate {:.2}%, p99 {}ms",
                cfg.hold_window_secs, metrics.error_rate_pct, metrics.p99_latency_ms
            ),
        });

        self.driver
            .shift_traffic(&layout.idle, 100)
            .await
            .map_err(|e| ExecutionError::new("cutover", e.to_string(), plan.clone()))?;
        phases.push(PhaseOutcome {
            phase: "cutover".to_string(),
            detail: format!("all traffic on {}", layout.idle),
        });

        Ok(StrategyOutcome {
            result: StrategyResult {
                strategy: Strategy::BlueGreen,
                duration: started.elapsed(),
                phases,
            },
            plan,
        })
    }

    // ── Canary ─────────────────────────────────────────────────────

    async fn canary(&self, request: &DeploymentRequest) -> ExecutionResult<StrategyOutcome> {
        let plan = RollbackPlan::remove_canary();
        let started = Instant::now();
        let mut phases = Vec::new();
        debug!(version = %request.version, stages = self.config.canary.stages.len(), "starting canary ramp");

        for (index, stage) in self.config.canary.stages.iter().enumerate() {
            let phase = format!("canary_stage_{}", index + 1);
            self.driver
                .route_canary(stage.traffic_percent)
                .await
                .map_err(|e| ExecutionError::new(phase.clone(), e.to_string(), plan.clone()))?;

            let window = Duration::from_secs(stage.monitor_secs);
            let metrics = self
                .driver
                .monitor(window)
                .await
                .map_err(|e| ExecutionError::new(phase.clone(), e.to_string(), plan.clone()))?;
            if let Err(detail) = metrics_within(&metrics, &self.config.monitor) {
                // A failing stage aborts the ramp; later stages never run.
                warn!(stage = index + 1, percent = stage.traffic_percent, %detail, "canary stage failed");
                return Err(ExecutionError::new(phase, detail, plan));
            }
            debug!(stage = index + 1, percent = stage.traffic_percent, "canary stage passed");
            let completed = CanaryStageResult {
                traffic_percent: stage.traffic_percent,
                monitor: window,
                metrics_passed: true,
            };
            phases.push(PhaseOutcome {
                phase,
                detail: stage_summary(&completed),
            });
        }

        Ok(StrategyOutcome {
            result: StrategyResult {
                strategy: Strategy::Canary,
                duration: started.elapsed(),
                phases,
            },
            plan,
        })
    }

    // ── Rolling ────────────────────────────────────────────────────

    async fn rolling(&self, request: &DeploymentRequest) -> ExecutionResult<StrategyOutcome> {
        let cfg = &self.config.rolling;
        let started = Instant::now();
        let mut phases = Vec::new();

        let fleet = self
            .driver
            .fleet(request.environment)
            .await
            .map_err(|e| {
                ExecutionError::new("fleet", e.to_string(), self.rolling_plan(started.elapsed()))
            })?;
        if fleet.is_empty() {
            return Err(ExecutionError::new(
                "fleet",
                "fleet is empty, nothing to update",
                self.rolling_plan(started.elapsed()),
            ));
        }

        let batch_size = ((fleet.len() as f64 * cfg.batch_fraction).floor() as usize).max(1);
        let total_batches = fleet.len().div_ceil(batch_size);
        debug!(
            instances = fleet.len(),
            batch_size, total_batches, "rolling update planned"
        );

        for (index, batch) in fleet.chunks(batch_size).enumerate() {
            let batch_no = index + 1;
            let phase = format!("batch_{batch_no}");

            self.driver
                .update_instances(batch, &request.version)
                .await
                .map_err(|e| {
                    ExecutionError::new(
                        phase.clone(),
                        e.to_string(),
                        self.rolling_plan(started.elapsed()),
                    )
                })?;

            let healthy = self
                .driver
                .instances_healthy(batch)
                .await
                .map_err(|e| {
                    ExecutionError::new(
                        phase.clone(),
                        e.to_string(),
                        self.rolling_plan(started.elapsed()),
                    )
                })?;
            if !healthy {
                warn!(batch = batch_no, total_batches, "batch failed health gate");
                return Err(ExecutionError::new(
                    phase,
                    format!(
                        "batch {batch_no}/{total_batches} failed health verification ({} instances)",
                        batch.len()
                    ),
                    self.rolling_plan(started.elapsed()),
                ));
            }
            phases.push(PhaseOutcome {
                phase,
                detail: format!("{} instances updated and healthy", batch.len()),
            });

            if batch_no < total_batches {
                self.driver
                    .hold(Duration::from_secs(cfg.batch_pause_secs))
                    .await
                    .map_err(|e| {
                        ExecutionError::new(
                            "batch_pause",
                            e.to_string(),
                            self.rolling_plan(started.elapsed()),
                        )
                    })?;
            }
        }

        let plan = self.rolling_plan(started.elapsed());
        Ok(StrategyOutcome {
            result: StrategyResult {
                strategy: Strategy::Rolling,
                duration: started.elapsed(),
                phases,
            },
            plan,
        })
    }

    /// Rolling rollback plan with the time estimate scaled from the
    /// execution time spent so far.
    fn rolling_plan(&self, elapsed: Duration) -> RollbackPlan {
        let estimated = Duration::from_secs_f64(
            elapsed.as_secs_f64() * self.config.rolling.rollback_estimate_factor,
        );
        RollbackPlan::rolling_rollback(estimated)
    }

    // ── Hotfix ─────────────────────────────────────────────────────

    async fn hotfix(&self, request: &DeploymentRequest) -> ExecutionResult<StrategyOutcome> {
        let plan = RollbackPlan::immediate_rollback();
        let started = Instant::now();
        let mut phases = Vec::new();

        // Only builds tagged as hotfixes may take the expedited path.
        if !request.version.is_hotfix_build() {
            return Err(ExecutionError::new(
                "hotfix_guard",
                format!(
                    "version {} does not carry a hotfix prerelease tag",
                    request.version
                ),
                plan,
            ));
        }
        phases.push(PhaseOutcome {
            phase: "hotfix_guard".to_string(),
            detail: format!("version {} carries hotfix tag", request.version),
        });

        self.driver
            .deploy_build(request.environment, &request.version)
            .await
            .map_err(|e| ExecutionError::new("deploy_build", e.to_string(), plan.clone()))?;
        phases.push(PhaseOutcome {
            phase: "deploy_build".to_string(),
            detail: format!("version {} deployed to {}", request.version, request.environment),
        });

        let healthy = self
            .driver
            .verify_health(request.environment)
            .await
            .map_err(|e| ExecutionError::new("verify_health", e.to_string(), plan.clone()))?;
        if !healthy {
            warn!(environment = %request.environment, "health verification failed after hotfix");
            return Err(ExecutionError::new(
                "verify_health",
                "health verification failed after hotfix deploy",
                plan,
            ));
        }
        phases.push(PhaseOutcome {
            phase: "verify_health".to_string(),
            detail: "health verified".to_string(),
        });

        Ok(StrategyOutcome {
            result: StrategyResult {
                strategy: Strategy::Hotfix,
                duration: started.elapsed(),
                phases,
            },
            plan,
        })
    }
}

/// Render one completed ramp step for the phase history.
fn stage_summary(stage: &CanaryStageResult) -> String {
    format!(
        "{}% for {}s, metrics {}",
        stage.traffic_percent,
        stage.monitor.as_secs(),
        if stage.metrics_passed {
            "passed"
        } else {
            "failed"
        }
    )
}

/// Check window metrics against the configured ceilings. The error
/// names every violated ceiling.
pub(crate) fn metrics_within(
    metrics: &RolloutMetrics,
    limits: &MonitorThresholds,
) -> Result<(), String> {
    let mut violations = Vec::new();
    if metrics.error_rate_pct > limits.max_error_rate_pct {
        violations.push(format!(
            "error rate {:.2}% above ceiling {:.2}%",
            metrics.error_rate_pct, limits.max_error_rate_pct
        ));
    }
    if metrics.p99_latency_ms > limits.max_p99_latency_ms {
        violations.push(format!(
            "p99 latency {}ms above ceiling {}ms",
            metrics.p99_latency_ms, limits.max_p99_latency_ms
        ));
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations.join("; "))
    }
}
