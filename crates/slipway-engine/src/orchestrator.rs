//! The deployment orchestrator.
//!
//! Drives one submission through validate → preflight → execute →
//! post-validate → record, applying the rollback policy on failure.
//! Record status is advanced before each phase's side effects begin,
//! and every failure leaves the record in a terminal status the caller
//! can read back. Validation failures leave no record at all.

use std::sync::Arc;

use serde::Serialize;
use slipway_core::{
    CriticalAlert, DeploymentId, DeploymentRecord, DeploymentRequest, DeploymentStatus,
    DeploymentSubmission, Environment, ReleaseVersion, RollbackPlan, RollbackPolicy, Strategy,
    config::EngineConfig,
    ports::{AlertSink, Clock, SpanOutcome, Telemetry},
    validate,
};
use slipway_preflight::{Preflight, SignalSource};
use slipway_rollout::{Compensator, EffectDriver, ExecutionError, StrategyExecutor};
use slipway_store::{RecordOutcome, RecordStore, ReleaseMarker};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Success response for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentTicket {
    pub deployment_id: DeploymentId,
    pub status: DeploymentStatus,
    /// Measured execution duration.
    pub estimated_duration_ms: u64,
    /// Prepared during execution; unused on the success path.
    pub rollback_plan: RollbackPlan,
}

/// Orchestrates one deployment run end to end.
pub struct Orchestrator {
    config: EngineConfig,
    store: RecordStore,
    preflight: Preflight,
    executor: StrategyExecutor,
    compensator: Compensator,
    driver: Arc<dyn EffectDriver>,
    telemetry: Arc<dyn Telemetry>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        store: RecordStore,
        signals: Arc<dyn SignalSource>,
        driver: Arc<dyn EffectDriver>,
        telemetry: Arc<dyn Telemetry>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let preflight = Preflight::new(signals, &config.preflight);
        let executor = StrategyExecutor::new(Arc::clone(&driver), config.rollout.clone());
        let compensator = Compensator::new(Arc::clone(&driver));
        Self {
            config,
            store,
            preflight,
            executor,
            compensator,
            driver,
            telemetry,
            alerts,
            clock,
        }
    }

    /// Read access to the record store for the query surface.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Drive one submission to a terminal state.
    pub async fn run(&self, submission: DeploymentSubmission) -> EngineResult<DeploymentTicket> {
        let span = self.telemetry.start_span("deployment");
        let result = self.run_inner(submission).await;
        let outcome = if result.is_ok() {
            SpanOutcome::Success
        } else {
            SpanOutcome::Failure
        };
        self.telemetry.finish_span(span, outcome);
        result
    }

    async fn run_inner(&self, submission: DeploymentSubmission) -> EngineResult<DeploymentTicket> {
        let request = validate(
            &submission,
            self.clock.now_local(),
            self.already_deployed(&submission)?,
            &self.config.validation,
        )?;

        let id: DeploymentId = Uuid::new_v4().to_string();
        let record = DeploymentRecord::new(id.clone(), request.clone(), self.clock.now_utc());
        self.store.create_record(&record)?;
        info!(
            deployment_id = %id,
            strategy = %request.strategy,
            environment = %request.environment,
            version = %request.version,
            initiated_by = %request.initiated_by,
            "deployment accepted"
        );

        // Preflight skipping is strategy-determined: only hotfix skips it.
        if request.strategy == Strategy::Hotfix {
            info!(deployment_id = %id, "hotfix path, preflight skipped");
        } else {
            self.store.transition(&id, DeploymentStatus::Preflight)?;
            let span = self.telemetry.start_span("preflight");
            let report = self.preflight.run(request.environment).await;
            if !report.all_passed {
                self.telemetry.finish_span(span, SpanOutcome::Failure);
                let summary = report.failure_summary();
                self.store.close_record(
                    &id,
                    RecordOutcome::failed(summary.clone(), None, self.clock.now_utc()),
                )?;
                return Err(EngineError::Preflight {
                    deployment_id: id,
                    report,
                    summary,
                });
            }
            self.telemetry.finish_span(span, SpanOutcome::Success);
        }

        self.store.transition(&id, DeploymentStatus::Executing)?;
        let span = self.telemetry.start_span("execute");
        let outcome = match self.executor.execute(&request).await {
            Ok(outcome) => {
                self.telemetry.finish_span(span, SpanOutcome::Success);
                outcome
            }
            Err(failure) => {
                self.telemetry.finish_span(span, SpanOutcome::Failure);
                return Err(self.failure_path(&id, &request, failure).await);
            }
        };

        // Post-validation: one health verification of the final state.
        self.store.transition(&id, DeploymentStatus::PostValidating)?;
        if request.health_checks_enabled {
            let span = self.telemetry.start_span("post_validate");
            let detail = match self.driver.verify_health(request.environment).await {
                Ok(true) => None,
                Ok(false) => Some("health verification failed after rollout".to_string()),
                Err(e) => Some(format!("health verification error: {e}")),
            };
            if let Some(detail) = detail {
                self.telemetry.finish_span(span, SpanOutcome::Failure);
                let failure = ExecutionError::new("post_validate", detail, outcome.plan.clone());
                return Err(self.failure_path(&id, &request, failure).await);
            }
            self.telemetry.finish_span(span, SpanOutcome::Success);
        } else {
            info!(deployment_id = %id, "post-validation disabled by request");
        }

        let completed_at = self.clock.now_utc();
        self.store
            .close_record(&id, RecordOutcome::completed(outcome.result.clone(), completed_at))?;
        self.store.mark_version_deployed(&ReleaseMarker {
            environment: request.environment,
            version: request.version.as_str().to_string(),
            deployment_id: id.clone(),
            recorded_at: completed_at,
        })?;
        info!(
            deployment_id = %id,
            duration_ms = outcome.result.duration.as_millis() as u64,
            "deployment completed"
        );

        Ok(DeploymentTicket {
            deployment_id: id,
            status: DeploymentStatus::Completed,
            estimated_duration_ms: outcome.result.duration.as_millis() as u64,
            rollback_plan: outcome.plan,
        })
    }

    fn already_deployed(&self, submission: &DeploymentSubmission) -> EngineResult<bool> {
        // Unparseable fields fail validation on their own; the lookup
        // only matters for a well-formed environment and version.
        let (Some(environment), Some(version)) = (
            Environment::parse(&submission.environment),
            ReleaseVersion::parse(&submission.version),
        ) else {
            return Ok(false);
        };
        Ok(self.store.version_deployed(environment, version.as_str())?)
    }

    /// Close the record for an execution failure per the rollback policy
    /// and produce the terminal error.
    async fn failure_path(
        &self,
        id: &str,
        request: &DeploymentRequest,
        failure: ExecutionError,
    ) -> EngineError {
        match request.rollback_policy {
            RollbackPolicy::Manual => {
                warn!(
                    deployment_id = %id,
                    phase = %failure.phase,
                    "execution failed; manual policy, rollback plan recorded for the operator"
                );
                let closed = self.store.close_record(
                    id,
                    RecordOutcome::failed(
                        failure.to_string(),
                        Some(failure.plan.clone()),
                        self.clock.now_utc(),
                    ),
                );
                if let Err(e) = closed {
                    return EngineError::Store(e);
                }
                EngineError::Execution {
                    deployment_id: id.to_string(),
                    failure,
                }
            }
            RollbackPolicy::Immediate => {
                let span = self.telemetry.start_span("rollback");
                match self
                    .compensator
                    .compensate(request.environment, failure.clone())
                    .await
                {
                    Ok(rollback) => {
                        self.telemetry.finish_span(span, SpanOutcome::Success);
                        let closed = self.store.close_record(
                            id,
                            RecordOutcome::rolled_back(
                                failure.to_string(),
                                rollback.plan.clone(),
                                self.clock.now_utc(),
                            ),
                        );
                        if let Err(e) = closed {
                            return EngineError::Store(e);
                        }
                        EngineError::RolledBack {
                            deployment_id: id.to_string(),
                            failure,
                            rollback_detail: rollback.detail,
                        }
                    }
                    Err(escalation) => {
                        self.telemetry.finish_span(span, SpanOutcome::Failure);
                        let raised_at = self.clock.now_utc();
                        let closed = self.store.close_record(
                            id,
                            RecordOutcome::rollback_failed(
                                escalation.to_string(),
                                escalation.original.plan.clone(),
                                raised_at,
                            ),
                        );
                        if let Err(e) = closed {
                            return EngineError::Store(e);
                        }
                        let alert = CriticalAlert {
                            deployment_id: id.to_string(),
                            environment: request.environment,
                            strategy: request.strategy,
                            summary: "deployment and rollback both failed, environment state unknown"
                                .to_string(),
                            original_failure: escalation.original.to_string(),
                            rollback_failure: escalation.rollback_failure.clone(),
                            raised_at,
                        };
                        self.raise_alert(&alert).await;
                        EngineError::RollbackFailed {
                            deployment_id: id.to_string(),
                            escalation,
                        }
                    }
                }
            }
        }
    }

    /// Persist and raise exactly one critical alert. Sink errors are
    /// logged, never propagated.
    async fn raise_alert(&self, alert: &CriticalAlert) {
        if let Err(e) = self.store.append_alert(alert) {
            error!(
                deployment_id = %alert.deployment_id,
                error = %e,
                "failed to persist critical alert"
            );
        }
        if let Err(e) = self.alerts.raise(alert).await {
            error!(
                deployment_id = %alert.deployment_id,
                error = %e,
                "alert sink failed"
            );
        }
    }
}
