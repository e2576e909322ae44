//! Automatic rollback after a failed strategy run.
//!
//! The compensator executes the rollback plan attached to the
//! execution failure, once. A compensation error is never retried;
//! it escalates immediately with both failures attached so an
//! operator sees the full picture.

use std::sync::Arc;
use std::time::{Duration, Instant};

use slipway_core::{Environment, RollbackAction, RollbackPlan};
use tracing::{error, info, warn};

use crate::driver::EffectDriver;
use crate::error::{CriticalEscalation, ExecutionError};

/// What a successful compensation did.
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    pub plan: RollbackPlan,
    pub detail: String,
    pub duration: Duration,
}

pub struct Compensator {
    driver: Arc<dyn EffectDriver>,
}

impl Compensator {
    pub fn new(driver: Arc<dyn EffectDriver>) -> Self {
        Self { driver }
    }

    /// Execute the failure's rollback plan. Exactly one attempt.
    pub async fn compensate(
        &self,
        environment: Environment,
        failure: ExecutionError,
    ) -> Result<RollbackOutcome, CriticalEscalation> {
        let plan = failure.plan.clone();
        warn!(
            %environment,
            action = %plan.action,
            phase = %failure.phase,
            "compensating failed deployment"
        );
        let started = Instant::now();

        let attempt = self.apply(environment, &plan).await;
        match attempt {
            Ok(detail) => {
                info!(%environment, action = %plan.action, %detail, "rollback completed");
                Ok(RollbackOutcome {
                    plan,
                    detail,
                    duration: started.elapsed(),
                })
            }
            Err(rollback_failure) => {
                let rollback_failure = format!("{}: {rollback_failure}", plan.action);
                error!(
                    %environment,
                    action = %plan.action,
                    failure = %rollback_failure,
                    "rollback failed, escalating"
                );
                Err(CriticalEscalation {
                    original: failure,
                    rollback_failure,
                })
            }
        }
    }

    async fn apply(&self, environment: Environment, plan: &RollbackPlan) -> Result<String, String> {
        match plan.action {
            RollbackAction::SwitchTraffic => {
                let restore = plan
                    .to
                    .as_deref()
                    .ok_or_else(|| "rollback plan names no slot to restore".to_string())?;
                self.driver
                    .shift_traffic(restore, 100)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(format!("all traffic restored to {restore}"))
            }
            RollbackAction::RemoveCanary => {
                self.driver.remove_canary().await.map_err(|e| e.to_string())?;
                Ok("canary instances removed, traffic restored to stable".to_string())
            }
            RollbackAction::RollingRollback => {
                self.driver
                    .revert_fleet(environment)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(format!("fleet in {environment} reverted to previous version"))
            }
            RollbackAction::ImmediateRollback => {
                self.driver
                    .revert_release(environment)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(format!("release in {environment} reverted to previous version"))
            }
        }
    }
}
