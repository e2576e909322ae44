//! Error types for strategy execution and rollback compensation.

use slipway_core::RollbackPlan;
use thiserror::Error;

/// Result type alias for strategy execution.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// A strategy phase that failed after side effects may have run.
///
/// Carries the compensating plan the executor prepared for the work
/// done up to the failing phase.
#[derive(Debug, Clone, Error)]
#[error("{phase}: {detail}")]
pub struct ExecutionError {
    /// The phase that failed (`smoke_tests`, `canary_stage_2`, `batch_3`, ...).
    pub phase: String,
    pub detail: String,
    pub plan: RollbackPlan,
}

impl ExecutionError {
    pub fn new(phase: impl Into<String>, detail: impl Into<String>, plan: RollbackPlan) -> Self {
        Self {
            phase: phase.into(),
            detail: detail.into(),
            plan,
        }
    }
}

/// Both the deployment and its compensation failed. The environment is
/// in an unknown state and needs an operator.
#[derive(Debug, Clone, Error)]
#[error("deployment failed ({original}); rollback failed ({rollback_failure})")]
pub struct CriticalEscalation {
    pub original: ExecutionError,
    pub rollback_failure: String,
}
