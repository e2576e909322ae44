//! Terminal failures of an orchestration run.

use slipway_core::{DeploymentId, DeploymentStatus, PreflightReport, ValidationError};
use slipway_rollout::{CriticalEscalation, ExecutionError};
use slipway_store::StoreError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Why a run did not complete.
///
/// Variants that reach the record store carry the record id; the
/// terminal status the record was left in is recoverable through
/// [`EngineError::terminal_status`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submission never became a request; no record exists.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// One or more preflight checks failed; the record closed as `failed`
    /// before any infrastructure was touched.
    #[error("preflight checks failed for {deployment_id}: {summary}")]
    Preflight {
        deployment_id: DeploymentId,
        report: PreflightReport,
        summary: String,
    },

    /// Execution failed under the manual rollback policy. The rollback
    /// plan is embedded in the record for the operator.
    #[error("execution failed for {deployment_id}: {failure}")]
    Execution {
        deployment_id: DeploymentId,
        failure: ExecutionError,
    },

    /// Execution failed and the automatic rollback completed.
    #[error("deployment {deployment_id} rolled back: {failure}")]
    RolledBack {
        deployment_id: DeploymentId,
        failure: ExecutionError,
        rollback_detail: String,
    },

    /// Execution and rollback both failed. Operator intervention needed.
    #[error("{escalation}")]
    RollbackFailed {
        deployment_id: DeploymentId,
        escalation: CriticalEscalation,
    },

    /// The record store rejected an operation mid-run.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Stable machine-readable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Preflight { .. } => "preflight_failed",
            Self::Execution { .. } => "execution_failed",
            Self::RolledBack { .. } => "rolled_back",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::Store(_) => "store_error",
        }
    }

    /// Terminal status of the record this failure left behind, if a
    /// record was created at all.
    pub fn terminal_status(&self) -> Option<DeploymentStatus> {
        match self {
            Self::Validation(_) | Self::Store(_) => None,
            Self::Preflight { .. } | Self::Execution { .. } => Some(DeploymentStatus::Failed),
            Self::RolledBack { .. } => Some(DeploymentStatus::RolledBack),
            Self::RollbackFailed { .. } => Some(DeploymentStatus::RollbackFailed),
        }
    }
}
