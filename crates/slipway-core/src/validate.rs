//! Submission validation.
//!
//! Turns a raw [`DeploymentSubmission`] into a well-typed
//! [`DeploymentRequest`], rejecting on the first violation. Checks run
//! in a fixed order so callers see stable, predictable errors:
//! environment, strategy, version syntax, rollback policy, duplicate
//! version, then the production change freeze.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::config::ValidationConfig;
use crate::types::{
    DeploymentRequest, DeploymentSubmission, Environment, ReleaseVersion, RollbackPolicy, Strategy,
};

/// A submission rejected before any side effect ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown environment '{0}', expected one of: development, staging, production")]
    InvalidEnvironment(String),

    #[error("unsupported deployment strategy '{0}', expected one of: blue_green, canary, rolling, hotfix")]
    UnsupportedStrategy(String),

    #[error("version '{0}' is not a valid release version (expected MAJOR.MINOR.PATCH with optional -prerelease)")]
    InvalidVersion(String),

    #[error("unknown rollback strategy '{0}', expected one of: immediate, manual")]
    InvalidRollbackPolicy(String),

    #[error("version {version} is already deployed to {environment}")]
    DuplicateVersion {
        version: String,
        environment: Environment,
    },

    #[error("deployments to production are frozen during {window} (now: {now})")]
    OutsideMaintenanceWindow { window: String, now: String },
}

impl ValidationError {
    /// Stable machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidEnvironment(_) => "invalid_environment",
            ValidationError::UnsupportedStrategy(_) => "unsupported_strategy",
            ValidationError::InvalidVersion(_) => "invalid_version",
            ValidationError::InvalidRollbackPolicy(_) => "invalid_rollback_policy",
            ValidationError::DuplicateVersion { .. } => "duplicate_version",
            ValidationError::OutsideMaintenanceWindow { .. } => "deployment_frozen",
        }
    }
}

/// Validate a raw submission and produce a typed request with defaults
/// applied. `version_already_deployed` is the store's answer for the
/// submission's (environment, version) pair; `now_local` is the wall
/// clock used for the freeze window.
pub fn validate(
    submission: &DeploymentSubmission,
    now_local: NaiveDateTime,
    version_already_deployed: bool,
    config: &ValidationConfig,
) -> Result<DeploymentRequest, ValidationError> {
    let environment = Environment::parse(&submission.environment)
        .ok_or_else(|| ValidationError::InvalidEnvironment(submission.environment.clone()))?;

    let strategy = Strategy::parse(&submission.deployment_type)
        .ok_or_else(|| ValidationError::UnsupportedStrategy(submission.deployment_type.clone()))?;

    let version = ReleaseVersion::parse(&submission.version)
        .ok_or_else(|| ValidationError::InvalidVersion(submission.version.clone()))?;

    let rollback_policy = match &submission.rollback_strategy {
        Some(raw) => RollbackPolicy::parse(raw)
            .ok_or_else(|| ValidationError::InvalidRollbackPolicy(raw.clone()))?,
        None => config.default_rollback_policy,
    };

    if version_already_deployed {
        return Err(ValidationError::DuplicateVersion {
            version: version.as_str().to_string(),
            environment,
        });
    }

    if environment == Environment::Production && config.freeze.covers(now_local) {
        let bypass = strategy == Strategy::Hotfix && config.hotfix_bypasses_freeze;
        if !bypass {
            return Err(ValidationError::OutsideMaintenanceWindow {
                window: config.freeze.describe(),
                now: now_local.format("%Y-%m-%d %H:%M").to_string(),
            });
        }
    }

    Ok(DeploymentRequest {
        strategy,
        environment,
        version,
        rollback_policy,
        health_checks_enabled: submission.health_checks.unwrap_or(config.default_health_checks),
        approval_required: submission
            .approval_required
            .unwrap_or(config.default_approval_required),
        initiated_by: submission.initiated_by.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn submission() -> DeploymentSubmission {
        DeploymentSubmission {
            deployment_type: "canary".to_string(),
            environment: "staging".to_string(),
            version: "2.1.0".to_string(),
            rollback_strategy: Some("manual".to_string()),
            health_checks: Some(true),
            approval_required: Some(false),
            initiated_by: "deploy-bot".to_string(),
        }
    }

    fn weekday_noon() -> NaiveDateTime {
        // Wednesday, inside the default freeze window.
        NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn saturday_noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 8)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn accepts_well_formed_submission() {
        let request = validate(
            &submission(),
            weekday_noon(),
            false,
            &ValidationConfig::default(),
        )
        .unwrap();

        assert_eq!(request.strategy, Strategy::Canary);
        assert_eq!(request.environment, Environment::Staging);
        assert_eq!(request.version.as_str(), "2.1.0");
        assert_eq!(request.rollback_policy, RollbackPolicy::Manual);
        assert!(request.health_checks_enabled);
        assert!(!request.approval_required);
        assert_eq!(request.initiated_by, "deploy-bot");
    }

    #[test]
    fn rejects_unknown_environment() {
        let mut sub = submission();
        sub.environment = "qa".to_string();
        let err = validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidEnvironment("qa".to_string()));
        assert_eq!(err.code(), "invalid_environment");
    }

    #[test]
    fn rejects_unknown_strategy() {
        let mut sub = submission();
        sub.deployment_type = "big_bang".to_string();
        let err = validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedStrategy("big_bang".to_string())
        );
    }

    #[test]
    fn rejects_malformed_version() {
        for bad in ["2.1", "v2.1.0", "2.1.0.4", "latest", ""] {
            let mut sub = submission();
            sub.version = bad.to_string();
            let err =
                validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap_err();
            assert_eq!(err, ValidationError::InvalidVersion(bad.to_string()), "{bad}");
        }
    }

    #[test]
    fn rejects_unknown_rollback_policy() {
        let mut sub = submission();
        sub.rollback_strategy = Some("yolo".to_string());
        let err = validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap_err();
        assert_eq!(err.code(), "invalid_rollback_policy");
    }

    #[test]
    fn environment_outranks_version_in_check_order() {
        // Both fields are bad; the environment error wins.
        let mut sub = submission();
        sub.environment = "qa".to_string();
        sub.version = "nope".to_string();
        let err = validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap_err();
        assert_eq!(err.code(), "invalid_environment");
    }

    #[test]
    fn rejects_duplicate_version() {
        let err = validate(
            &submission(),
            weekday_noon(),
            true,
            &ValidationConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateVersion {
                version: "2.1.0".to_string(),
                environment: Environment::Staging,
            }
        );
        assert_eq!(err.code(), "duplicate_version");
    }

    #[test]
    fn production_frozen_during_business_hours() {
        let mut sub = submission();
        sub.environment = "production".to_string();
        let err = validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap_err();
        assert_eq!(err.code(), "deployment_frozen");
    }

    #[test]
    fn production_allowed_on_weekend() {
        let mut sub = submission();
        sub.environment = "production".to_string();
        let request = validate(&sub, saturday_noon(), false, &ValidationConfig::default()).unwrap();
        assert_eq!(request.environment, Environment::Production);
    }

    #[test]
    fn staging_ignores_freeze_window() {
        // submission() targets staging; weekday noon is inside the freeze.
        assert!(validate(&submission(), weekday_noon(), false, &ValidationConfig::default()).is_ok());
    }

    #[test]
    fn hotfix_bypasses_freeze_by_default() {
        let mut sub = submission();
        sub.deployment_type = "hotfix".to_string();
        sub.environment = "production".to_string();
        sub.version = "2.1.1-hotfix.1".to_string();

        let request = validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap();
        assert_eq!(request.strategy, Strategy::Hotfix);
    }

    #[test]
    fn hotfix_bypass_can_be_disabled() {
        let mut sub = submission();
        sub.deployment_type = "hotfix".to_string();
        sub.environment = "production".to_string();
        sub.version = "2.1.1-hotfix.1".to_string();

        let config = ValidationConfig {
            hotfix_bypasses_freeze: false,
            ..ValidationConfig::default()
        };
        let err = validate(&sub, weekday_noon(), false, &config).unwrap_err();
        assert_eq!(err.code(), "deployment_frozen");
    }

    #[test]
    fn omitted_fields_take_config_defaults() {
        let sub = DeploymentSubmission {
            deployment_type: "rolling".to_string(),
            environment: "development".to_string(),
            version: "0.9.0".to_string(),
            rollback_strategy: None,
            health_checks: None,
            approval_required: None,
            initiated_by: "ci".to_string(),
        };
        let request =
            validate(&sub, weekday_noon(), false, &ValidationConfig::default()).unwrap();
        assert_eq!(request.rollback_policy, RollbackPolicy::Immediate);
        assert!(request.health_checks_enabled);
        assert!(request.approval_required);
    }
}
