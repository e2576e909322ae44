//! Domain types for the Slipway deployment engine.
//!
//! These types flow through the whole engine: the raw submission arriving
//! at the boundary, the validated request, the persisted deployment record,
//! and the ephemeral per-phase results. All persisted types are
//! serializable to/from JSON with snake_case wire forms.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Unique identifier for one deployment run, assigned at acceptance.
pub type DeploymentId = String;

// ── Strategy / environment / policy ───────────────────────────────

/// Rollout strategy for a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    BlueGreen,
    Canary,
    Rolling,
    Hotfix,
}

impl Strategy {
    /// Parse the wire form (`blue_green`, `canary`, `rolling`, `hotfix`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blue_green" => Some(Self::BlueGreen),
            "canary" => Some(Self::Canary),
            "rolling" => Some(Self::Rolling),
            "hotfix" => Some(Self::Hotfix),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BlueGreen => "blue_green",
            Self::Canary => "canary",
            Self::Rolling => "rolling",
            Self::Hotfix => "hotfix",
        };
        f.write_str(s)
    }
}

/// Target environment for a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse the wire form (`development`, `staging`, `production`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "development" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        };
        f.write_str(s)
    }
}

/// What to do when strategy execution fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Compensate automatically, exactly once.
    Immediate,
    /// Record the failure and the prepared plan; an operator rolls back.
    Manual,
}

impl RollbackPolicy {
    /// Parse the wire form (`immediate`, `manual`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "immediate" => Some(Self::Immediate),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for RollbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Immediate => "immediate",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

// ── Release version ───────────────────────────────────────────────

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_regex() -> &'static Regex {
    VERSION_RE.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([\w.]+))?$").expect("version pattern is valid")
    })
}

/// A validated release version: `MAJOR.MINOR.PATCH` with an optional
/// prerelease tag (`2.1.0`, `2.1.0-rc.1`, `1.4.2-hotfix.3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseVersion {
    raw: String,
    prerelease: Option<String>,
}

impl ReleaseVersion {
    /// Parse and validate a version string. Leading `v` is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = version_regex().captures(s)?;
        Some(Self {
            raw: s.to_string(),
            prerelease: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// The full version string as submitted.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The prerelease tag, if any (`rc.1` in `2.1.0-rc.1`).
    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    /// Whether the prerelease tag marks this as a hotfix build.
    pub fn is_hotfix_build(&self) -> bool {
        self.prerelease
            .as_deref()
            .is_some_and(|tag| tag.starts_with("hotfix"))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("not a valid release version: {s}"))
    }
}

impl From<ReleaseVersion> for String {
    fn from(v: ReleaseVersion) -> Self {
        v.raw
    }
}

// ── Submission / request ──────────────────────────────────────────

/// Raw deployment request as it arrives at the engine boundary.
///
/// Optional fields default from [`crate::config::ValidationConfig`] during
/// validation, so every default lives in one place. `initiated_by` is the
/// authenticated actor identifier injected by the caller's auth layer; the
/// engine treats it as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSubmission {
    pub deployment_type: String,
    pub environment: String,
    pub version: String,
    #[serde(default)]
    pub rollback_strategy: Option<String>,
    #[serde(default)]
    pub health_checks: Option<bool>,
    #[serde(default)]
    pub approval_required: Option<bool>,
    #[serde(default)]
    pub initiated_by: String,
}

/// A validated deployment request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub strategy: Strategy,
    pub environment: Environment,
    pub version: ReleaseVersion,
    pub rollback_policy: RollbackPolicy,
    pub health_checks_enabled: bool,
    /// Consumed by an external approval gate, not evaluated here.
    pub approval_required: bool,
    pub initiated_by: String,
}

// ── Record lifecycle ──────────────────────────────────────────────

/// Lifecycle status of a deployment record.
///
/// Terminal statuses never transition again, and a record's status never
/// moves backwards through the phase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Preflight,
    Executing,
    PostValidating,
    Completed,
    Failed,
    RolledBack,
    RollbackFailed,
}

impl DeploymentStatus {
    /// Whether this status ends the record's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::RolledBack | Self::RollbackFailed
        )
    }

    /// Whether this is a failure-side terminal status (the only statuses
    /// under which a record may carry a rollback plan).
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::RolledBack | Self::RollbackFailed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Preflight => 1,
            Self::Executing => 2,
            Self::PostValidating => 3,
            Self::Completed | Self::Failed | Self::RolledBack | Self::RollbackFailed => 4,
        }
    }

    /// Whether a transition from `self` to `next` is legal: terminal
    /// statuses are frozen, and the phase order never regresses. Phases
    /// may be skipped (hotfix goes straight from pending to executing).
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Preflight => "preflight",
            Self::Executing => "executing",
            Self::PostValidating => "post_validating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
            Self::RollbackFailed => "rollback_failed",
        };
        f.write_str(s)
    }
}

/// Append-only record of one deployment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub status: DeploymentStatus,
    pub request: DeploymentRequest,
    /// Strategy outcome, present once the run completed.
    pub strategy_result: Option<StrategyResult>,
    /// Compensating-action descriptor. Populated only on failure-side
    /// terminal statuses.
    pub rollback_plan: Option<RollbackPlan>,
    /// Human-readable failure summary for failure-side statuses.
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    /// Create a fresh record in `pending`, before any side effect runs.
    pub fn new(id: DeploymentId, request: DeploymentRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: DeploymentStatus::Pending,
            request,
            strategy_result: None,
            rollback_plan: None,
            failure: None,
            created_at,
            completed_at: None,
        }
    }
}

// ── Preflight results ─────────────────────────────────────────────

/// Outcome of a single preflight check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub critical: bool,
    pub passed: bool,
    pub detail: String,
    pub duration: Duration,
}

/// Aggregated preflight outcome across all checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub results: Vec<CheckResult>,
    pub all_passed: bool,
}

impl PreflightReport {
    /// Build a report from individual results; `all_passed` is the
    /// conjunction over every result regardless of criticality.
    pub fn from_results(results: Vec<CheckResult>) -> Self {
        let all_passed = results.iter().all(|r| r.passed);
        Self {
            results,
            all_passed,
        }
    }

    /// The results that failed, in check order.
    pub fn failing(&self) -> Vec<&CheckResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    /// One message enumerating every failing check, so the caller sees
    /// the complete failure picture in one round trip.
    pub fn failure_summary(&self) -> String {
        self.failing()
            .iter()
            .map(|r| format!("{}: {}", r.name, r.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Strategy results ──────────────────────────────────────────────

/// One canary ramp step's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanaryStageResult {
    pub traffic_percent: u32,
    pub monitor: Duration,
    pub metrics_passed: bool,
}

/// One completed phase in a strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: String,
    pub detail: String,
}

/// Strategy-specific outcome payload: measured duration plus the
/// phase-by-phase history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy: Strategy,
    pub duration: Duration,
    pub phases: Vec<PhaseOutcome>,
}

// ── Rollback plan ─────────────────────────────────────────────────

/// Kind of compensating action a failed strategy run is undone with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    SwitchTraffic,
    RemoveCanary,
    RollingRollback,
    ImmediateRollback,
}

impl fmt::Display for RollbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SwitchTraffic => "switch_traffic",
            Self::RemoveCanary => "remove_canary",
            Self::RollingRollback => "rolling_rollback",
            Self::ImmediateRollback => "immediate_rollback",
        };
        f.write_str(s)
    }
}

/// Compensating-action descriptor derived by the strategy executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub action: RollbackAction,
    /// Traffic source label (the side being abandoned), for traffic switches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Traffic target label (the side being restored), for traffic switches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Estimated time the compensating action will take.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated: Option<Duration>,
}

impl RollbackPlan {
    pub fn switch_traffic(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            action: RollbackAction::SwitchTraffic,
            from: Some(from.into()),
            to: Some(to.into()),
            estimated: None,
        }
    }

    pub fn remove_canary() -> Self {
        Self {
            action: RollbackAction::RemoveCanary,
            from: None,
            to: None,
            estimated: None,
        }
    }

    pub fn rolling_rollback(estimated: Duration) -> Self {
        Self {
            action: RollbackAction::RollingRollback,
            from: None,
            to: None,
            estimated: Some(estimated),
        }
    }

    pub fn immediate_rollback() -> Self {
        Self {
            action: RollbackAction::ImmediateRollback,
            from: None,
            to: None,
            estimated: None,
        }
    }
}

// ── Critical alerts ───────────────────────────────────────────────

/// Raised when both the forward operation and its compensation failed.
/// Requires manual operator intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalAlert {
    pub deployment_id: DeploymentId,
    pub environment: Environment,
    pub strategy: Strategy,
    pub summary: String,
    pub original_failure: String,
    pub rollback_failure: String,
    pub raised_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_wire_forms_roundtrip() {
        for (s, v) in [
            ("blue_green", Strategy::BlueGreen),
            ("canary", Strategy::Canary),
            ("rolling", Strategy::Rolling),
            ("hotfix", Strategy::Hotfix),
        ] {
            assert_eq!(Strategy::parse(s), Some(v));
            assert_eq!(v.to_string(), s);
            assert_eq!(serde_json::to_string(&v).unwrap(), format!("\"{s}\""));
        }
        assert_eq!(Strategy::parse("big_bang"), None);
    }

    #[test]
    fn version_accepts_spec_pattern() {
        for ok in ["2.1.0", "2.1.0-rc.1", "0.0.1", "10.20.30-hotfix.2"] {
            assert!(ReleaseVersion::parse(ok).is_some(), "{ok} should parse");
        }
        for bad in ["2.1", "v2.1.0", "2.1.0.4", "2.1.0-", "abc", ""] {
            assert!(ReleaseVersion::parse(bad).is_none(), "{bad} should fail");
        }
    }

    #[test]
    fn version_prerelease_extraction() {
        let v = ReleaseVersion::parse("2.1.0-rc.1").unwrap();
        assert_eq!(v.prerelease(), Some("rc.1"));
        assert!(!v.is_hotfix_build());

        let v = ReleaseVersion::parse("2.1.1-hotfix.3").unwrap();
        assert_eq!(v.prerelease(), Some("hotfix.3"));
        assert!(v.is_hotfix_build());

        let v = ReleaseVersion::parse("2.1.0").unwrap();
        assert_eq!(v.prerelease(), None);
        assert!(!v.is_hotfix_build());
    }

    #[test]
    fn version_serde_is_transparent_string() {
        let v = ReleaseVersion::parse("3.0.0-rc.1").unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3.0.0-rc.1\"");

        let back: ReleaseVersion = serde_json::from_str("\"3.0.0-rc.1\"").unwrap();
        assert_eq!(back, v);

        let err = serde_json::from_str::<ReleaseVersion>("\"v3.0.0\"");
        assert!(err.is_err());
    }

    #[test]
    fn status_terminal_set() {
        use DeploymentStatus::*;
        for s in [Completed, Failed, RolledBack, RollbackFailed] {
            assert!(s.is_terminal());
        }
        for s in [Pending, Preflight, Executing, PostValidating] {
            assert!(!s.is_terminal());
        }
    }

    #[test]
    fn status_transitions_never_regress() {
        use DeploymentStatus::*;
        assert!(Pending.can_transition_to(Preflight));
        assert!(Pending.can_transition_to(Executing)); // hotfix skips preflight
        assert!(Preflight.can_transition_to(Failed));
        assert!(Executing.can_transition_to(RolledBack));
        assert!(PostValidating.can_transition_to(Completed));

        assert!(!Executing.can_transition_to(Preflight));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!RollbackFailed.can_transition_to(RolledBack));
    }

    #[test]
    fn status_failure_side() {
        use DeploymentStatus::*;
        assert!(Failed.is_failure());
        assert!(RolledBack.is_failure());
        assert!(RollbackFailed.is_failure());
        assert!(!Completed.is_failure());
        assert!(!Executing.is_failure());
    }

    #[test]
    fn submission_defaults_are_absent_not_filled() {
        let json = r#"{
            "deployment_type": "canary",
            "environment": "staging",
            "version": "3.0.0"
        }"#;
        let sub: DeploymentSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(sub.rollback_strategy, None);
        assert_eq!(sub.health_checks, None);
        assert_eq!(sub.approval_required, None);
        assert_eq!(sub.initiated_by, "");
    }

    #[test]
    fn preflight_report_enumerates_every_failure() {
        let results = vec![
            CheckResult {
                name: "system_health".into(),
                critical: true,
                passed: true,
                detail: "score 0.95".into(),
                duration: Duration::from_millis(3),
            },
            CheckResult {
                name: "security_posture".into(),
                critical: true,
                passed: false,
                detail: "2 open vulnerabilities".into(),
                duration: Duration::from_millis(5),
            },
            CheckResult {
                name: "backup_freshness".into(),
                critical: false,
                passed: false,
                detail: "last backup 30h old".into(),
                duration: Duration::from_millis(2),
            },
        ];
        let report = PreflightReport::from_results(results);
        assert!(!report.all_passed);
        assert_eq!(report.failing().len(), 2);

        let summary = report.failure_summary();
        assert!(summary.contains("security_posture"));
        assert!(summary.contains("backup_freshness"));
        assert!(summary.contains("2 open vulnerabilities"));
    }

    #[test]
    fn rollback_plan_wire_form() {
        let plan = RollbackPlan::switch_traffic("green", "blue");
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["action"], "switch_traffic");
        assert_eq!(json["from"], "green");
        assert_eq!(json["to"], "blue");
        assert!(json.get("estimated").is_none());

        let plan = RollbackPlan::remove_canary();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["action"], "remove_canary");
        assert!(json.get("from").is_none());
    }

    #[test]
    fn record_starts_pending_without_plan() {
        let request = DeploymentRequest {
            strategy: Strategy::Canary,
            environment: Environment::Staging,
            version: ReleaseVersion::parse("3.0.0").unwrap(),
            rollback_policy: RollbackPolicy::Immediate,
            health_checks_enabled: true,
            approval_required: true,
            initiated_by: "release-bot".into(),
        };
        let record = DeploymentRecord::new("d-1".into(), request, Utc::now());
        assert_eq!(record.status, DeploymentStatus::Pending);
        assert!(record.rollback_plan.is_none());
        assert!(record.strategy_result.is_none());
        assert!(record.completed_at.is_none());
    }
}
