//! Engine configuration.
//!
//! Every tunable default of the engine lives here in one versioned,
//! validated struct passed to the orchestrator at construction time:
//! request-field defaults, the production change freeze, preflight
//! thresholds, and the per-strategy rollout tables. Loadable from TOML;
//! semantic validation collects every violation before returning so the
//! operator sees the full picture at once.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RollbackPolicy;

/// Config schema version this build understands.
pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Errors from configuration loading or semantic validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported config_version {found}, this build supports {SUPPORTED_CONFIG_VERSION}")]
    UnsupportedVersion { found: u32 },

    #[error("field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        field: String,
        value: String,
        reason: String,
    },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub config_version: u32,
    pub validation: ValidationConfig,
    pub preflight: PreflightConfig,
    pub rollout: RolloutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_version: SUPPORTED_CONFIG_VERSION,
            validation: ValidationConfig::default(),
            preflight: PreflightConfig::default(),
            rollout: RolloutConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. Absent tables and fields take defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate all semantic constraints, collecting every violation.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.config_version != SUPPORTED_CONFIG_VERSION {
            errors.push(ConfigError::UnsupportedVersion {
                found: self.config_version,
            });
        }

        self.validation.collect_errors(&mut errors);
        self.preflight.collect_errors(&mut errors);
        self.rollout.collect_errors(&mut errors);

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// ── Validation section ────────────────────────────────────────────

/// Request validation settings, including the defaults applied to
/// optional submission fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Production change freeze (deployments blocked while it covers now).
    pub freeze: FreezeWindow,
    /// Whether a hotfix deployment may proceed during the freeze.
    pub hotfix_bypasses_freeze: bool,
    /// Default when the submission omits `rollback_strategy`.
    pub default_rollback_policy: RollbackPolicy,
    /// Default when the submission omits `health_checks`.
    pub default_health_checks: bool,
    /// Default when the submission omits `approval_required`.
    pub default_approval_required: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            freeze: FreezeWindow::default(),
            hotfix_bypasses_freeze: true,
            default_rollback_policy: RollbackPolicy::Immediate,
            default_health_checks: true,
            default_approval_required: true,
        }
    }
}

impl ValidationConfig {
    fn collect_errors(&self, errors: &mut Vec<ConfigError>) {
        if self.freeze.start_hour >= self.freeze.end_hour {
            errors.push(invalid(
                "validation.freeze.start_hour",
                self.freeze.start_hour,
                "must be before end_hour",
            ));
        }
        if self.freeze.end_hour > 24 {
            errors.push(invalid(
                "validation.freeze.end_hour",
                self.freeze.end_hour,
                "must be at most 24",
            ));
        }
    }
}

/// Weekday business-hours window during which production deployments
/// are blocked. Hours are local time; the end hour is exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for FreezeWindow {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl FreezeWindow {
    /// Whether the window covers the given local time (Monday to Friday,
    /// `[start_hour, end_hour)`).
    pub fn covers(&self, now: chrono::NaiveDateTime) -> bool {
        use chrono::{Datelike, Timelike};
        let weekday = now.weekday().number_from_monday();
        weekday <= 5 && now.hour() >= self.start_hour && now.hour() < self.end_hour
    }

    /// Human-readable description for error messages.
    pub fn describe(&self) -> String {
        format!("Mon-Fri {:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

// ── Preflight section ─────────────────────────────────────────────

/// Thresholds for the five readiness checks and the per-check timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Per-check timeout; a timed-out check counts as failed.
    pub check_timeout_secs: u64,
    /// Minimum acceptable system health score (0.0 - 1.0).
    pub min_health_score: f64,
    /// CPU usage ceiling (0.0 - 1.0).
    pub max_cpu_usage: f64,
    /// Memory usage ceiling (0.0 - 1.0).
    pub max_memory_usage: f64,
    /// Storage usage ceiling (0.0 - 1.0).
    pub max_storage_usage: f64,
    /// How many named dependencies may be unreachable before the check fails.
    pub max_unreachable_dependencies: usize,
    /// Backup age ceiling in hours.
    pub max_backup_age_hours: u64,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            check_timeout_secs: 10,
            min_health_score: 0.80,
            max_cpu_usage: 0.85,
            max_memory_usage: 0.90,
            max_storage_usage: 0.90,
            max_unreachable_dependencies: 1,
            max_backup_age_hours: 24,
        }
    }
}

impl PreflightConfig {
    fn collect_errors(&self, errors: &mut Vec<ConfigError>) {
        if self.check_timeout_secs == 0 {
            errors.push(invalid(
                "preflight.check_timeout_secs",
                self.check_timeout_secs,
                "must be at least 1",
            ));
        }
        for (field, value) in [
            ("preflight.min_health_score", self.min_health_score),
            ("preflight.max_cpu_usage", self.max_cpu_usage),
            ("preflight.max_memory_usage", self.max_memory_usage),
            ("preflight.max_storage_usage", self.max_storage_usage),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(invalid(field, value, "must be between 0.0 and 1.0"));
            }
        }
    }
}

// ── Rollout section ───────────────────────────────────────────────

/// Per-strategy rollout tables and the shared monitoring thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    pub blue_green: BlueGreenConfig,
    pub canary: CanaryConfig,
    pub rolling: RollingConfig,
    pub monitor: MonitorThresholds,
}

impl RolloutConfig {
    fn collect_errors(&self, errors: &mut Vec<ConfigError>) {
        if self.blue_green.traffic_steps.is_empty() {
            errors.push(invalid(
                "rollout.blue_green.traffic_steps",
                "[]",
                "must list at least one traffic step",
            ));
        }
        let mut prev = 0u32;
        for step in &self.blue_green.traffic_steps {
            if *step == 0 || *step >= 100 {
                errors.push(invalid(
                    "rollout.blue_green.traffic_steps",
                    step,
                    "steps must be between 1 and 99; the final cutover is implicit",
                ));
            }
            if *step <= prev && prev != 0 {
                errors.push(invalid(
                    "rollout.blue_green.traffic_steps",
                    step,
                    "steps must be strictly increasing",
                ));
            }
            prev = *step;
        }

        if self.canary.stages.is_empty() {
            errors.push(invalid(
                "rollout.canary.stages",
                "[]",
                "must list at least one stage",
            ));
        } else {
            let mut prev = 0u32;
            for stage in &self.canary.stages {
                if stage.traffic_percent == 0 || stage.traffic_percent > 100 {
                    errors.push(invalid(
                        "rollout.canary.stages",
                        stage.traffic_percent,
                        "stage percentages must be between 1 and 100",
                    ));
                }
                if stage.traffic_percent <= prev {
                    errors.push(invalid(
                        "rollout.canary.stages",
                        stage.traffic_percent,
                        "stage percentages must be strictly increasing",
                    ));
                }
                prev = stage.traffic_percent;
            }
            if self.canary.stages.last().map(|s| s.traffic_percent) != Some(100) {
                errors.push(invalid(
                    "rollout.canary.stages",
                    prev,
                    "the final stage must reach 100 percent",
                ));
            }
        }

        if !(self.rolling.batch_fraction > 0.0 && self.rolling.batch_fraction <= 1.0) {
            errors.push(invalid(
                "rollout.rolling.batch_fraction",
                self.rolling.batch_fraction,
                "must be greater than 0.0 and at most 1.0",
            ));
        }
        if self.rolling.rollback_estimate_factor < 1.0 {
            errors.push(invalid(
                "rollout.rolling.rollback_estimate_factor",
                self.rolling.rollback_estimate_factor,
                "must be at least 1.0",
            ));
        }

        if !(0.0..=100.0).contains(&self.monitor.max_error_rate_pct) {
            errors.push(invalid(
                "rollout.monitor.max_error_rate_pct",
                self.monitor.max_error_rate_pct,
                "must be between 0.0 and 100.0",
            ));
        }
    }
}

/// Blue/green rollout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueGreenConfig {
    /// Traffic increments shifted to the new side, in percent. The final
    /// 100 percent cutover happens after the hold window.
    pub traffic_steps: Vec<u32>,
    /// Pause between traffic increments.
    pub step_pause_secs: u64,
    /// How long to hold and monitor the majority-traffic side before cutover.
    pub hold_window_secs: u64,
}

impl Default for BlueGreenConfig {
    fn default() -> Self {
        Self {
            traffic_steps: vec![10, 25, 50, 75, 90],
            step_pause_secs: 10,
            hold_window_secs: 120,
        }
    }
}

/// Canary rollout stage table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryConfig {
    pub stages: Vec<CanaryStage>,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            stages: vec![
                CanaryStage {
                    traffic_percent: 5,
                    monitor_secs: 300,
                },
                CanaryStage {
                    traffic_percent: 25,
                    monitor_secs: 600,
                },
                CanaryStage {
                    traffic_percent: 50,
                    monitor_secs: 600,
                },
                CanaryStage {
                    traffic_percent: 100,
                    monitor_secs: 300,
                },
            ],
        }
    }
}

/// One canary ramp step: route this percentage, monitor for this long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryStage {
    pub traffic_percent: u32,
    pub monitor_secs: u64,
}

/// Rolling rollout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Fraction of the fleet per batch (floored, minimum batch size 1).
    pub batch_fraction: f64,
    /// Pause between batches.
    pub batch_pause_secs: u64,
    /// Rollback time estimate as a multiple of elapsed execution time.
    pub rollback_estimate_factor: f64,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            batch_fraction: 0.25,
            batch_pause_secs: 10,
            rollback_estimate_factor: 1.2,
        }
    }
}

/// Metric ceilings applied to every monitoring window (canary stages
/// and the blue/green hold).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorThresholds {
    /// Error rate ceiling as a percentage (0.0 - 100.0).
    pub max_error_rate_pct: f64,
    /// P99 latency ceiling in milliseconds.
    pub max_p99_latency_ms: u64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            max_error_rate_pct: 5.0,
            max_p99_latency_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn defaults_validate_clean() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.config_version, SUPPORTED_CONFIG_VERSION);
        assert_eq!(config.rollout.canary.stages.len(), 4);
        assert_eq!(config.rollout.blue_green.traffic_steps, vec![10, 25, 50, 75, 90]);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[rollout.rolling]
batch_fraction = 0.5

[validation]
hotfix_bypasses_freeze = false
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rollout.rolling.batch_fraction, 0.5);
        assert!(!config.validation.hotfix_bypasses_freeze);
        // Untouched sections keep defaults.
        assert_eq!(config.preflight.check_timeout_secs, 10);
        assert_eq!(config.validation.freeze.start_hour, 9);
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slipway.toml");
        std::fs::write(&path, "config_version = 1\n[preflight]\nmin_health_score = 0.9\n")
            .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.preflight.min_health_score, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_collects_all_errors() {
        let mut config = EngineConfig::default();
        config.config_version = 99;
        config.preflight.min_health_score = 1.5;
        config.rollout.rolling.batch_fraction = 0.0;
        config.validation.freeze.start_hour = 20;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn canary_stages_must_end_at_full_traffic() {
        let mut config = EngineConfig::default();
        config.rollout.canary.stages = vec![
            CanaryStage {
                traffic_percent: 5,
                monitor_secs: 60,
            },
            CanaryStage {
                traffic_percent: 50,
                monitor_secs: 60,
            },
        ];
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("100 percent")));
    }

    #[test]
    fn traffic_steps_must_increase() {
        let mut config = EngineConfig::default();
        config.rollout.blue_green.traffic_steps = vec![10, 50, 25];
        assert!(config.validate().is_err());
    }

    #[test]
    fn freeze_window_covers_weekday_business_hours() {
        let freeze = FreezeWindow::default();

        // Wednesday 2025-03-05.
        let wed_morning = NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert!(freeze.covers(wed_morning));

        let wed_early = NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(8, 59, 0)
            .unwrap();
        assert!(!freeze.covers(wed_early));

        // End hour is exclusive: 17:00 exactly is allowed.
        let wed_close = NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        assert!(!freeze.covers(wed_close));

        // Saturday 2025-03-08.
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert!(!freeze.covers(saturday));
    }

    #[test]
    fn freeze_describe() {
        assert_eq!(FreezeWindow::default().describe(), "Mon-Fri 09:00-17:00");
    }
}
