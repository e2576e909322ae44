//! Concurrent check runner.
//!
//! Spawns every check as its own task with a per-check timeout, then
//! joins all of them in spawn order before aggregating. A timed-out or
//! errored check counts as failed; nothing short-circuits, so the
//! report always enumerates the complete failure set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use slipway_core::{CheckResult, Environment, PreflightReport, config::PreflightConfig};
use tracing::{info, warn};

use crate::checks::{PreflightCheck, standard_checks};
use crate::signal::SignalSource;

/// Readiness gate run before strategy execution.
pub struct Preflight {
    signals: Arc<dyn SignalSource>,
    checks: Vec<Arc<dyn PreflightCheck>>,
    timeout: Duration,
}

impl Preflight {
    /// Standard five-check runner with thresholds from configuration.
    pub fn new(signals: Arc<dyn SignalSource>, config: &PreflightConfig) -> Self {
        Self {
            signals,
            checks: standard_checks(config),
            timeout: Duration::from_secs(config.check_timeout_secs),
        }
    }

    /// Runner over a custom check set.
    pub fn with_checks(
        signals: Arc<dyn SignalSource>,
        checks: Vec<Arc<dyn PreflightCheck>>,
        timeout: Duration,
    ) -> Self {
        Self {
            signals,
            checks,
            timeout,
        }
    }

    /// Run every check concurrently and aggregate the outcomes.
    pub async fn run(&self, environment: Environment) -> PreflightReport {
        let mut handles = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let check = Arc::clone(check);
            let signals = Arc::clone(&self.signals);
            let timeout = self.timeout;
            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let (passed, detail) = match tokio::time::timeout(
                    timeout,
                    check.run(signals.as_ref(), environment),
                )
                .await
                {
                    Ok(Ok(outcome)) => (outcome.passed, outcome.detail),
                    Ok(Err(e)) => (false, format!("check error: {e}")),
                    Err(_) => (false, format!("timed out after {}s", timeout.as_secs())),
                };
                CheckResult {
                    name: check.name().to_string(),
                    critical: check.critical(),
                    passed,
                    detail,
                    duration: started.elapsed(),
                }
            }));
        }

        // Join every handle in spawn order. The report must enumerate
        // all failures, so a failing check never cancels its peers.
        let mut results = Vec::with_capacity(handles.len());
        for (check, handle) in self.checks.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(CheckResult {
                    name: check.name().to_string(),
                    critical: check.critical(),
                    passed: false,
                    detail: format!("check task failed: {e}"),
                    duration: Duration::ZERO,
                }),
            }
        }

        let report = PreflightReport::from_results(results);
        if report.all_passed {
            info!(%environment, checks = report.results.len(), "preflight passed");
        } else {
            warn!(
                %environment,
                failing = report.failing().len(),
                summary = %report.failure_summary(),
                "preflight failed"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::checks::CheckOutcome;
    use crate::sim::SimSignals;

    const ENV: Environment = Environment::Staging;

    /// Signal source whose every read fails, as if the feed were down.
    struct OfflineSignals;

    #[async_trait]
    impl SignalSource for OfflineSignals {
        async fn health_score(&self, _: Environment) -> anyhow::Result<f64> {
            anyhow::bail!("signals offline")
        }

        async fn resource_usage(
            &self,
            _: Environment,
        ) -> anyhow::Result<crate::signal::ResourceUsage> {
            anyhow::bail!("signals offline")
        }

        async fn dependencies(
            &self,
            _: Environment,
        ) -> anyhow::Result<Vec<crate::signal::DependencyStatus>> {
            anyhow::bail!("signals offline")
        }

        async fn security_posture(
            &self,
            _: Environment,
        ) -> anyhow::Result<crate::signal::SecurityPosture> {
            anyhow::bail!("signals offline")
        }

        async fn last_backup_age(&self, _: Environment) -> anyhow::Result<Duration> {
            anyhow::bail!("signals offline")
        }
    }

    #[tokio::test]
    async fn healthy_signals_pass_all_five_checks() {
        let runner = Preflight::new(
            Arc::new(SimSignals::default()),
            &PreflightConfig::default(),
        );
        let report = runner.run(ENV).await;

        assert!(report.all_passed);
        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "health_score",
                "resource_headroom",
                "dependencies",
                "security_posture",
                "backup_freshness"
            ]
        );
    }

    #[tokio::test]
    async fn report_enumerates_every_failing_check() {
        // Two deliberate failures: health score and security posture.
        let signals = SimSignals {
            health: 0.50,
            posture: crate::signal::SecurityPosture {
                open_vulnerabilities: 2,
                failed_controls: vec![],
            },
            ..SimSignals::default()
        };
        let runner = Preflight::new(Arc::new(signals), &PreflightConfig::default());
        let report = runner.run(ENV).await;

        assert!(!report.all_passed);
        assert_eq!(report.results.len(), 5);
        let failing: Vec<&str> = report.failing().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(failing, vec!["health_score", "security_posture"]);

        let summary = report.failure_summary();
        assert!(summary.contains("health_score"));
        assert!(summary.contains("security_posture"));
    }

    #[tokio::test]
    async fn non_critical_failure_still_fails_the_aggregate() {
        let signals = SimSignals {
            backup_age: Duration::from_secs(30 * 3600),
            ..SimSignals::default()
        };
        let runner = Preflight::new(Arc::new(signals), &PreflightConfig::default());
        let report = runner.run(ENV).await;

        assert!(!report.all_passed);
        let failing = report.failing();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].name, "backup_freshness");
        assert!(!failing[0].critical);
    }

    #[tokio::test]
    async fn signal_outage_fails_every_check_with_detail() {
        let runner = Preflight::new(Arc::new(OfflineSignals), &PreflightConfig::default());
        let report = runner.run(ENV).await;

        assert!(!report.all_passed);
        assert_eq!(report.failing().len(), 5);
        for result in &report.results {
            assert!(result.detail.contains("check error"), "{}", result.detail);
        }
    }

    struct SlowCheck;

    #[async_trait]
    impl PreflightCheck for SlowCheck {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn critical(&self) -> bool {
            true
        }

        async fn run(
            &self,
            _signals: &dyn SignalSource,
            _environment: Environment,
        ) -> anyhow::Result<CheckOutcome> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(CheckOutcome::pass("finished eventually"))
        }
    }

    struct InstantFail;

    #[async_trait]
    impl PreflightCheck for InstantFail {
        fn name(&self) -> &'static str {
            "instant_fail"
        }

        fn critical(&self) -> bool {
            false
        }

        async fn run(
            &self,
            _signals: &dyn SignalSource,
            _environment: Environment,
        ) -> anyhow::Result<CheckOutcome> {
            Ok(CheckOutcome::fail("always fails"))
        }
    }

    #[tokio::test]
    async fn timeout_cancels_only_the_slow_check() {
        let runner = Preflight::with_checks(
            Arc::new(SimSignals::default()),
            vec![Arc::new(SlowCheck), Arc::new(InstantFail)],
            Duration::from_millis(50),
        );
        let report = runner.run(ENV).await;

        assert_eq!(report.results.len(), 2);
        assert!(!report.results[0].passed);
        assert!(report.results[0].detail.contains("timed out"));
        // The peer check still ran and reported its own outcome.
        assert_eq!(report.results[1].name, "instant_fail");
        assert_eq!(report.results[1].detail, "always fails");
    }
}
