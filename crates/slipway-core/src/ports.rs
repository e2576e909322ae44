//! Observability and time ports shared across the engine.
//!
//! The orchestrator reports through these seams instead of calling a
//! backend directly, so tests can assert on spans and alerts without
//! any live infrastructure. Production wiring uses the tracing-backed
//! implementations below.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Utc};

use crate::types::CriticalAlert;

// ── Telemetry ─────────────────────────────────────────────────────

/// Opaque handle for an in-flight span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(pub u64);

/// How a span ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    Success,
    Failure,
}

/// Span recording for the deployment run and each of its phases.
pub trait Telemetry: Send + Sync {
    /// Open a named span and return its handle.
    fn start_span(&self, name: &str) -> SpanId;
    /// Close a previously opened span with its outcome.
    fn finish_span(&self, span: SpanId, outcome: SpanOutcome);
}

/// Telemetry backed by `tracing` events. Span names are retained until
/// finish so the closing event can repeat them.
#[derive(Debug, Default)]
pub struct TracingTelemetry {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, String>>,
}

impl TracingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Telemetry for TracingTelemetry {
    fn start_span(&self, name: &str) -> SpanId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut open) = self.open.lock() {
            open.insert(id, name.to_string());
        }
        tracing::debug!(span_id = id, span = name, "span started");
        SpanId(id)
    }

    fn finish_span(&self, span: SpanId, outcome: SpanOutcome) {
        let name = self
            .open
            .lock()
            .ok()
            .and_then(|mut open| open.remove(&span.0))
            .unwrap_or_else(|| "unknown".to_string());
        match outcome {
            SpanOutcome::Success => {
                tracing::debug!(span_id = span.0, span = %name, "span finished")
            }
            SpanOutcome::Failure => {
                tracing::warn!(span_id = span.0, span = %name, "span failed")
            }
        }
    }
}

// ── Alerting ──────────────────────────────────────────────────────

/// Delivery channel for critical escalations. Raise failures are the
/// sink's problem; callers log and move on.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise(&self, alert: &CriticalAlert) -> anyhow::Result<()>;
}

/// Sink that emits the alert as a structured error event.
#[derive(Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn raise(&self, alert: &CriticalAlert) -> anyhow::Result<()> {
        tracing::error!(
            deployment_id = %alert.deployment_id,
            environment = %alert.environment,
            strategy = %alert.strategy,
            original_failure = %alert.original_failure,
            rollback_failure = %alert.rollback_failure,
            "CRITICAL: deployment and rollback both failed, operator intervention required"
        );
        Ok(())
    }
}

// ── Clock ─────────────────────────────────────────────────────────

/// Wall clock, injected so freeze-window tests can pin the time.
pub trait Clock: Send + Sync {
    /// Timestamp for records and alerts.
    fn now_utc(&self) -> DateTime<Utc>;
    /// Local time used by the maintenance freeze window.
    fn now_local(&self) -> NaiveDateTime;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    local: NaiveDateTime,
}

impl FixedClock {
    pub fn at(local: NaiveDateTime) -> Self {
        Self { local }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.local.and_utc()
    }

    fn now_local(&self) -> NaiveDateTime {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_telemetry_hands_out_distinct_ids() {
        let telemetry = TracingTelemetry::new();
        let a = telemetry.start_span("deployment");
        let b = telemetry.start_span("preflight");
        assert_ne!(a, b);
        telemetry.finish_span(b, SpanOutcome::Success);
        telemetry.finish_span(a, SpanOutcome::Failure);
    }

    #[test]
    fn fixed_clock_reports_the_pinned_instant() {
        let noon = chrono::NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let clock = FixedClock::at(noon);
        assert_eq!(clock.now_local(), noon);
        assert_eq!(clock.now_utc().naive_utc(), noon);
    }

    #[tokio::test]
    async fn log_sink_accepts_alerts() {
        let alert = CriticalAlert {
            deployment_id: "d-1".to_string(),
            environment: crate::types::Environment::Production,
            strategy: crate::types::Strategy::Canary,
            summary: "deployment and rollback both failed".to_string(),
            original_failure: "canary_stage_2: error rate above threshold".to_string(),
            rollback_failure: "remove_canary: driver unreachable".to_string(),
            raised_at: Utc::now(),
        };
        assert!(LogAlertSink.raise(&alert).await.is_ok());
    }
}
