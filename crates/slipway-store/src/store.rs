//! RecordStore — redb-backed persistence for deployment runs.
//!
//! Holds the deployment record per run, the release index consulted by
//! duplicate-version validation, and the critical alert log. All values
//! are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for tests
//! and dry runs).

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use slipway_core::{
    CriticalAlert, DeploymentId, DeploymentRecord, DeploymentStatus, Environment, RollbackPlan,
    StrategyResult,
};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::tables::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Marks a version as deployed to an environment. Written on successful
/// completion; consulted by duplicate-version validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMarker {
    pub environment: Environment,
    pub version: String,
    pub deployment_id: DeploymentId,
    pub recorded_at: DateTime<Utc>,
}

impl ReleaseMarker {
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.environment, self.version)
    }
}

/// Terminal outcome applied to a record by [`RecordStore::close_record`].
///
/// The constructors encode which fields each terminal status carries: a
/// rollback plan lands on the record only for failure-side statuses.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub status: DeploymentStatus,
    pub strategy_result: Option<StrategyResult>,
    pub rollback_plan: Option<RollbackPlan>,
    pub failure: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl RecordOutcome {
    /// Successful run. The prepared rollback plan stays off the record.
    pub fn completed(result: StrategyResult, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: DeploymentStatus::Completed,
            strategy_result: Some(result),
            rollback_plan: None,
            failure: None,
            completed_at,
        }
    }

    /// Failed run left for the operator (preflight failure, or manual
    /// rollback policy). The plan, when present, guides the operator.
    pub fn failed(
        failure: impl Into<String>,
        plan: Option<RollbackPlan>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: DeploymentStatus::Failed,
            strategy_result: None,
            rollback_plan: plan,
            failure: Some(failure.into()),
            completed_at,
        }
    }

    /// Failed run that was compensated automatically.
    pub fn rolled_back(
        failure: impl Into<String>,
        plan: RollbackPlan,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: DeploymentStatus::RolledBack,
            strategy_result: None,
            rollback_plan: Some(plan),
            failure: Some(failure.into()),
            completed_at,
        }
    }

    /// Failed run whose compensation also failed.
    pub fn rollback_failed(
        failure: impl Into<String>,
        plan: RollbackPlan,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: DeploymentStatus::RollbackFailed,
            strategy_result: None,
            rollback_plan: Some(plan),
            failure: Some(failure.into()),
            completed_at,
        }
    }
}

/// Thread-safe deployment record store backed by redb.
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Database>,
}

impl RecordStore {
    /// Open (or create) a persistent record store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "record store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory record store (for tests and dry runs).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory record store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RECORDS).map_err(map_err!(Table))?;
        txn.open_table(RELEASES).map_err(map_err!(Table))?;
        txn.open_table(ALERTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Records ────────────────────────────────────────────────────

    /// Insert a freshly accepted record.
    pub fn create_record(&self, record: &DeploymentRecord) -> StoreResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            table
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %record.id, status = %record.status, "deployment record created");
        Ok(())
    }

    /// Get a record by deployment id.
    pub fn get_record(&self, id: &str) -> StoreResult<Option<DeploymentRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: DeploymentRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all records.
    pub fn list_records(&self) -> StoreResult<Vec<DeploymentRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: DeploymentRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Advance an in-flight record to the next phase status.
    ///
    /// The transition guard runs inside the write transaction: a terminal
    /// record never changes again, and the phase order never regresses.
    pub fn transition(&self, id: &str, next: DeploymentStatus) -> StoreResult<DeploymentRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let updated = {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            let mut record = Self::read_for_update(&table, id)?;
            if !record.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: record.status,
                    to: next,
                });
            }
            record.status = next;
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            record
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, status = %next, "deployment record transitioned");
        Ok(updated)
    }

    /// Close a record with a terminal status and its outcome fields.
    pub fn close_record(&self, id: &str, outcome: RecordOutcome) -> StoreResult<DeploymentRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let updated = {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            let mut record = Self::read_for_update(&table, id)?;
            if !record.status.can_transition_to(outcome.status) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: record.status,
                    to: outcome.status,
                });
            }
            record.status = outcome.status;
            record.strategy_result = outcome.strategy_result;
            record.rollback_plan = outcome.rollback_plan;
            record.failure = outcome.failure;
            record.completed_at = Some(outcome.completed_at);
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            record
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, status = %updated.status, "deployment record closed");
        Ok(updated)
    }

    fn read_for_update(
        table: &redb::Table<'_, &'static str, &'static [u8]>,
        id: &str,
    ) -> StoreResult<DeploymentRecord> {
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    // ── Releases ───────────────────────────────────────────────────

    /// Whether a version has already been deployed to an environment.
    pub fn version_deployed(&self, environment: Environment, version: &str) -> StoreResult<bool> {
        let key = format!("{environment}/{version}");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RELEASES).map_err(map_err!(Table))?;
        Ok(table.get(key.as_str()).map_err(map_err!(Read))?.is_some())
    }

    /// Record a completed release in the idempotency index.
    pub fn mark_version_deployed(&self, marker: &ReleaseMarker) -> StoreResult<()> {
        let key = marker.table_key();
        let value = serde_json::to_vec(marker).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RELEASES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, id = %marker.deployment_id, "release recorded");
        Ok(())
    }

    // ── Alerts ─────────────────────────────────────────────────────

    /// Append a critical alert to the log.
    pub fn append_alert(&self, alert: &CriticalAlert) -> StoreResult<()> {
        let key = format!(
            "{:020}:{}",
            alert.raised_at.timestamp_millis(),
            alert.deployment_id
        );
        let value = serde_json::to_vec(alert).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ALERTS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %alert.deployment_id, "critical alert appended");
        Ok(())
    }

    /// List all critical alerts in chronological order.
    pub fn list_alerts(&self) -> StoreResult<Vec<CriticalAlert>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ALERTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let alert: CriticalAlert =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(alert);
        }
        Ok(results)
    }
}
