//! Sync run records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use tracing::instrument;

use crate::error::StoreResult;

/// What started a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Started by an operator.
    Manual,
    /// Started by the scheduler.
    Scheduled,
    /// Re-sync of already imported records.
    Refresh,
}

impl TriggerType {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Manual => "manual",
            TriggerType::Scheduled => "scheduled",
            TriggerType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(TriggerType::Manual),
            "scheduled" => Ok(TriggerType::Scheduled),
            "refresh" => Ok(TriggerType::Refresh),
            _ => Err(format!("Unknown trigger type: {s}")),
        }
    }
}

/// Status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    /// Run in progress.
    Running,
    /// Every record processed and written back.
    Completed,
    /// Finished, but some records or write-backs failed.
    Partial,
    /// Aborted by an unhandled error.
    Failed,
}

impl SyncRunStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Running => "running",
            SyncRunStatus::Completed => "completed",
            SyncRunStatus::Partial => "partial",
            SyncRunStatus::Failed => "failed",
        }
    }

    /// Whether this status is terminal; counts freeze once it is.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncRunStatus::Running)
    }
}

impl fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(SyncRunStatus::Running),
            "completed" => Ok(SyncRunStatus::Completed),
            "partial" => Ok(SyncRunStatus::Partial),
            "failed" => Ok(SyncRunStatus::Failed),
            _ => Err(format!("Unknown sync run status: {s}")),
        }
    }
}

/// One end-to-end synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Run id.
    pub id: String,
    /// What started the run.
    pub trigger_type: TriggerType,
    /// Current status.
    pub status: SyncRunStatus,
    /// Records fetched from the CRM.
    pub total_fetched: i32,
    /// Interpreters created.
    pub total_created: i32,
    /// Interpreters updated.
    pub total_updated: i32,
    /// Candidates skipped.
    pub total_skipped: i32,
    /// Per-record errors.
    pub total_errors: i32,
    /// Records marked "Synced" back in the CRM.
    pub total_synced_to_crm: i32,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration.
    pub duration_seconds: Option<f64>,
    /// Error message when failed.
    pub error_message: Option<String>,
    /// Full diagnostic detail when failed.
    pub error_details: Option<String>,
}

impl SyncOperation {
    /// Create a new running operation.
    #[must_use]
    pub fn new(id: String, trigger_type: TriggerType) -> Self {
        Self {
            id,
            trigger_type,
            status: SyncRunStatus::Running,
            total_fetched: 0,
            total_created: 0,
            total_updated: 0,
            total_skipped: 0,
            total_errors: 0,
            total_synced_to_crm: 0,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Move the run to a terminal status and stamp completion time.
    ///
    /// Once terminal the run is frozen; repeated calls are ignored.
    pub fn finalize(&mut self, status: SyncRunStatus) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_seconds = Some((now - self.started_at).num_milliseconds() as f64 / 1000.0);
    }

    /// Move to `failed` with error message and diagnostic detail.
    pub fn fail(&mut self, message: impl Into<String>, details: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.error_message = Some(message.into());
        self.error_details = Some(details.into());
        self.finalize(SyncRunStatus::Failed);
    }
}

/// Postgres repository for sync operations.
#[derive(Debug, Clone)]
pub struct SyncOperationRepository {
    pool: PgPool,
}

impl SyncOperationRepository {
    /// Create a repository over a pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new run row (visible immediately, so a crash leaves a
    /// `running` row behind for operators).
    #[instrument(skip(self, op), fields(run_id = %op.id))]
    pub async fn insert(&self, op: &SyncOperation) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO sync_operations
                (id, trigger_type, status, total_fetched, total_created,
                 total_updated, total_skipped, total_errors,
                 total_synced_to_crm, started_at, completed_at,
                 duration_seconds, error_message, error_details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(&op.id)
        .bind(op.trigger_type.as_str())
        .bind(op.status.as_str())
        .bind(op.total_fetched)
        .bind(op.total_created)
        .bind(op.total_updated)
        .bind(op.total_skipped)
        .bind(op.total_errors)
        .bind(op.total_synced_to_crm)
        .bind(op.started_at)
        .bind(op.completed_at)
        .bind(op.duration_seconds)
        .bind(&op.error_message)
        .bind(&op.error_details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the current counts and status of a run.
    #[instrument(skip(self, op), fields(run_id = %op.id))]
    pub async fn update(&self, op: &SyncOperation) -> StoreResult<()> {
        sqlx::query(
            r"
            UPDATE sync_operations
            SET status = $2, total_fetched = $3, total_created = $4,
                total_updated = $5, total_skipped = $6, total_errors = $7,
                total_synced_to_crm = $8, completed_at = $9,
                duration_seconds = $10, error_message = $11,
                error_details = $12
            WHERE id = $1
            ",
        )
        .bind(&op.id)
        .bind(op.status.as_str())
        .bind(op.total_fetched)
        .bind(op.total_created)
        .bind(op.total_updated)
        .bind(op.total_skipped)
        .bind(op.total_errors)
        .bind(op.total_synced_to_crm)
        .bind(op.completed_at)
        .bind(op.duration_seconds)
        .bind(&op.error_message)
        .bind(&op.error_details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a run by id.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Option<SyncOperation>> {
        let row: Option<SyncOperationRow> = sqlx::query_as(
            r"
            SELECT id, trigger_type, status, total_fetched, total_created,
                   total_updated, total_skipped, total_errors,
                   total_synced_to_crm, started_at, completed_at,
                   duration_seconds, error_message, error_details
            FROM sync_operations
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SyncOperationRow::into_operation))
    }

    /// List recent runs, newest first.
    #[instrument(skip(self))]
    pub async fn list_recent(&self, limit: i64) -> StoreResult<Vec<SyncOperation>> {
        let rows: Vec<SyncOperationRow> = sqlx::query_as(
            r"
            SELECT id, trigger_type, status, total_fetched, total_created,
                   total_updated, total_skipped, total_errors,
                   total_synced_to_crm, started_at, completed_at,
                   duration_seconds, error_message, error_details
            FROM sync_operations
            ORDER BY started_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SyncOperationRow::into_operation).collect())
    }
}

/// Database row for sync operations.
#[derive(Debug, sqlx::FromRow)]
struct SyncOperationRow {
    id: String,
    trigger_type: String,
    status: String,
    total_fetched: i32,
    total_created: i32,
    total_updated: i32,
    total_skipped: i32,
    total_errors: i32,
    total_synced_to_crm: i32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration_seconds: Option<f64>,
    error_message: Option<String>,
    error_details: Option<String>,
}

impl SyncOperationRow {
    fn into_operation(self) -> SyncOperation {
        SyncOperation {
            id: self.id,
            trigger_type: self.trigger_type.parse().unwrap_or(TriggerType::Manual),
            status: self.status.parse().unwrap_or(SyncRunStatus::Failed),
            total_fetched: self.total_fetched,
            total_created: self.total_created,
            total_updated: self.total_updated,
            total_skipped: self.total_skipped,
            total_errors: self.total_errors,
            total_synced_to_crm: self.total_synced_to_crm,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_seconds: self.duration_seconds,
            error_message: self.error_message,
            error_details: self.error_details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SyncRunStatus::Running,
            SyncRunStatus::Completed,
            SyncRunStatus::Partial,
            SyncRunStatus::Failed,
        ] {
            let parsed: SyncRunStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_trigger_roundtrip() {
        for trigger in [TriggerType::Manual, TriggerType::Scheduled, TriggerType::Refresh] {
            let parsed: TriggerType = trigger.as_str().parse().unwrap();
            assert_eq!(trigger, parsed);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SyncRunStatus::Running.is_terminal());
        assert!(SyncRunStatus::Completed.is_terminal());
        assert!(SyncRunStatus::Partial.is_terminal());
        assert!(SyncRunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_finalize_freezes_run() {
        let mut op = SyncOperation::new("sync_1".to_string(), TriggerType::Manual);
        op.finalize(SyncRunStatus::Completed);
        assert_eq!(op.status, SyncRunStatus::Completed);
        assert!(op.completed_at.is_some());
        assert!(op.duration_seconds.is_some());

        // A second transition is ignored.
        op.fail("late failure", "trace");
        assert_eq!(op.status, SyncRunStatus::Completed);
        assert!(op.error_message.is_none());
    }

    #[test]
    fn test_fail_records_details() {
        let mut op = SyncOperation::new("sync_2".to_string(), TriggerType::Scheduled);
        op.fail("boom", "stack trace here");
        assert_eq!(op.status, SyncRunStatus::Failed);
        assert_eq!(op.error_message.as_deref(), Some("boom"));
        assert_eq!(op.error_details.as_deref(), Some("stack trace here"));
    }
}
