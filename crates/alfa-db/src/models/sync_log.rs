//! Append-only audit log for sync runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use tracing::instrument;

use crate::error::StoreResult;

/// Severity of a sync log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(format!("Unknown log level: {s}")),
        }
    }
}

/// One audit event inside a sync run. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Entry id.
    pub id: String,
    /// Run the entry belongs to.
    pub sync_operation_id: String,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// CRM record the event refers to, if any.
    pub record_id: Option<String>,
    /// Local interpreter the event refers to, if any.
    pub interpreter_id: Option<String>,
    /// Structured detail payload.
    pub details: Option<serde_json::Value>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Postgres repository for sync log entries.
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: PgPool,
}

impl SyncLogRepository {
    /// Create a repository over a pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one entry.
    #[instrument(skip(self, entry), fields(run_id = %entry.sync_operation_id))]
    pub async fn append(&self, entry: &SyncLogEntry) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO sync_logs
                (id, sync_operation_id, level, message, record_id,
                 interpreter_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&entry.id)
        .bind(&entry.sync_operation_id)
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(&entry.record_id)
        .bind(&entry.interpreter_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List entries for a run in write order.
    #[instrument(skip(self))]
    pub async fn list_for_run(&self, sync_operation_id: &str) -> StoreResult<Vec<SyncLogEntry>> {
        let rows: Vec<SyncLogRow> = sqlx::query_as(
            r"
            SELECT id, sync_operation_id, level, message, record_id,
                   interpreter_id, details, created_at
            FROM sync_logs
            WHERE sync_operation_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(sync_operation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SyncLogRow::into_entry).collect())
    }
}

/// Database row for sync log entries.
#[derive(Debug, sqlx::FromRow)]
struct SyncLogRow {
    id: String,
    sync_operation_id: String,
    level: String,
    message: String,
    record_id: Option<String>,
    interpreter_id: Option<String>,
    details: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl SyncLogRow {
    fn into_entry(self) -> SyncLogEntry {
        SyncLogEntry {
            id: self.id,
            sync_operation_id: self.sync_operation_id,
            level: self.level.parse().unwrap_or(LogLevel::Info),
            message: self.message,
            record_id: self.record_id,
            interpreter_id: self.interpreter_id,
            details: self.details,
            created_at: self.created_at,
        }
    }
}
