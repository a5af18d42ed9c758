//! Postgres-backed implementation of the storage ports.

use async_trait::async_trait;
use sqlx::PgPool;

use alfa_db::{
    Interpreter, InterpreterRepository, StoreResult, SyncLogEntry, SyncLogRepository,
    SyncOperation, SyncOperationRepository,
};

use crate::store::{InterpreterStore, SyncLogStore, SyncRunStore};

/// Production store backed by the Postgres repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    interpreters: InterpreterRepository,
    runs: SyncOperationRepository,
    logs: SyncLogRepository,
}

impl PgStore {
    /// Create a store over a pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            interpreters: InterpreterRepository::new(pool.clone()),
            runs: SyncOperationRepository::new(pool.clone()),
            logs: SyncLogRepository::new(pool),
        }
    }
}

#[async_trait]
impl InterpreterStore for PgStore {
    async fn find_by_record_id(&self, record_id: &str) -> StoreResult<Option<Interpreter>> {
        self.interpreters.find_by_record_id(record_id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Interpreter>> {
        self.interpreters.find_by_email(email).await
    }

    async fn find_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<Interpreter>> {
        self.interpreters.find_by_employee_id(employee_id).await
    }

    async fn insert(&self, interpreter: &Interpreter) -> StoreResult<()> {
        self.interpreters.insert(interpreter).await
    }

    async fn update(&self, interpreter: &Interpreter) -> StoreResult<()> {
        self.interpreters.update(interpreter).await
    }
}

#[async_trait]
impl SyncRunStore for PgStore {
    async fn insert(&self, op: &SyncOperation) -> StoreResult<()> {
        self.runs.insert(op).await
    }

    async fn update(&self, op: &SyncOperation) -> StoreResult<()> {
        self.runs.update(op).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<SyncOperation>> {
        self.runs.get(id).await
    }

    async fn list_recent(&self, limit: i64) -> StoreResult<Vec<SyncOperation>> {
        self.runs.list_recent(limit).await
    }
}

#[async_trait]
impl SyncLogStore for PgStore {
    async fn append(&self, entry: &SyncLogEntry) -> StoreResult<()> {
        self.logs.append(entry).await
    }

    async fn list_for_run(&self, sync_operation_id: &str) -> StoreResult<Vec<SyncLogEntry>> {
        self.logs.list_for_run(sync_operation_id).await
    }
}
