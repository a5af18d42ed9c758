//! Storage ports used by the sync engine.
//!
//! The engine talks to persistence through these traits so the
//! reconciliation and orchestration logic can be exercised against
//! the in-memory store without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use alfa_db::{Interpreter, StoreError, StoreResult, SyncLogEntry, SyncOperation};

/// Lookup and mutation of interpreter rows.
#[async_trait]
pub trait InterpreterStore: Send + Sync {
    /// Find by CRM record id.
    async fn find_by_record_id(&self, record_id: &str) -> StoreResult<Option<Interpreter>>;

    /// Find by email.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Interpreter>>;

    /// Find by employee id.
    async fn find_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<Interpreter>>;

    /// Insert a new interpreter.
    async fn insert(&self, interpreter: &Interpreter) -> StoreResult<()>;

    /// Write back all mutable fields of an interpreter.
    async fn update(&self, interpreter: &Interpreter) -> StoreResult<()>;
}

/// Persistence for sync run records.
#[async_trait]
pub trait SyncRunStore: Send + Sync {
    /// Insert a new run row.
    async fn insert(&self, op: &SyncOperation) -> StoreResult<()>;

    /// Persist the current counts and status of a run.
    async fn update(&self, op: &SyncOperation) -> StoreResult<()>;

    /// Fetch a run by id.
    async fn get(&self, id: &str) -> StoreResult<Option<SyncOperation>>;

    /// List recent runs, newest first.
    async fn list_recent(&self, limit: i64) -> StoreResult<Vec<SyncOperation>>;
}

/// Persistence for the per-run audit log.
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: &SyncLogEntry) -> StoreResult<()>;

    /// List entries for a run in write order.
    async fn list_for_run(&self, sync_operation_id: &str) -> StoreResult<Vec<SyncLogEntry>>;
}

/// In-memory store for tests and local development.
///
/// Implements all three ports over plain maps. Lookups scan, which is
/// fine at test scale.
#[derive(Debug, Default)]
pub struct MemoryStore {
    interpreters: Mutex<HashMap<String, Interpreter>>,
    runs: Mutex<HashMap<String, SyncOperation>>,
    logs: Mutex<Vec<SyncLogEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interpreters held.
    #[must_use]
    pub fn interpreter_count(&self) -> usize {
        self.interpreters.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Snapshot of every interpreter, in no particular order.
    #[must_use]
    pub fn interpreters(&self) -> Vec<Interpreter> {
        self.interpreters
            .lock()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Fetch an interpreter by local id.
    #[must_use]
    pub fn interpreter(&self, id: &str) -> Option<Interpreter> {
        self.interpreters.lock().ok().and_then(|m| m.get(id).cloned())
    }

    /// Seed an interpreter directly, bypassing the port.
    pub fn seed_interpreter(&self, interpreter: Interpreter) {
        if let Ok(mut map) = self.interpreters.lock() {
            map.insert(interpreter.id.clone(), interpreter);
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Database(sqlx::Error::PoolClosed)
    }
}

#[async_trait]
impl InterpreterStore for MemoryStore {
    async fn find_by_record_id(&self, record_id: &str) -> StoreResult<Option<Interpreter>> {
        let map = self.interpreters.lock().map_err(|_| Self::poisoned())?;
        Ok(map
            .values()
            .find(|i| i.record_id.as_deref() == Some(record_id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Interpreter>> {
        let map = self.interpreters.lock().map_err(|_| Self::poisoned())?;
        Ok(map
            .values()
            .find(|i| i.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<Interpreter>> {
        let map = self.interpreters.lock().map_err(|_| Self::poisoned())?;
        Ok(map
            .values()
            .find(|i| i.employee_id.as_deref() == Some(employee_id))
            .cloned())
    }

    async fn insert(&self, interpreter: &Interpreter) -> StoreResult<()> {
        let mut map = self.interpreters.lock().map_err(|_| Self::poisoned())?;
        map.insert(interpreter.id.clone(), interpreter.clone());
        Ok(())
    }

    async fn update(&self, interpreter: &Interpreter) -> StoreResult<()> {
        let mut map = self.interpreters.lock().map_err(|_| Self::poisoned())?;
        if !map.contains_key(&interpreter.id) {
            return Err(StoreError::not_found("interpreter", &interpreter.id));
        }
        map.insert(interpreter.id.clone(), interpreter.clone());
        Ok(())
    }
}

#[async_trait]
impl SyncRunStore for MemoryStore {
    async fn insert(&self, op: &SyncOperation) -> StoreResult<()> {
        let mut map = self.runs.lock().map_err(|_| Self::poisoned())?;
        map.insert(op.id.clone(), op.clone());
        Ok(())
    }

    async fn update(&self, op: &SyncOperation) -> StoreResult<()> {
        let mut map = self.runs.lock().map_err(|_| Self::poisoned())?;
        if !map.contains_key(&op.id) {
            return Err(StoreError::not_found("sync_operation", &op.id));
        }
        map.insert(op.id.clone(), op.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<SyncOperation>> {
        let map = self.runs.lock().map_err(|_| Self::poisoned())?;
        Ok(map.get(id).cloned())
    }

    async fn list_recent(&self, limit: i64) -> StoreResult<Vec<SyncOperation>> {
        let map = self.runs.lock().map_err(|_| Self::poisoned())?;
        let mut runs: Vec<SyncOperation> = map.values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(runs)
    }
}

#[async_trait]
impl SyncLogStore for MemoryStore {
    async fn append(&self, entry: &SyncLogEntry) -> StoreResult<()> {
        let mut logs = self.logs.lock().map_err(|_| Self::poisoned())?;
        logs.push(entry.clone());
        Ok(())
    }

    async fn list_for_run(&self, sync_operation_id: &str) -> StoreResult<Vec<SyncLogEntry>> {
        let logs = self.logs.lock().map_err(|_| Self::poisoned())?;
        Ok(logs
            .iter()
            .filter(|e| e.sync_operation_id == sync_operation_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_interpreter_lookups() {
        let store = MemoryStore::new();
        let mut interpreter = Interpreter::new("int_1".to_string(), "Ana".to_string());
        interpreter.email = Some("ana@x.com".to_string());
        interpreter.employee_id = Some("EMP1".to_string());
        InterpreterStore::insert(&store, &interpreter).await.unwrap();

        let found = store.find_by_email("ana@x.com").await.unwrap();
        assert_eq!(found.unwrap().id, "int_1");
        let found = store.find_by_employee_id("EMP1").await.unwrap();
        assert_eq!(found.unwrap().id, "int_1");
        assert!(store.find_by_record_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_update_requires_existing_row() {
        let store = MemoryStore::new();
        let interpreter = Interpreter::new("int_1".to_string(), "Ana".to_string());
        let result = InterpreterStore::update(&store, &interpreter).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
