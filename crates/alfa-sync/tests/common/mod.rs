//! Shared fixtures: a scriptable CRM double and a store wrapper that
//! fails on demand.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use alfa_crm::{BulkUpdateItem, Criteria, CrmApi, CrmError, CrmRecord, CrmResult};
use alfa_db::{Interpreter, StoreResult};
use alfa_sync::{InterpreterStore, MemoryStore};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Scriptable in-memory CRM.
#[derive(Default)]
pub struct MockCrm {
    records: Mutex<Vec<CrmRecord>>,
    search_results: Mutex<HashMap<String, Vec<CrmRecord>>>,
    bulk_calls: Mutex<Vec<Vec<Value>>>,
    single_updates: Mutex<Vec<(String, Value)>>,
    failing_bulk_ids: Mutex<HashSet<String>>,
    fail_fetch: AtomicBool,
    fail_bulk: AtomicBool,
    fail_update: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records returned by `get_all_records`.
    pub fn set_records(&self, records: Vec<Value>) {
        let records = records.into_iter().map(CrmRecord::from_value).collect();
        *self.records.lock().unwrap() = records;
    }

    /// Script the result of an email search.
    pub fn set_search_result(&self, email: &str, records: Vec<Value>) {
        let records = records.into_iter().map(CrmRecord::from_value).collect();
        self.search_results
            .lock()
            .unwrap()
            .insert(email.to_string(), records);
    }

    /// Make `get_all_records` fail.
    pub fn fail_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    /// Make `bulk_update_records` fail at the transport level.
    pub fn fail_bulk(&self) {
        self.fail_bulk.store(true, Ordering::SeqCst);
    }

    /// Make `update_record` fail.
    pub fn fail_update(&self) {
        self.fail_update.store(true, Ordering::SeqCst);
    }

    /// Make bulk updates reject these record ids item by item.
    pub fn fail_bulk_ids(&self, ids: &[&str]) {
        let mut failing = self.failing_bulk_ids.lock().unwrap();
        for id in ids {
            failing.insert((*id).to_string());
        }
    }

    /// Delay every fetch, to hold a sync run open.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    /// Payloads passed to `bulk_update_records`, in call order.
    pub fn bulk_calls(&self) -> Vec<Vec<Value>> {
        self.bulk_calls.lock().unwrap().clone()
    }

    /// `(record_id, fields)` pairs passed to `update_record`.
    pub fn single_updates(&self) -> Vec<(String, Value)> {
        self.single_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl CrmApi for MockCrm {
    async fn get_all_records(
        &self,
        _module: &str,
        _criteria: Option<&Criteria>,
        max_records: Option<usize>,
    ) -> CrmResult<Vec<CrmRecord>> {
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(CrmError::api("INTERNAL_ERROR", "fetch failed"));
        }
        let mut records = self.records.lock().unwrap().clone();
        if let Some(max) = max_records {
            records.truncate(max);
        }
        Ok(records)
    }

    async fn search_by_email(&self, _module: &str, email: &str) -> CrmResult<Vec<CrmRecord>> {
        Ok(self
            .search_results
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_record(
        &self,
        _module: &str,
        record_id: &str,
        fields: Value,
    ) -> CrmResult<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(CrmError::api("INTERNAL_ERROR", "update failed"));
        }
        self.single_updates
            .lock()
            .unwrap()
            .push((record_id.to_string(), fields));
        Ok(())
    }

    async fn bulk_update_records(
        &self,
        _module: &str,
        updates: Vec<Value>,
    ) -> CrmResult<Vec<BulkUpdateItem>> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(CrmError::api("INTERNAL_ERROR", "bulk update failed"));
        }
        self.bulk_calls.lock().unwrap().push(updates.clone());

        let failing = self.failing_bulk_ids.lock().unwrap();
        Ok(updates
            .iter()
            .map(|update| {
                let id = update
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let rejected = id.as_deref().is_some_and(|id| failing.contains(id));
                BulkUpdateItem {
                    id,
                    code: if rejected { "INVALID_DATA" } else { "SUCCESS" }.to_string(),
                    message: rejected.then(|| "record rejected".to_string()),
                }
            })
            .collect())
    }
}

/// Interpreter store that fails inserts for scripted emails; every
/// other call passes through to the wrapped [`MemoryStore`].
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    failing_emails: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing_emails: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_insert_for(&self, email: &str) {
        self.failing_emails.lock().unwrap().insert(email.to_string());
    }
}

#[async_trait]
impl InterpreterStore for FlakyStore {
    async fn find_by_record_id(&self, record_id: &str) -> StoreResult<Option<Interpreter>> {
        self.inner.find_by_record_id(record_id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Interpreter>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<Interpreter>> {
        self.inner.find_by_employee_id(employee_id).await
    }

    async fn insert(&self, interpreter: &Interpreter) -> StoreResult<()> {
        let should_fail = {
            let failing = self.failing_emails.lock().unwrap();
            interpreter
                .email
                .as_deref()
                .is_some_and(|email| failing.contains(email))
        };
        if should_fail {
            return Err(alfa_db::StoreError::Database(sqlx::Error::PoolClosed));
        }
        InterpreterStore::insert(self.inner.as_ref(), interpreter).await
    }

    async fn update(&self, interpreter: &Interpreter) -> StoreResult<()> {
        InterpreterStore::update(self.inner.as_ref(), interpreter).await
    }
}
