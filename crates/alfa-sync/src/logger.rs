//! Per-run audit logging.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use alfa_db::{LogLevel, SyncLogEntry};

use crate::store::SyncLogStore;

/// Writes audit entries for one sync run.
///
/// Appends are best effort: a failed audit write is traced and
/// swallowed so it can never abort the run it describes.
#[derive(Clone)]
pub struct SyncLogger {
    store: Arc<dyn SyncLogStore>,
    run_id: String,
}

impl SyncLogger {
    /// Create a logger bound to one run.
    pub fn new(store: Arc<dyn SyncLogStore>, run_id: impl Into<String>) -> Self {
        Self {
            store,
            run_id: run_id.into(),
        }
    }

    /// The run this logger writes to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append an info entry.
    pub async fn info(&self, message: impl Into<String>) {
        self.append(LogLevel::Info, message.into(), None, None, None)
            .await;
    }

    /// Append an entry at any level, optionally tied to a CRM record
    /// and/or interpreter, with an optional structured payload.
    pub async fn record(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        record_id: Option<String>,
        interpreter_id: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        self.append(level, message.into(), record_id, interpreter_id, details)
            .await;
    }

    async fn append(
        &self,
        level: LogLevel,
        message: String,
        record_id: Option<String>,
        interpreter_id: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        let entry = SyncLogEntry {
            id: format!("log_{}", Uuid::new_v4()),
            sync_operation_id: self.run_id.clone(),
            level,
            message,
            record_id,
            interpreter_id,
            details,
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.append(&entry).await {
            warn!(run_id = %self.run_id, error = %err, "failed to write sync log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_logger_appends_entries_for_its_run() {
        let store = Arc::new(MemoryStore::new());
        let logger = SyncLogger::new(store.clone(), "sync_1");

        logger.info("Starting sync").await;
        logger
            .record(
                LogLevel::Error,
                "Error processing record",
                Some("zoho1".to_string()),
                None,
                Some(serde_json::json!({"reason": "bad email"})),
            )
            .await;

        let entries = store.list_for_run("sync_1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].record_id.as_deref(), Some("zoho1"));
    }
}
