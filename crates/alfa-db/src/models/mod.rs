//! Persistence models and repositories.

pub mod interpreter;
pub mod sync_log;
pub mod sync_operation;

pub use interpreter::{Interpreter, InterpreterRepository};
pub use sync_log::{LogLevel, SyncLogEntry, SyncLogRepository};
pub use sync_operation::{
    SyncOperation, SyncOperationRepository, SyncRunStatus, TriggerType,
};
