//! # Alfa DB
//!
//! Local persistence for the Alfa payment backend: the interpreter
//! table (system of record for payees), sync run records, and the
//! append-only sync audit log, with Postgres repositories in the
//! sqlx `query_as` style.

pub mod error;
pub mod models;

pub use error::{StoreError, StoreResult};
pub use models::{
    Interpreter, InterpreterRepository, LogLevel, SyncLogEntry, SyncLogRepository, SyncOperation,
    SyncOperationRepository, SyncRunStatus, TriggerType,
};
