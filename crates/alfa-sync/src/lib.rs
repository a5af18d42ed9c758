//! # Alfa sync engine
//!
//! Synchronizes interpreter candidates from Zoho CRM into the
//! payment backend:
//!
//! - [`mapper`]: CRM field mapping and change detection
//! - [`engine`]: batch reconciliation (create / update / skip)
//! - [`orchestrator`]: end-to-end sync runs with audit trail and
//!   CRM write-back, plus single-record test mode
//! - [`import`] / [`jobs`]: background candidate imports with
//!   in-memory progress tracking
//! - [`store`]: persistence ports, with a Postgres implementation in
//!   [`pg`] and an in-memory one for tests

pub mod engine;
pub mod error;
pub mod import;
pub mod jobs;
pub mod logger;
pub mod mapper;
pub mod orchestrator;
pub mod pg;
pub mod store;
pub mod types;

pub use engine::{reconcile_candidates, ReconcileOutcome, RecordError, SkippedRecord};
pub use error::{SyncError, SyncResult};
pub use import::{CandidateImporter, ImportOptions, MAX_IMPORT_RECORDS};
pub use jobs::{ImportSummary, JobStatus, JobTracker, JOB_TTL_HOURS, MAX_JOBS_RETENTION};
pub use logger::SyncLogger;
pub use mapper::{map_candidate, normalize, FieldChange, MappedInterpreter};
pub use orchestrator::{SyncGate, SyncService, TestSyncReport, MANUAL_COOLDOWN_SECONDS};
pub use pg::PgStore;
pub use store::{InterpreterStore, MemoryStore, SyncLogStore, SyncRunStore};
pub use types::{JobState, SyncAction};
