//! Sync run orchestration.
//!
//! [`SyncService`] owns one end-to-end run: fetch pending candidates,
//! reconcile them into the interpreter table, write "Synced" back to
//! the CRM, and record the run with a full audit trail. Admission
//! goes through [`SyncGate`], which enforces single-flight and the
//! manual-trigger cooldown.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use alfa_crm::{Criteria, CrmApi, CrmRecord, RateLimiter, BULK_UPDATE_LIMIT};
use alfa_db::{LogLevel, SyncOperation, SyncRunStatus, TriggerType};

use crate::engine::{reconcile_candidates, ReconcileOutcome};
use crate::error::{SyncError, SyncResult};
use crate::logger::SyncLogger;
use crate::mapper;
use crate::store::{InterpreterStore, SyncLogStore, SyncRunStore};
use crate::types::{epoch_millis, SyncAction};

/// Minimum gap between completed manual runs.
pub const MANUAL_COOLDOWN_SECONDS: i64 = 300;

/// Records scanned when fetching a single record by id in test mode.
const TEST_FETCH_SCAN_LIMIT: usize = 1000;

/// Admission control for sync runs.
///
/// At most one run at a time, process wide; manual triggers are also
/// held to a cooldown after the previous run finished, so an
/// operator double-clicking the sync button cannot hammer the CRM.
/// Scheduled and refresh triggers bypass the cooldown.
#[derive(Debug)]
pub struct SyncGate {
    state: Mutex<GateState>,
    cooldown: ChronoDuration,
}

#[derive(Debug, Default)]
struct GateState {
    running: bool,
    last_finished: Option<DateTime<Utc>>,
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncGate {
    /// Gate with the default manual cooldown.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cooldown(ChronoDuration::seconds(MANUAL_COOLDOWN_SECONDS))
    }

    /// Gate with an explicit cooldown.
    #[must_use]
    pub fn with_cooldown(cooldown: ChronoDuration) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            cooldown,
        }
    }

    /// Try to admit a run. On success the gate stays closed until
    /// [`SyncGate::finish`] is called.
    pub fn try_start(&self, trigger: TriggerType) -> SyncResult<()> {
        let Ok(mut state) = self.state.lock() else {
            return Err(SyncError::internal("sync gate lock poisoned"));
        };
        if state.running {
            return Err(SyncError::AlreadyRunning);
        }
        if trigger == TriggerType::Manual {
            if let Some(last) = state.last_finished {
                let since = Utc::now() - last;
                if since < self.cooldown {
                    let remaining = (self.cooldown - since).num_seconds().max(0) as u64;
                    return Err(SyncError::Cooldown {
                        remaining_seconds: remaining,
                    });
                }
            }
        }
        state.running = true;
        Ok(())
    }

    /// Release the gate and start the cooldown clock.
    pub fn finish(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.running = false;
            state.last_finished = Some(Utc::now());
        }
    }

    /// Whether a run is currently admitted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }
}

/// Result of a single-record test sync.
///
/// Test mode never fails as a call: every outcome, including errors,
/// is reported through this struct.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestSyncReport {
    /// Whether the end-to-end flow ran.
    pub success: bool,
    /// Key fields of the fetched CRM record.
    pub record_fetched: Option<serde_json::Value>,
    /// What reconciliation did with the record.
    pub action_taken: Option<SyncAction>,
    /// Local interpreter touched or created.
    pub interpreter_id: Option<String>,
    /// Names of the fields that changed.
    pub changes_detected: Vec<String>,
    /// Whether the CRM write-back succeeded.
    pub crm_updated: bool,
    /// Error text, when anything went wrong.
    pub error: Option<String>,
    /// Wall-clock duration.
    pub duration_seconds: f64,
}

/// Orchestrates sync runs end to end.
pub struct SyncService {
    crm: Arc<dyn CrmApi>,
    interpreters: Arc<dyn InterpreterStore>,
    runs: Arc<dyn SyncRunStore>,
    logs: Arc<dyn SyncLogStore>,
    limiter: Arc<RateLimiter>,
    gate: Arc<SyncGate>,
}

impl SyncService {
    /// Create a service with the default rate limiter and gate.
    pub fn new(
        crm: Arc<dyn CrmApi>,
        interpreters: Arc<dyn InterpreterStore>,
        runs: Arc<dyn SyncRunStore>,
        logs: Arc<dyn SyncLogStore>,
    ) -> Self {
        Self {
            crm,
            interpreters,
            runs,
            logs,
            limiter: Arc::new(RateLimiter::zoho_default()),
            gate: Arc::new(SyncGate::new()),
        }
    }

    /// Replace the rate limiter (shared with other CRM callers).
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replace the admission gate.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<SyncGate>) -> Self {
        self.gate = gate;
        self
    }

    /// The admission gate, for status endpoints.
    #[must_use]
    pub fn gate(&self) -> &Arc<SyncGate> {
        &self.gate
    }

    /// Run one synchronization from the CRM into the interpreter
    /// table, writing "Synced" back for every processed record.
    ///
    /// Returns the run record; in-run failures land there as a
    /// `failed` status rather than an `Err`. An `Err` means the run
    /// was rejected up front or its run row could not be created.
    #[instrument(skip(self), fields(module = %module, trigger = %trigger))]
    pub async fn run_sync(
        &self,
        module: &str,
        trigger: TriggerType,
        use_fully_onboarded: bool,
    ) -> SyncResult<SyncOperation> {
        self.gate.try_start(trigger)?;

        let mut op = SyncOperation::new(format!("sync_{}", epoch_millis()), trigger);
        // The running row goes in first so a crash leaves evidence.
        if let Err(err) = self.runs.insert(&op).await {
            self.gate.finish();
            return Err(err.into());
        }

        let logger = SyncLogger::new(self.logs.clone(), op.id.clone());
        if let Err(err) = self.execute_run(&mut op, module, use_fully_onboarded, &logger).await {
            let message = err.to_string();
            error!(run_id = %op.id, error = %message, "sync run failed");
            logger
                .record(
                    LogLevel::Error,
                    format!("Sync failed with exception: {message}"),
                    None,
                    None,
                    Some(json!({ "error": message })),
                )
                .await;
            op.fail(&message, format!("{err:?}"));
            if let Err(persist_err) = self.runs.update(&op).await {
                error!(run_id = %op.id, error = %persist_err, "failed to persist failed run");
            }
        }

        self.gate.finish();
        Ok(op)
    }

    async fn execute_run(
        &self,
        op: &mut SyncOperation,
        module: &str,
        use_fully_onboarded: bool,
        logger: &SyncLogger,
    ) -> SyncResult<()> {
        logger
            .info(format!("Starting sync from Zoho {module} module"))
            .await;

        self.limiter.wait_if_needed().await;
        logger.info("Fetching records with 'Pending Sync' status").await;

        let mut criteria = Criteria::new().equals("Sync_to_Payment_App", "Pending Sync");
        if use_fully_onboarded {
            criteria = criteria.equals("LL_Onboarding_Status", "Fully Onboarded");
            logger
                .info(
                    "Filtering for fully onboarded records only \
                     (LL_Onboarding_Status = 'Fully Onboarded')",
                )
                .await;
        }

        let candidates = self
            .crm
            .get_all_records(module, Some(&criteria), None)
            .await?;

        op.total_fetched = candidates.len() as i32;
        self.runs.update(op).await?;
        logger
            .record(
                LogLevel::Info,
                format!("Fetched {} records from Zoho", candidates.len()),
                None,
                None,
                Some(json!({
                    "module": module,
                    "criteria": criteria.render(),
                    "count": candidates.len(),
                })),
            )
            .await;

        if candidates.is_empty() {
            op.finalize(SyncRunStatus::Completed);
            self.runs.update(op).await?;
            logger
                .info("No records found with 'Pending Sync' status. Sync completed.")
                .await;
            return Ok(());
        }

        logger
            .info(format!("Processing {} records", candidates.len()))
            .await;
        let outcome = reconcile_candidates(self.interpreters.as_ref(), &candidates, true).await;

        op.total_created = outcome.created.len() as i32;
        op.total_updated = outcome.updated.len() as i32;
        op.total_skipped = outcome.skipped.len() as i32;
        op.total_errors = outcome.errors.len() as i32;
        self.runs.update(op).await?;
        self.log_outcome(&outcome, logger).await;

        let sync_errors = self.write_back(module, &outcome, op, logger).await?;

        let status = if !sync_errors.is_empty() || !outcome.errors.is_empty() {
            SyncRunStatus::Partial
        } else {
            SyncRunStatus::Completed
        };
        op.finalize(status);
        self.runs.update(op).await?;

        logger
            .record(
                LogLevel::Info,
                format!("Sync completed with status: {status}"),
                None,
                None,
                Some(json!({
                    "fetched": op.total_fetched,
                    "created": op.total_created,
                    "updated": op.total_updated,
                    "skipped": op.total_skipped,
                    "errors": op.total_errors,
                    "synced_to_crm": op.total_synced_to_crm,
                    "duration": op.duration_seconds,
                })),
            )
            .await;
        info!(
            run_id = %op.id,
            status = %status,
            fetched = op.total_fetched,
            created = op.total_created,
            updated = op.total_updated,
            "sync run finished"
        );
        Ok(())
    }

    async fn log_outcome(&self, outcome: &ReconcileOutcome, logger: &SyncLogger) {
        for interpreter in &outcome.created {
            logger
                .record(
                    LogLevel::Info,
                    format!("Created new interpreter: {}", interpreter.contact_name),
                    interpreter.record_id.clone(),
                    Some(interpreter.id.clone()),
                    None,
                )
                .await;
        }
        for interpreter in &outcome.updated {
            logger
                .record(
                    LogLevel::Info,
                    format!("Updated interpreter: {}", interpreter.contact_name),
                    interpreter.record_id.clone(),
                    Some(interpreter.id.clone()),
                    None,
                )
                .await;
        }
        for skip in &outcome.skipped {
            logger
                .record(
                    LogLevel::Warning,
                    format!(
                        "Skipped record: {} - {}",
                        skip.email.as_deref().unwrap_or_default(),
                        skip.reason
                    ),
                    None,
                    None,
                    serde_json::to_value(skip).ok(),
                )
                .await;
        }
        for record_error in &outcome.errors {
            logger
                .record(
                    LogLevel::Error,
                    format!(
                        "Error processing record: {} - {}",
                        record_error.record_id.as_deref().unwrap_or_default(),
                        record_error.error
                    ),
                    record_error.record_id.clone(),
                    None,
                    serde_json::to_value(record_error).ok(),
                )
                .await;
        }
    }

    /// Mark every processed record "Synced" in the CRM, in batches.
    ///
    /// Returns the ids that failed; batch-level transport errors fail
    /// every id in the batch but never abort the remaining batches.
    async fn write_back(
        &self,
        module: &str,
        outcome: &ReconcileOutcome,
        op: &mut SyncOperation,
        logger: &SyncLogger,
    ) -> SyncResult<Vec<String>> {
        logger.info("Updating Zoho records to mark as 'Synced'").await;

        let record_ids = outcome.processed_record_ids();
        let mut synced = 0i32;
        let mut failed_ids = Vec::new();

        for batch in record_ids.chunks(BULK_UPDATE_LIMIT) {
            self.limiter.wait_if_needed().await;

            let updates: Vec<serde_json::Value> = batch
                .iter()
                .map(|id| json!({ "id": id, "Sync_to_Payment_App": "Synced" }))
                .collect();

            match self.crm.bulk_update_records(module, updates).await {
                Ok(items) => {
                    for item in items {
                        if item.is_success() {
                            synced += 1;
                        } else {
                            let message = item.message.unwrap_or_else(|| item.code.clone());
                            logger
                                .record(
                                    LogLevel::Error,
                                    "Failed to update Zoho record to 'Synced'",
                                    item.id.clone(),
                                    None,
                                    Some(json!({ "error": message })),
                                )
                                .await;
                            failed_ids.push(item.id.unwrap_or_default());
                        }
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    logger
                        .record(
                            LogLevel::Error,
                            format!("Error updating batch to Zoho: {message}"),
                            None,
                            None,
                            Some(json!({ "batch_ids": batch, "error": message })),
                        )
                        .await;
                    failed_ids.extend(batch.iter().cloned());
                }
            }
        }

        op.total_synced_to_crm = synced;
        self.runs.update(op).await?;

        logger
            .info(format!(
                "Successfully marked {synced} records as 'Synced' in Zoho"
            ))
            .await;
        if !failed_ids.is_empty() {
            warn!(count = failed_ids.len(), "some CRM write-backs failed");
            logger
                .record(
                    LogLevel::Warning,
                    format!("Failed to update {} records in Zoho", failed_ids.len()),
                    None,
                    None,
                    Some(json!({ "failed_ids": failed_ids })),
                )
                .await;
        }
        Ok(failed_ids)
    }

    /// Sync one record end to end, for connectivity verification.
    ///
    /// Matches only by email and employee id (the record may not be
    /// attached locally yet), and reports everything in the returned
    /// struct instead of failing.
    #[instrument(skip(self), fields(module = %module))]
    pub async fn test_single_record(
        &self,
        module: &str,
        record_id: Option<&str>,
        email: Option<&str>,
    ) -> TestSyncReport {
        let start = Instant::now();
        let mut report = TestSyncReport::default();

        if record_id.is_none() && email.is_none() {
            report.error = Some("Either record_id or email must be provided".to_string());
            return report;
        }

        self.limiter.wait_if_needed().await;

        let record = if let Some(record_id) = record_id {
            match self.fetch_by_id(module, record_id).await {
                Ok(record) => record,
                Err(err) => {
                    report.error = Some(format!("Failed to fetch record by ID: {err}"));
                    return report;
                }
            }
        } else if let Some(email) = email {
            self.limiter.wait_if_needed().await;
            match self.crm.search_by_email(module, email).await {
                Ok(records) => records.into_iter().next(),
                Err(err) => {
                    report.error = Some(format!("Failed to search by email: {err}"));
                    return report;
                }
            }
        } else {
            None
        };

        let Some(record) = record else {
            let wanted = match record_id {
                Some(id) => format!("ID: {id}"),
                None => format!("email: {}", email.unwrap_or_default()),
            };
            report.error = Some(format!("No record found with {wanted}"));
            return report;
        };

        report.record_fetched = Some(json!({
            "id": record.id(),
            "email": record.text("Email"),
            "contact_name": record.first_text(&["Contact_Name", "Full_Name"]),
            "sync_status": record.text("Sync_to_Payment_App"),
        }));

        if let Err(err) = self.reconcile_single(&record, &mut report).await {
            report.error = Some(format!("Test sync failed: {err}"));
            report.duration_seconds = start.elapsed().as_secs_f64();
            return report;
        }

        if matches!(
            report.action_taken,
            Some(SyncAction::Created | SyncAction::Updated)
        ) {
            if let Some(id) = record.id() {
                self.limiter.wait_if_needed().await;
                match self
                    .crm
                    .update_record(module, &id, json!({ "Sync_to_Payment_App": "Synced" }))
                    .await
                {
                    Ok(()) => report.crm_updated = true,
                    Err(err) => {
                        report.error =
                            Some(format!("Database updated but failed to update Zoho: {err}"));
                    }
                }
            }
        }

        report.success = true;
        report.duration_seconds = start.elapsed().as_secs_f64();
        report
    }

    /// Fetch one record by id. There is no point lookup on the list
    /// endpoint, so scan a capped listing instead; acceptable for a
    /// diagnostic path.
    async fn fetch_by_id(&self, module: &str, record_id: &str) -> SyncResult<Option<CrmRecord>> {
        let first = self.crm.get_all_records(module, None, Some(1)).await?;
        if let Some(record) = first.into_iter().find(|r| r.id().as_deref() == Some(record_id)) {
            return Ok(Some(record));
        }
        let all = self
            .crm
            .get_all_records(module, None, Some(TEST_FETCH_SCAN_LIMIT))
            .await?;
        Ok(all.into_iter().find(|r| r.id().as_deref() == Some(record_id)))
    }

    async fn reconcile_single(
        &self,
        record: &CrmRecord,
        report: &mut TestSyncReport,
    ) -> SyncResult<()> {
        let mapped = mapper::map_candidate(record);

        let mut existing = None;
        if let Some(email) = mapped.email.as_deref().filter(|e| !e.is_empty()) {
            existing = self.interpreters.find_by_email(email).await?;
        }
        if existing.is_none() {
            if let Some(employee_id) = mapped.employee_id.as_deref().filter(|e| !e.is_empty()) {
                existing = self.interpreters.find_by_employee_id(employee_id).await?;
            }
        }

        if let Some(mut interpreter) = existing {
            if mapped.has_changes(&interpreter) {
                let changes = mapped.changed_fields(&interpreter);
                report.changes_detected = changes.iter().map(|c| c.field.to_string()).collect();
                mapper::apply_changes(&mut interpreter, &changes);
                self.interpreters.update(&interpreter).await?;
                report.action_taken = Some(SyncAction::Updated);
            } else {
                report.action_taken = Some(SyncAction::SkippedNoChanges);
            }
            report.interpreter_id = Some(interpreter.id);
        } else {
            let interpreter = mapped.into_interpreter(format!("int_{}", epoch_millis()));
            self.interpreters.insert(&interpreter).await?;
            report.action_taken = Some(SyncAction::Created);
            report.interpreter_id = Some(interpreter.id);
        }
        Ok(())
    }

    /// Fetch one run by id.
    pub async fn get_run(&self, id: &str) -> SyncResult<Option<SyncOperation>> {
        Ok(self.runs.get(id).await?)
    }

    /// List recent runs, newest first.
    pub async fn recent_runs(&self, limit: i64) -> SyncResult<Vec<SyncOperation>> {
        Ok(self.runs.list_recent(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_single_flight() {
        let gate = SyncGate::new();
        gate.try_start(TriggerType::Scheduled).unwrap();
        assert!(gate.is_running());

        let second = gate.try_start(TriggerType::Scheduled);
        assert!(matches!(second, Err(SyncError::AlreadyRunning)));

        gate.finish();
        assert!(!gate.is_running());
    }

    #[test]
    fn test_gate_manual_cooldown() {
        let gate = SyncGate::new();
        gate.try_start(TriggerType::Manual).unwrap();
        gate.finish();

        let again = gate.try_start(TriggerType::Manual);
        assert!(matches!(again, Err(SyncError::Cooldown { .. })));

        // Scheduled runs ignore the cooldown.
        gate.try_start(TriggerType::Scheduled).unwrap();
        gate.finish();
    }

    #[test]
    fn test_gate_zero_cooldown_admits_back_to_back_manual_runs() {
        let gate = SyncGate::with_cooldown(ChronoDuration::zero());
        gate.try_start(TriggerType::Manual).unwrap();
        gate.finish();
        gate.try_start(TriggerType::Manual).unwrap();
        gate.finish();
    }
}
