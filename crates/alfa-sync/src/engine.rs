//! Candidate reconciliation.
//!
//! Takes a batch of CRM candidates and reconciles each one against
//! the interpreter table: create, update changed fields only, or skip.
//! Per-record failures are collected, never propagated, so one bad
//! record cannot abort the batch.

use tracing::{debug, instrument};

use alfa_crm::CrmRecord;
use alfa_db::Interpreter;

use crate::mapper::{self, apply_changes};
use crate::store::InterpreterStore;
use crate::types::epoch_millis;

/// Why a candidate was skipped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SkippedRecord {
    /// Candidate email, for the audit log.
    pub email: Option<String>,
    /// Candidate employee id, for the audit log.
    pub employee_id: Option<String>,
    /// Skip reason.
    pub reason: String,
}

/// A candidate that failed to process.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecordError {
    /// CRM record id, when the record carried one.
    pub record_id: Option<String>,
    /// Error text.
    pub error: String,
}

/// Result of reconciling one batch of candidates.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Interpreters created, in candidate order.
    pub created: Vec<Interpreter>,
    /// Interpreters updated, in candidate order.
    pub updated: Vec<Interpreter>,
    /// Candidates skipped.
    pub skipped: Vec<SkippedRecord>,
    /// Candidates that failed.
    pub errors: Vec<RecordError>,
}

impl ReconcileOutcome {
    /// CRM ids of every created or updated interpreter, in order.
    /// These are the records eligible for the "Synced" write-back.
    #[must_use]
    pub fn processed_record_ids(&self) -> Vec<String> {
        self.created
            .iter()
            .chain(self.updated.iter())
            .filter_map(|i| i.record_id.clone())
            .collect()
    }
}

/// Reconcile a batch of CRM candidates against the interpreter table.
///
/// Matching tries `record_id`, then `email`, then `employee_id`;
/// empty match keys are ignored. When `update_existing` is false a
/// matched candidate is skipped instead of updated.
///
/// Infallible by design: store and mapping failures for one candidate
/// land in [`ReconcileOutcome::errors`] and the batch continues.
#[instrument(skip(store, candidates), fields(count = candidates.len()))]
pub async fn reconcile_candidates(
    store: &dyn InterpreterStore,
    candidates: &[CrmRecord],
    update_existing: bool,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let batch_millis = epoch_millis();
    let mut id_counter = 0u32;

    for candidate in candidates {
        match reconcile_one(store, candidate, update_existing, batch_millis, &mut id_counter).await
        {
            Ok(RecordAction::Created(interpreter)) => outcome.created.push(interpreter),
            Ok(RecordAction::Updated(interpreter)) => outcome.updated.push(interpreter),
            Ok(RecordAction::Skipped(skip)) => outcome.skipped.push(skip),
            Err(error) => outcome.errors.push(RecordError {
                record_id: candidate.id(),
                error,
            }),
        }
    }

    debug!(
        created = outcome.created.len(),
        updated = outcome.updated.len(),
        skipped = outcome.skipped.len(),
        errors = outcome.errors.len(),
        "reconciliation finished"
    );
    outcome
}

enum RecordAction {
    Created(Interpreter),
    Updated(Interpreter),
    Skipped(SkippedRecord),
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

async fn reconcile_one(
    store: &dyn InterpreterStore,
    candidate: &CrmRecord,
    update_existing: bool,
    batch_millis: i64,
    id_counter: &mut u32,
) -> Result<RecordAction, String> {
    let mapped = mapper::map_candidate(candidate);

    if mapped.contact_name.is_empty() {
        return Err("Missing required field: contact_name".to_string());
    }

    let mut existing = None;
    if let Some(record_id) = non_empty(mapped.record_id.as_deref()) {
        existing = store
            .find_by_record_id(record_id)
            .await
            .map_err(|e| e.to_string())?;
    }
    if existing.is_none() {
        if let Some(email) = non_empty(mapped.email.as_deref()) {
            existing = store.find_by_email(email).await.map_err(|e| e.to_string())?;
        }
    }
    if existing.is_none() {
        if let Some(employee_id) = non_empty(mapped.employee_id.as_deref()) {
            existing = store
                .find_by_employee_id(employee_id)
                .await
                .map_err(|e| e.to_string())?;
        }
    }

    if let Some(mut interpreter) = existing {
        if !update_existing {
            return Ok(RecordAction::Skipped(SkippedRecord {
                email: mapped.email,
                employee_id: mapped.employee_id,
                reason: "Already exists".to_string(),
            }));
        }
        if !mapped.has_changes(&interpreter) {
            return Ok(RecordAction::Skipped(SkippedRecord {
                email: mapped.email,
                employee_id: mapped.employee_id,
                reason: "No changes detected".to_string(),
            }));
        }
        let changes = mapped.changed_fields(&interpreter);
        apply_changes(&mut interpreter, &changes);
        store.update(&interpreter).await.map_err(|e| e.to_string())?;
        return Ok(RecordAction::Updated(interpreter));
    }

    let id = format!("{batch_millis}_{id_counter}");
    *id_counter += 1;
    let interpreter = mapped.into_interpreter(id);
    store.insert(&interpreter).await.map_err(|e| e.to_string())?;
    Ok(RecordAction::Created(interpreter))
}
