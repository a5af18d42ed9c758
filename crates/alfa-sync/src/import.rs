//! Background candidate import jobs.
//!
//! Pulls filtered candidates out of the CRM and reconciles them into
//! the interpreter table, reporting progress through the
//! [`JobTracker`] at fixed milestones so pollers see motion.

use std::sync::Arc;
use tracing::{error, info, instrument};

use alfa_crm::{Criteria, CrmApi, RateLimiter};

use crate::engine::reconcile_candidates;
use crate::error::{SyncError, SyncResult};
use crate::jobs::{ImportSummary, JobStatus, JobTracker};
use crate::store::InterpreterStore;

/// Most records one import job may pull.
pub const MAX_IMPORT_RECORDS: usize = 1000;

/// Parameters of an import job.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Cap on records fetched; `None` fetches everything.
    pub max_records: Option<usize>,
    /// Whether matched interpreters are updated or left alone.
    pub update_existing: bool,
    /// Filter on `LL_Onboarding_Status`.
    pub onboarding_status: Option<String>,
    /// Filter on `Language`.
    pub language: Option<String>,
    /// Filter on `Service_Location`.
    pub service_location: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_records: None,
            update_existing: true,
            onboarding_status: Some("Fully Onboarded".to_string()),
            language: None,
            service_location: None,
        }
    }
}

impl ImportOptions {
    /// Reject out-of-range parameters before any work starts.
    pub fn validate(&self) -> SyncResult<()> {
        if let Some(max_records) = self.max_records {
            if max_records < 1 {
                return Err(SyncError::validation("max_records must be a positive integer"));
            }
            if max_records > MAX_IMPORT_RECORDS {
                return Err(SyncError::validation("max_records cannot exceed 1000"));
            }
        }
        Ok(())
    }

    fn criteria(&self) -> Criteria {
        let mut criteria = Criteria::new();
        criteria = criteria.equals_opt("LL_Onboarding_Status", self.onboarding_status.as_deref());
        criteria = criteria.equals_opt("Language", self.language.as_deref());
        criteria = criteria.equals_opt("Service_Location", self.service_location.as_deref());
        criteria
    }
}

/// Runs import jobs against the CRM and interpreter store.
pub struct CandidateImporter {
    crm: Arc<dyn CrmApi>,
    interpreters: Arc<dyn InterpreterStore>,
    jobs: Arc<JobTracker>,
    limiter: Arc<RateLimiter>,
}

impl CandidateImporter {
    /// Create an importer.
    pub fn new(
        crm: Arc<dyn CrmApi>,
        interpreters: Arc<dyn InterpreterStore>,
        jobs: Arc<JobTracker>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            crm,
            interpreters,
            jobs,
            limiter,
        }
    }

    /// The tracker this importer reports through.
    #[must_use]
    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.jobs
    }

    /// Run one import job to completion.
    ///
    /// Never returns an error: every failure path lands in the
    /// tracker as a `failed` status, which is what pollers see.
    #[instrument(skip(self, options), fields(job_id = %job_id, module = %module))]
    pub async fn run(&self, job_id: &str, module: &str, options: ImportOptions) {
        if let Err(err) = options.validate() {
            error!(job_id = %job_id, error = %err, "import job rejected");
            self.jobs.set_status(job_id, JobStatus::failed(err.to_string()));
            return;
        }

        self.jobs.set_status(
            job_id,
            JobStatus::in_progress(0, "Fetching candidates from Zoho CRM..."),
        );

        self.limiter.wait_if_needed().await;

        let criteria = options.criteria();
        info!(
            job_id = %job_id,
            criteria = %criteria,
            "fetching candidates"
        );

        let candidates = match self
            .crm
            .get_all_records(module, Some(&criteria), options.max_records)
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(job_id = %job_id, error = %err, "import job failed");
                self.jobs.set_status(job_id, JobStatus::failed(err.to_string()));
                return;
            }
        };

        if candidates.is_empty() {
            self.jobs.set_status(
                job_id,
                JobStatus::completed("No candidates found in Zoho CRM", ImportSummary::default()),
            );
            return;
        }

        self.advance(job_id, 30, format!("Processing {} candidates...", candidates.len()));

        info!(job_id = %job_id, count = candidates.len(), "processing candidates");
        let outcome =
            reconcile_candidates(self.interpreters.as_ref(), &candidates, options.update_existing)
                .await;

        self.advance(job_id, 80, "Saving to database...".to_string());

        let summary = ImportSummary {
            total: candidates.len(),
            created: outcome.created.len(),
            updated: outcome.updated.len(),
            skipped: outcome.skipped.len(),
            errors: outcome.errors.len(),
        };
        self.jobs.set_status(
            job_id,
            JobStatus::completed(
                format!(
                    "Successfully imported {} and updated {} interpreters",
                    summary.created, summary.updated
                ),
                summary,
            ),
        );
        info!(job_id = %job_id, "import job completed");
    }

    /// Move a running job to a new milestone, keeping its original
    /// timestamp.
    fn advance(&self, job_id: &str, progress: u8, message: String) {
        let mut status = self
            .jobs
            .get_status(job_id)
            .unwrap_or_else(|| JobStatus::in_progress(progress, message.clone()));
        status.progress = progress;
        status.message = message;
        self.jobs.set_status(job_id, status);
    }
}
