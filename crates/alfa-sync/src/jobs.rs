//! In-memory status tracking for background import jobs.
//!
//! Job status lives in process memory behind a lock, insertion
//! ordered so eviction can drop the oldest entries first. Bounded by
//! a retention cap and a TTL; running jobs are never evicted.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

use crate::types::JobState;

/// Most recent jobs kept in memory.
pub const MAX_JOBS_RETENTION: usize = 100;

/// Terminal jobs older than this are dropped during cleanup.
pub const JOB_TTL_HOURS: i64 = 24;

/// Final counts of a completed import job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Candidates fetched from the CRM.
    pub total: usize,
    /// Interpreters created.
    pub created: usize,
    /// Interpreters updated.
    pub updated: usize,
    /// Candidates skipped.
    pub skipped: usize,
    /// Candidates that failed.
    pub errors: usize,
}

/// Point-in-time status of one import job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Current state.
    pub state: JobState,
    /// Progress percentage, 0 to 100.
    pub progress: u8,
    /// Operator-facing progress message.
    pub message: String,
    /// Final counts once completed.
    pub results: Option<ImportSummary>,
    /// Error text once failed.
    pub error: Option<String>,
    /// When this status was first recorded; the tracker stamps it
    /// when absent, so progress updates keep the original time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl JobStatus {
    /// A fresh in-progress status.
    #[must_use]
    pub fn in_progress(progress: u8, message: impl Into<String>) -> Self {
        Self {
            state: JobState::InProgress,
            progress,
            message: message.into(),
            results: None,
            error: None,
            timestamp: None,
        }
    }

    /// A completed status with final counts.
    #[must_use]
    pub fn completed(message: impl Into<String>, results: ImportSummary) -> Self {
        Self {
            state: JobState::Completed,
            progress: 100,
            message: message.into(),
            results: Some(results),
            error: None,
            timestamp: None,
        }
    }

    /// A failed status.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            state: JobState::Failed,
            progress: 0,
            message: format!("Import failed: {error}"),
            results: None,
            error: Some(error),
            timestamp: None,
        }
    }
}

#[derive(Debug, Default)]
struct Jobs {
    order: VecDeque<String>,
    map: HashMap<String, JobStatus>,
}

/// Bounded, insertion-ordered job status registry.
#[derive(Debug)]
pub struct JobTracker {
    jobs: Mutex<Jobs>,
    max_jobs: usize,
    ttl: Duration,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker {
    /// Create a tracker with the default retention limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(MAX_JOBS_RETENTION, Duration::hours(JOB_TTL_HOURS))
    }

    /// Create a tracker with explicit limits.
    #[must_use]
    pub fn with_limits(max_jobs: usize, ttl: Duration) -> Self {
        Self {
            jobs: Mutex::new(Jobs::default()),
            max_jobs,
            ttl,
        }
    }

    /// Record the status of a job, stamping the timestamp if the
    /// caller did not carry one forward.
    pub fn set_status(&self, job_id: &str, mut status: JobStatus) {
        if status.timestamp.is_none() {
            status.timestamp = Some(Utc::now());
        }
        let Ok(mut jobs) = self.jobs.lock() else {
            return;
        };
        if !jobs.map.contains_key(job_id) {
            jobs.order.push_back(job_id.to_string());
        }
        jobs.map.insert(job_id.to_string(), status);
    }

    /// Fetch the status of a job. Runs cleanup first, so reads keep
    /// the registry bounded even when nothing is being written.
    #[must_use]
    pub fn get_status(&self, job_id: &str) -> Option<JobStatus> {
        self.cleanup();
        self.jobs.lock().ok()?.map.get(job_id).cloned()
    }

    /// Number of jobs currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().map(|j| j.map.len()).unwrap_or(0)
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict old terminal jobs. No-op while under the retention cap.
    ///
    /// Two passes: terminal jobs past the TTL go first, then the
    /// oldest terminal jobs until the cap is met. In-progress jobs
    /// are never evicted.
    pub fn cleanup(&self) {
        let Ok(mut jobs) = self.jobs.lock() else {
            return;
        };
        if jobs.map.len() <= self.max_jobs {
            return;
        }
        let Jobs { order, map } = &mut *jobs;

        let cutoff = Utc::now() - self.ttl;
        let expired: Vec<String> = order
            .iter()
            .filter(|id| {
                map.get(*id).is_some_and(|status| {
                    status.state.is_terminal()
                        && status.timestamp.is_some_and(|ts| ts < cutoff)
                })
            })
            .cloned()
            .collect();
        for id in &expired {
            map.remove(id);
            debug!(job_id = %id, "cleaned up expired job");
        }
        order.retain(|id| map.contains_key(id));

        if map.len() > self.max_jobs {
            let excess = map.len() - self.max_jobs;
            let evictable: Vec<String> = order
                .iter()
                .filter(|id| map.get(*id).is_some_and(|status| status.state.is_terminal()))
                .take(excess)
                .cloned()
                .collect();
            for id in &evictable {
                map.remove(id);
                debug!(job_id = %id, "cleaned up excess job");
            }
            order.retain(|id| map.contains_key(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_status() {
        let tracker = JobTracker::new();
        tracker.set_status("job_1", JobStatus::in_progress(0, "Fetching"));

        let status = tracker.get_status("job_1").unwrap();
        assert_eq!(status.state, JobState::InProgress);
        assert_eq!(status.progress, 0);
        assert!(status.timestamp.is_some());
        assert!(tracker.get_status("missing").is_none());
    }

    #[test]
    fn test_progress_update_keeps_original_timestamp() {
        let tracker = JobTracker::new();
        tracker.set_status("job_1", JobStatus::in_progress(0, "Fetching"));
        let first = tracker.get_status("job_1").unwrap();

        let mut next = first.clone();
        next.progress = 30;
        next.message = "Processing 5 candidates...".to_string();
        tracker.set_status("job_1", next);

        let status = tracker.get_status("job_1").unwrap();
        assert_eq!(status.progress, 30);
        assert_eq!(status.timestamp, first.timestamp);
    }

    #[test]
    fn test_cleanup_noop_under_cap() {
        let tracker = JobTracker::with_limits(10, Duration::hours(24));
        for i in 0..5 {
            tracker.set_status(
                &format!("job_{i}"),
                JobStatus::completed("done", ImportSummary::default()),
            );
        }
        tracker.cleanup();
        assert_eq!(tracker.len(), 5);
    }

    #[test]
    fn test_cleanup_evicts_oldest_terminal_jobs_over_cap() {
        let tracker = JobTracker::with_limits(3, Duration::hours(24));
        tracker.set_status("old_done", JobStatus::completed("done", ImportSummary::default()));
        tracker.set_status("running", JobStatus::in_progress(50, "working"));
        tracker.set_status("done_2", JobStatus::failed("boom"));
        tracker.set_status("done_3", JobStatus::completed("done", ImportSummary::default()));
        tracker.set_status("done_4", JobStatus::completed("done", ImportSummary::default()));

        tracker.cleanup();
        assert_eq!(tracker.len(), 3);
        // Oldest terminal jobs went first; the running job survived.
        assert!(tracker.get_status("old_done").is_none());
        assert!(tracker.get_status("done_2").is_none());
        assert!(tracker.get_status("running").is_some());
        assert!(tracker.get_status("done_4").is_some());
    }

    #[test]
    fn test_in_progress_jobs_never_evicted() {
        let tracker = JobTracker::with_limits(2, Duration::hours(24));
        for i in 0..5 {
            tracker.set_status(&format!("job_{i}"), JobStatus::in_progress(0, "working"));
        }
        tracker.cleanup();
        assert_eq!(tracker.len(), 5);
    }

    #[test]
    fn test_expired_terminal_jobs_removed_when_over_cap() {
        let tracker = JobTracker::with_limits(1, Duration::hours(24));
        let mut stale = JobStatus::completed("done", ImportSummary::default());
        stale.timestamp = Some(Utc::now() - Duration::hours(48));
        tracker.set_status("stale", stale);
        tracker.set_status("fresh", JobStatus::completed("done", ImportSummary::default()));

        assert!(tracker.get_status("stale").is_none());
        assert!(tracker.get_status("fresh").is_some());
    }
}
