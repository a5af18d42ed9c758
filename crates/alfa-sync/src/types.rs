//! Common types for synchronization and import jobs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action taken for one candidate during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// A new interpreter was created.
    Created,
    /// An existing interpreter was updated.
    Updated,
    /// An existing interpreter matched but nothing changed.
    SkippedNoChanges,
}

impl SyncAction {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
            SyncAction::SkippedNoChanges => "skipped_no_changes",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a background import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is running.
    InProgress,
    /// Job finished successfully.
    Completed,
    /// Job failed.
    Failed,
}

impl JobState {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::InProgress => "in_progress",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Whether the job can no longer change; only terminal jobs are
    /// ever evicted from the tracker.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(JobState::InProgress),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            _ => Err(format!("Unknown job state: {s}")),
        }
    }
}

/// Current UTC time in epoch milliseconds; id prefixes use this.
#[must_use]
pub(crate) fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_roundtrip() {
        for state in [JobState::InProgress, JobState::Completed, JobState::Failed] {
            let parsed: JobState = state.as_str().parse().unwrap();
            assert_eq!(state, parsed);
        }
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::InProgress.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_sync_action_str() {
        assert_eq!(SyncAction::Created.as_str(), "created");
        assert_eq!(SyncAction::SkippedNoChanges.as_str(), "skipped_no_changes");
    }
}
