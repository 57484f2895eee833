//! Job records and the forward-only job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Platform;

string_enum! {
    pub enum JobType {
        Scheduled => "scheduled",
        Manual => "manual",
        Test => "test",
    }
}

string_enum! {
    pub enum JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    /// Terminal jobs are immutable.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// `pending -> running -> {completed, failed, cancelled}`. A pending job
    /// may also be cancelled or failed before it starts.
    #[must_use]
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (
                    JobStatus::Pending | JobStatus::Running,
                    JobStatus::Failed | JobStatus::Cancelled
                )
                | (JobStatus::Running, JobStatus::Completed)
        )
    }
}

/// Running totals for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub leads_found: i64,
    pub pages_scraped: i64,
    pub errors: i64,
}

impl JobStats {
    pub fn merge(&mut self, other: JobStats) {
        self.leads_found += other.leads_found;
        self.pages_scraped += other.pages_scraped;
        self.errors += other.errors;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub platforms: Vec<Platform>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub stats: JobStats,
    pub created_at: DateTime<Utc>,
}
