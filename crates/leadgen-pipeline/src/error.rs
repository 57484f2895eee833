use leadgen_core::{JobStatus, Platform};
use leadgen_db::DbError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("job {id} is not in expected status '{expected_status}'")]
    InvalidJobTransition {
        id: Uuid,
        expected_status: &'static str,
    },

    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => StoreError::NotFound,
            DbError::InvalidJobTransition {
                id,
                expected_status,
            } => StoreError::InvalidJobTransition {
                id,
                expected_status,
            },
            other => StoreError::Db(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("campaign {0} not found")]
    CampaignNotFound(Uuid),

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("platform {platform} is not enabled for campaign {campaign_id}")]
    PlatformNotInCampaign {
        campaign_id: Uuid,
        platform: Platform,
    },

    #[error("job {job_id} does not belong to campaign {campaign_id}")]
    JobNotInCampaign { job_id: Uuid, campaign_id: Uuid },

    #[error("job {job_id} is {status}; leads can only be added to a running job")]
    JobNotRunning { job_id: Uuid, status: JobStatus },

    #[error("invalid lead at index {index}: {reason}")]
    InvalidLead { index: usize, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the inbound crawler webhook, in the order they are checked.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("crawler webhook secret is not configured")]
    MissingSecret,

    #[error("missing or invalid webhook signature")]
    InvalidSignature,

    #[error("malformed crawler event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("crawler event has no job id in its metadata")]
    MissingJobId,

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}
