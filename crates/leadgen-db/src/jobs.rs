//! Database operations for `scraping_jobs`.
//!
//! Status transitions are guarded in SQL (`WHERE status = ...`) so a job can
//! only move forward; a guard miss surfaces as
//! [`DbError::InvalidJobTransition`].

use chrono::{DateTime, Utc};
use leadgen_core::{Job, JobStats, JobStatus, JobType, Platform};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{as_strs, parse_all, DbError};

/// A row from the `scraping_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub platforms: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub leads_found: i64,
    pub pages_scraped: i64,
    pub errors: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            campaign_id: row.campaign_id,
            job_type: row.job_type.parse()?,
            status: row.status.parse()?,
            platforms: parse_all(&row.platforms)?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            stats: JobStats {
                leads_found: row.leads_found,
                pages_scraped: row.pages_scraped,
                errors: row.errors,
            },
            created_at: row.created_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, campaign_id, job_type, status, platforms, started_at, \
     completed_at, error_message, leads_found, pages_scraped, errors, created_at";

/// Creates a job in `pending` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_job(
    pool: &PgPool,
    campaign_id: Uuid,
    job_type: JobType,
    platforms: &[Platform],
) -> Result<Job, DbError> {
    sqlx::query_as::<_, JobRow>(&format!(
        "INSERT INTO scraping_jobs (id, campaign_id, job_type, status, platforms) \
         VALUES ($1, $2, $3, 'pending', $4) \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(campaign_id)
    .bind(job_type.as_str())
    .bind(as_strs(platforms, Platform::as_str))
    .fetch_one(pool)
    .await?
    .try_into()
}

/// Fetches a single job by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`.
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Job, DbError> {
    sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM scraping_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?
    .try_into()
}

/// Returns the most recent `limit` jobs for a campaign.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs(pool: &PgPool, campaign_id: Uuid, limit: i64) -> Result<Vec<Job>, DbError> {
    let rows = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM scraping_jobs \
         WHERE campaign_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(campaign_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Job::try_from).collect()
}

/// Marks a pending job as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `pending`.
pub async fn start_job(pool: &PgPool, id: Uuid) -> Result<Job, DbError> {
    sqlx::query_as::<_, JobRow>(&format!(
        "UPDATE scraping_jobs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'pending' \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::InvalidJobTransition {
        id,
        expected_status: "pending",
    })?
    .try_into()
}

/// Marks a running job as `completed` and writes its final stats.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `running`.
pub async fn complete_job(pool: &PgPool, id: Uuid, stats: JobStats) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_jobs \
         SET status = 'completed', completed_at = NOW(), \
             leads_found = $1, pages_scraped = $2, errors = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(stats.leads_found)
    .bind(stats.pages_scraped)
    .bind(stats.errors)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(())
}

/// Marks a non-terminal job as `failed`, keeping the stats gathered so far.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already terminal.
pub async fn fail_job(
    pool: &PgPool,
    id: Uuid,
    error_message: &str,
    stats: JobStats,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_jobs \
         SET status = 'failed', completed_at = NOW(), error_message = $1, \
             leads_found = $2, pages_scraped = $3, errors = $4 \
         WHERE id = $5 AND status IN ('pending', 'running')",
    )
    .bind(error_message)
    .bind(stats.leads_found)
    .bind(stats.pages_scraped)
    .bind(stats.errors)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending or running",
        });
    }
    Ok(())
}

/// Moves a non-terminal job to `cancelled`. Leads already stored are kept.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already terminal.
pub async fn cancel_job(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_jobs \
         SET status = 'cancelled', completed_at = NOW() \
         WHERE id = $1 AND status IN ('pending', 'running')",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending or running",
        });
    }
    Ok(())
}

/// Adds `delta` to a running job's stats and returns the new totals.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `running`.
pub async fn add_job_stats(pool: &PgPool, id: Uuid, delta: JobStats) -> Result<JobStats, DbError> {
    let row = sqlx::query_as::<_, (i64, i64, i64)>(
        "UPDATE scraping_jobs \
         SET leads_found = leads_found + $1, \
             pages_scraped = pages_scraped + $2, \
             errors = errors + $3 \
         WHERE id = $4 AND status = 'running' \
         RETURNING leads_found, pages_scraped, errors",
    )
    .bind(delta.leads_found)
    .bind(delta.pages_scraped)
    .bind(delta.errors)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::InvalidJobTransition {
        id,
        expected_status: "running",
    })?;

    Ok(JobStats {
        leads_found: row.0,
        pages_scraped: row.1,
        errors: row.2,
    })
}

/// Current status of a job, used for cancellation checks.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the job does not exist.
pub async fn job_status(pool: &PgPool, id: Uuid) -> Result<JobStatus, DbError> {
    let status: String = sqlx::query_scalar("SELECT status FROM scraping_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(status.parse()?)
}
