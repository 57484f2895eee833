use std::time::Duration;

use leadgen_core::{AppConfig, CoreError};
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/leadgen-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("job {id} is not in expected status '{expected_status}'")]
    InvalidJobTransition {
        id: Uuid,
        expected_status: &'static str,
    },
    #[error("stored row could not be decoded: {0}")]
    Decode(#[from] CoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; treat absence as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Parses stored text values back into a string enum.
pub(crate) fn parse_all<T>(values: &[String]) -> Result<Vec<T>, CoreError>
where
    T: std::str::FromStr<Err = CoreError>,
{
    values.iter().map(|v| v.parse()).collect()
}

pub(crate) fn as_strs<T: Copy>(values: &[T], f: fn(T) -> &'static str) -> Vec<String> {
    values.iter().map(|v| f(*v).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadgen_core::Platform;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn parse_all_rejects_unknown_values() {
        let ok: Vec<Platform> = parse_all(&["reddit".to_string(), "website".to_string()]).unwrap();
        assert_eq!(ok, vec![Platform::Reddit, Platform::Website]);
        assert!(parse_all::<Platform>(&["myspace".to_string()]).is_err());
    }
}

pub mod analytics;
pub mod campaigns;
pub mod jobs;
pub mod leads;
pub mod webhooks;

pub use analytics::lead_analytics;
pub use campaigns::{
    create_campaign, due_campaigns, get_campaign, list_campaigns, list_platform_configs,
    record_campaign_run, set_campaign_status, set_next_run_at, CampaignRow, PlatformConfigRow,
};
pub use jobs::{
    add_job_stats, cancel_job, complete_job, create_job, fail_job, get_job, job_status,
    list_jobs, start_job, JobRow,
};
pub use leads::{canonical_keys, get_lead, insert_lead, query_leads, update_lead, LeadRow};
pub use webhooks::{
    create_webhook, due_deliveries, get_webhook, insert_delivery, list_active_webhooks,
    list_deliveries, list_webhooks, update_delivery, WebhookDeliveryRow, WebhookRow,
};
