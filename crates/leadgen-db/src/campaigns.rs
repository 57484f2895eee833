//! Database operations for `campaigns` and `platform_configurations`.

use chrono::{DateTime, Utc};
use leadgen_core::{
    Campaign, CampaignStatus, Frequency, Platform, PlatformConfig, PlatformConfiguration,
    TargetCriteria,
};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{as_strs, parse_all, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `campaigns` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub platforms: Vec<String>,
    pub keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub target_criteria: Json<TargetCriteria>,
    pub frequency: String,
    pub status: String,
    pub total_leads_found: i64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DbError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        Ok(Campaign {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            platforms: parse_all(&row.platforms)?,
            keywords: row.keywords,
            negative_keywords: row.negative_keywords,
            target: row.target_criteria.0,
            frequency: row.frequency.parse()?,
            status: row.status.parse()?,
            total_leads_found: row.total_leads_found,
            last_run_at: row.last_run_at,
            next_run_at: row.next_run_at,
            created_at: row.created_at,
        })
    }
}

/// A row from the `platform_configurations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformConfigRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub platform: String,
    pub config: serde_json::Value,
    pub is_active: bool,
}

impl TryFrom<PlatformConfigRow> for PlatformConfiguration {
    type Error = DbError;

    fn try_from(row: PlatformConfigRow) -> Result<Self, Self::Error> {
        let platform: Platform = row.platform.parse()?;
        Ok(PlatformConfiguration {
            id: row.id,
            campaign_id: row.campaign_id,
            config: PlatformConfig::from_json(platform, row.config)?,
            is_active: row.is_active,
        })
    }
}

const CAMPAIGN_COLUMNS: &str = "id, user_id, name, description, platforms, keywords, \
     negative_keywords, target_criteria, frequency, status, total_leads_found, \
     last_run_at, next_run_at, created_at";

// ---------------------------------------------------------------------------
// campaigns operations
// ---------------------------------------------------------------------------

/// Inserts a campaign together with its platform configurations.
///
/// Runs in one transaction so a rejected configuration leaves no partial
/// campaign behind.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails (including a second active
/// configuration for the same platform).
pub async fn create_campaign(
    pool: &PgPool,
    campaign: &Campaign,
    configs: &[PlatformConfig],
) -> Result<Campaign, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, CampaignRow>(&format!(
        "INSERT INTO campaigns (id, user_id, name, description, platforms, keywords, \
                                negative_keywords, target_criteria, frequency, status, \
                                next_run_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {CAMPAIGN_COLUMNS}"
    ))
    .bind(campaign.id)
    .bind(&campaign.user_id)
    .bind(&campaign.name)
    .bind(campaign.description.as_deref())
    .bind(as_strs(&campaign.platforms, Platform::as_str))
    .bind(&campaign.keywords)
    .bind(&campaign.negative_keywords)
    .bind(Json(&campaign.target))
    .bind(campaign.frequency.as_str())
    .bind(campaign.status.as_str())
    .bind(campaign.next_run_at)
    .bind(campaign.created_at)
    .fetch_one(&mut *tx)
    .await?;

    for config in configs {
        sqlx::query(
            "INSERT INTO platform_configurations (id, campaign_id, platform, config, is_active) \
             VALUES ($1, $2, $3, $4, TRUE)",
        )
        .bind(Uuid::new_v4())
        .bind(campaign.id)
        .bind(config.platform().as_str())
        .bind(config.to_json())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    row.try_into()
}

/// Fetches a single campaign by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, [`DbError::Decode`] if a
/// stored enum value is unknown, or [`DbError::Sqlx`] if the query fails.
pub async fn get_campaign(pool: &PgPool, id: Uuid) -> Result<Campaign, DbError> {
    sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?
    .try_into()
}

/// Lists campaigns, newest first, optionally filtered by owner and status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_campaigns(
    pool: &PgPool,
    user_id: Option<&str>,
    status: Option<CampaignStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Campaign>, DbError> {
    let rows = sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns \
         WHERE ($1::TEXT IS NULL OR user_id = $1) \
           AND ($2::TEXT IS NULL OR status = $2) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3 OFFSET $4"
    ))
    .bind(user_id)
    .bind(status.map(CampaignStatus::as_str))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Campaign::try_from).collect()
}

/// Sets a campaign's status.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the campaign does not exist.
pub async fn set_campaign_status(
    pool: &PgPool,
    id: Uuid,
    status: CampaignStatus,
) -> Result<Campaign, DbError> {
    sqlx::query_as::<_, CampaignRow>(&format!(
        "UPDATE campaigns SET status = $1 WHERE id = $2 RETURNING {CAMPAIGN_COLUMNS}"
    ))
    .bind(status.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?
    .try_into()
}

/// Records a finished run against the campaign.
///
/// `total_leads_found` is incremented in place so concurrent completions do
/// not lose updates. `next_run_at` advances by the campaign frequency and
/// `once` campaigns become `completed`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the campaign does not exist.
pub async fn record_campaign_run(
    pool: &PgPool,
    id: Uuid,
    leads_found: i64,
    ran_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE campaigns \
         SET total_leads_found = total_leads_found + $1, \
             last_run_at = $2, \
             next_run_at = CASE frequency \
                 WHEN 'daily' THEN $2 + INTERVAL '1 day' \
                 WHEN 'weekly' THEN $2 + INTERVAL '7 days' \
                 WHEN 'monthly' THEN $2 + INTERVAL '1 month' \
                 ELSE NULL END, \
             status = CASE WHEN frequency = 'once' THEN 'completed' ELSE status END \
         WHERE id = $3",
    )
    .bind(leads_found)
    .bind(ran_at)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Moves the campaign's next scheduled run.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the campaign does not exist.
pub async fn set_next_run_at(
    pool: &PgPool,
    id: Uuid,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE campaigns SET next_run_at = $1 WHERE id = $2")
        .bind(next_run_at)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Active recurring campaigns whose next run is due and that have no job
/// in flight.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn due_campaigns(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Campaign>, DbError> {
    let rows = sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns c \
         WHERE c.status = 'active' \
           AND c.frequency <> $1 \
           AND (c.next_run_at IS NULL OR c.next_run_at <= $2) \
           AND NOT EXISTS ( \
               SELECT 1 FROM scraping_jobs j \
               WHERE j.campaign_id = c.id AND j.status IN ('pending', 'running')) \
         ORDER BY c.next_run_at NULLS FIRST, c.id"
    ))
    .bind(Frequency::Once.as_str())
    .bind(now)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Campaign::try_from).collect()
}

// ---------------------------------------------------------------------------
// platform_configurations operations
// ---------------------------------------------------------------------------

/// Active platform configurations for a campaign.
///
/// # Errors
///
/// Returns [`DbError::Decode`] if a stored blob no longer matches its
/// platform schema, or [`DbError::Sqlx`] if the query fails.
pub async fn list_platform_configs(
    pool: &PgPool,
    campaign_id: Uuid,
) -> Result<Vec<PlatformConfiguration>, DbError> {
    let rows = sqlx::query_as::<_, PlatformConfigRow>(
        "SELECT id, campaign_id, platform, config, is_active \
         FROM platform_configurations \
         WHERE campaign_id = $1 AND is_active \
         ORDER BY created_at, id",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(PlatformConfiguration::try_from)
        .collect()
}
