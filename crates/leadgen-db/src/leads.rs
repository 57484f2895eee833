//! Database operations for `scraped_leads`.

use chrono::{DateTime, Utc};
use leadgen_core::{CandidateLead, Lead, LeadFilter, LeadUpdate};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::DbError;

/// A row from the `scraped_leads` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub job_id: Option<Uuid>,
    pub platform: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_handle: Option<String>,
    pub reddit_username: Option<String>,
    pub source_url: Option<String>,
    pub source_content: Option<String>,
    pub scraped_data: serde_json::Value,
    pub lead_score: f64,
    pub status: String,
    pub is_duplicate: bool,
    pub duplicate_of: Option<Uuid>,
    pub enrichment_status: String,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = DbError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            candidate: CandidateLead {
                id: row.id,
                campaign_id: row.campaign_id,
                job_id: row.job_id,
                platform: row.platform.parse()?,
                first_name: row.first_name,
                last_name: row.last_name,
                full_name: row.full_name,
                email: row.email,
                phone: row.phone,
                title: row.title,
                company: row.company,
                company_size: row.company_size,
                industry: row.industry,
                location: row.location,
                website: row.website,
                linkedin_url: row.linkedin_url,
                twitter_handle: row.twitter_handle,
                reddit_username: row.reddit_username,
                source_url: row.source_url,
                source_content: row.source_content,
                scraped_data: row.scraped_data,
                lead_score: row.lead_score,
                is_duplicate: row.is_duplicate,
                duplicate_of: row.duplicate_of,
            },
            status: row.status.parse()?,
            enrichment_status: row.enrichment_status.parse()?,
            dedupe_key: row.dedupe_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const LEAD_COLUMNS: &str = "id, campaign_id, job_id, platform, first_name, last_name, \
     full_name, email, phone, title, company, company_size, industry, location, website, \
     linkedin_url, twitter_handle, reddit_username, source_url, source_content, scraped_data, \
     lead_score, status, is_duplicate, duplicate_of, enrichment_status, dedupe_key, \
     created_at, updated_at";

/// Inserts one lead row and returns the lead as stored.
///
/// `idx_scraped_leads_canonical_key` allows one canonical row per
/// `(campaign_id, dedupe_key)`. A canonical lead that loses that race is
/// stored as a duplicate of the row that holds the key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if an insert fails, or [`DbError::NotFound`]
/// if the conflicting canonical row disappeared before it could be read.
pub async fn insert_lead(pool: &PgPool, lead: &Lead) -> Result<Lead, DbError> {
    if insert_row(pool, lead).await? {
        return Ok(lead.clone());
    }
    let Some(key) = lead.dedupe_key.as_deref() else {
        return Err(DbError::NotFound);
    };
    let canonical: Uuid = sqlx::query_scalar(
        "SELECT id FROM scraped_leads \
         WHERE campaign_id = $1 AND dedupe_key = $2 AND NOT is_duplicate",
    )
    .bind(lead.candidate.campaign_id)
    .bind(key)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    let mut duplicate = lead.clone();
    duplicate.candidate.is_duplicate = true;
    duplicate.candidate.duplicate_of = Some(canonical);
    insert_row(pool, &duplicate).await?;
    Ok(duplicate)
}

/// Returns `false` when a canonical row already holds the lead's key.
async fn insert_row(pool: &PgPool, lead: &Lead) -> Result<bool, DbError> {
    let c = &lead.candidate;
    let result = sqlx::query(&format!(
        "INSERT INTO scraped_leads ({LEAD_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                 $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29) \
         ON CONFLICT (campaign_id, dedupe_key) \
             WHERE NOT is_duplicate AND dedupe_key IS NOT NULL DO NOTHING"
    ))
    .bind(c.id)
    .bind(c.campaign_id)
    .bind(c.job_id)
    .bind(c.platform.as_str())
    .bind(c.first_name.as_deref())
    .bind(c.last_name.as_deref())
    .bind(c.full_name.as_deref())
    .bind(c.email.as_deref())
    .bind(c.phone.as_deref())
    .bind(c.title.as_deref())
    .bind(c.company.as_deref())
    .bind(c.company_size.as_deref())
    .bind(c.industry.as_deref())
    .bind(c.location.as_deref())
    .bind(c.website.as_deref())
    .bind(c.linkedin_url.as_deref())
    .bind(c.twitter_handle.as_deref())
    .bind(c.reddit_username.as_deref())
    .bind(c.source_url.as_deref())
    .bind(c.source_content.as_deref())
    .bind(&c.scraped_data)
    .bind(c.lead_score)
    .bind(lead.status.as_str())
    .bind(c.is_duplicate)
    .bind(c.duplicate_of)
    .bind(lead.enrichment_status.as_str())
    .bind(lead.dedupe_key.as_deref())
    .bind(lead.created_at)
    .bind(lead.updated_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Fetches a single lead by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`.
pub async fn get_lead(pool: &PgPool, id: Uuid) -> Result<Lead, DbError> {
    sqlx::query_as::<_, LeadRow>(&format!(
        "SELECT {LEAD_COLUMNS} FROM scraped_leads WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?
    .try_into()
}

/// Dedupe keys of a campaign's canonical (non-duplicate) leads, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn canonical_keys(pool: &PgPool, campaign_id: Uuid) -> Result<Vec<(String, Uuid)>, DbError> {
    let rows = sqlx::query_as::<_, (String, Uuid)>(
        "SELECT dedupe_key, id FROM scraped_leads \
         WHERE campaign_id = $1 AND NOT is_duplicate AND dedupe_key IS NOT NULL \
         ORDER BY created_at, id",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &LeadFilter) {
    qb.push(" WHERE TRUE");
    if let Some(campaign_id) = filter.campaign_id {
        qb.push(" AND campaign_id = ").push_bind(campaign_id);
    }
    if let Some(platform) = filter.platform {
        qb.push(" AND platform = ").push_bind(platform.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(status) = filter.enrichment_status {
        qb.push(" AND enrichment_status = ").push_bind(status.as_str());
    }
    for (column, wanted) in [("email", filter.has_email), ("phone", filter.has_phone)] {
        match wanted {
            Some(true) => {
                qb.push(format!(" AND {column} IS NOT NULL AND {column} <> ''"));
            }
            Some(false) => {
                qb.push(format!(" AND ({column} IS NULL OR {column} = '')"));
            }
            None => {}
        }
    }
    if let Some(min_score) = filter.min_score {
        qb.push(" AND lead_score >= ").push_bind(min_score);
    }
}

/// One page of leads matching `filter`, newest first, plus the total count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn query_leads(pool: &PgPool, filter: &LeadFilter) -> Result<(Vec<Lead>, i64), DbError> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM scraped_leads");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {LEAD_COLUMNS} FROM scraped_leads"));
    push_filters(&mut select, filter);
    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
    let rows = select.build_query_as::<LeadRow>().fetch_all(pool).await?;

    let leads = rows
        .into_iter()
        .map(Lead::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((leads, total))
}

/// Applies a partial update and returns the updated lead.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no lead has the given `id`.
pub async fn update_lead(pool: &PgPool, id: Uuid, update: &LeadUpdate) -> Result<Lead, DbError> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE scraped_leads SET updated_at = NOW()");
    if let Some(status) = update.status {
        qb.push(", status = ").push_bind(status.as_str());
    }
    if let Some(status) = update.enrichment_status {
        qb.push(", enrichment_status = ").push_bind(status.as_str());
    }
    if let Some(score) = update.lead_score {
        qb.push(", lead_score = ").push_bind(score);
    }
    for (column, value) in update.text_fields() {
        qb.push(format!(", {column} = "))
            .push_bind(value.map(str::to_string));
    }
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(format!(" RETURNING {LEAD_COLUMNS}"));

    qb.build_query_as::<LeadRow>()
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?
        .try_into()
}
