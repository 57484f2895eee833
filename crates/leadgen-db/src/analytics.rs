use chrono::{DateTime, NaiveDate, Utc};
use leadgen_core::{DailyLeads, LeadAnalytics, Platform, PlatformCount};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct LeadCountsRow {
    total_leads: i64,
    qualified_leads: i64,
    enriched_leads: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DailyLeadsRow {
    date: NaiveDate,
    leads: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PlatformCountRow {
    platform: String,
    count: i64,
}

/// Canonical-lead summary across every campaign owned by `user_id`.
///
/// The daily series covers leads created at or after `since`, bucketed by
/// UTC day, oldest first. Platforms are ordered by count, largest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails, or [`DbError::Decode`] for an
/// unknown stored platform.
pub async fn lead_analytics(
    pool: &PgPool,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<LeadAnalytics, DbError> {
    let counts = sqlx::query_as::<_, LeadCountsRow>(
        "SELECT \
            COUNT(*) AS total_leads, \
            COUNT(*) FILTER (\
                WHERE sl.status IN ('qualified', 'contacted', 'nurturing', 'converted')\
            ) AS qualified_leads, \
            COUNT(*) FILTER (WHERE sl.enrichment_status = 'enriched') AS enriched_leads \
         FROM scraped_leads sl \
         JOIN campaigns c ON c.id = sl.campaign_id \
         WHERE c.user_id = $1 AND NOT sl.is_duplicate",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let daily = sqlx::query_as::<_, DailyLeadsRow>(
        "SELECT \
            (sl.created_at AT TIME ZONE 'UTC')::date AS date, \
            COUNT(*) AS leads \
         FROM scraped_leads sl \
         JOIN campaigns c ON c.id = sl.campaign_id \
         WHERE c.user_id = $1 AND NOT sl.is_duplicate AND sl.created_at >= $2 \
         GROUP BY 1 \
         ORDER BY 1",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let platforms = sqlx::query_as::<_, PlatformCountRow>(
        "SELECT sl.platform, COUNT(*) AS count \
         FROM scraped_leads sl \
         JOIN campaigns c ON c.id = sl.campaign_id \
         WHERE c.user_id = $1 AND NOT sl.is_duplicate \
         GROUP BY sl.platform \
         ORDER BY count DESC, sl.platform",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let platform_distribution = platforms
        .into_iter()
        .map(|row| {
            Ok(PlatformCount {
                platform: row.platform.parse::<Platform>()?,
                count: row.count,
            })
        })
        .collect::<Result<Vec<_>, DbError>>()?;

    Ok(LeadAnalytics {
        total_leads: counts.total_leads,
        qualified_leads: counts.qualified_leads,
        enriched_leads: counts.enriched_leads,
        conversion_rate: LeadAnalytics::conversion_rate(
            counts.total_leads,
            counts.qualified_leads,
        ),
        leads_over_time: daily
            .into_iter()
            .map(|row| DailyLeads {
                date: row.date,
                leads: row.leads,
            })
            .collect(),
        platform_distribution,
    })
}
