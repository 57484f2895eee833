//! Database operations for `webhook_configs` and `webhook_deliveries`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use leadgen_core::{CrawlerEventType, WebhookConfig, WebhookDelivery};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{as_strs, parse_all, DbError};

/// A row from the `webhook_configs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookRow {
    pub id: Uuid,
    pub user_id: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub headers: Json<BTreeMap<String, String>>,
    pub is_active: bool,
}

impl TryFrom<WebhookRow> for WebhookConfig {
    type Error = DbError;

    fn try_from(row: WebhookRow) -> Result<Self, Self::Error> {
        Ok(WebhookConfig {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            secret: row.secret,
            events: parse_all(&row.events)?,
            headers: row.headers.0,
            is_active: row.is_active,
        })
    }
}

/// A row from the `webhook_deliveries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookDeliveryRow {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub attempts: i32,
    pub delivered_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WebhookDeliveryRow> for WebhookDelivery {
    type Error = DbError;

    fn try_from(row: WebhookDeliveryRow) -> Result<Self, Self::Error> {
        Ok(WebhookDelivery {
            id: row.id,
            webhook_id: row.webhook_id,
            event_type: row.event_type.parse()?,
            payload: row.payload,
            response_status: row.response_status,
            response_body: row.response_body,
            attempts: row.attempts,
            delivered_at: row.delivered_at,
            next_retry_at: row.next_retry_at,
            created_at: row.created_at,
        })
    }
}

const WEBHOOK_COLUMNS: &str = "id, user_id, url, secret, events, headers, is_active";
const DELIVERY_COLUMNS: &str = "id, webhook_id, event_type, payload, response_status, \
     response_body, attempts, delivered_at, next_retry_at, created_at";

/// Registers an outbound webhook.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_webhook(pool: &PgPool, webhook: &WebhookConfig) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO webhook_configs (id, user_id, url, secret, events, headers, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(webhook.id)
    .bind(&webhook.user_id)
    .bind(&webhook.url)
    .bind(&webhook.secret)
    .bind(as_strs(&webhook.events, CrawlerEventType::as_str))
    .bind(Json(&webhook.headers))
    .bind(webhook.is_active)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetches one webhook by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`.
pub async fn get_webhook(pool: &PgPool, id: Uuid) -> Result<WebhookConfig, DbError> {
    sqlx::query_as::<_, WebhookRow>(&format!(
        "SELECT {WEBHOOK_COLUMNS} FROM webhook_configs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?
    .try_into()
}

/// Active webhooks owned by `user_id` that subscribe to `event`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_webhooks(
    pool: &PgPool,
    user_id: &str,
    event: CrawlerEventType,
) -> Result<Vec<WebhookConfig>, DbError> {
    let rows = sqlx::query_as::<_, WebhookRow>(&format!(
        "SELECT {WEBHOOK_COLUMNS} FROM webhook_configs \
         WHERE user_id = $1 AND is_active AND $2 = ANY(events) \
         ORDER BY created_at, id"
    ))
    .bind(user_id)
    .bind(event.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WebhookConfig::try_from).collect()
}

/// All webhooks registered by `user_id`, active or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_webhooks(pool: &PgPool, user_id: &str) -> Result<Vec<WebhookConfig>, DbError> {
    let rows = sqlx::query_as::<_, WebhookRow>(&format!(
        "SELECT {WEBHOOK_COLUMNS} FROM webhook_configs WHERE user_id = $1 ORDER BY created_at, id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WebhookConfig::try_from).collect()
}

/// Records a delivery attempt.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_delivery(pool: &PgPool, delivery: &WebhookDelivery) -> Result<(), DbError> {
    sqlx::query(&format!(
        "INSERT INTO webhook_deliveries ({DELIVERY_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    ))
    .bind(delivery.id)
    .bind(delivery.webhook_id)
    .bind(delivery.event_type.as_str())
    .bind(&delivery.payload)
    .bind(delivery.response_status)
    .bind(delivery.response_body.as_deref())
    .bind(delivery.attempts)
    .bind(delivery.delivered_at)
    .bind(delivery.next_retry_at)
    .bind(delivery.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Overwrites the outcome columns of an existing delivery.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the delivery does not exist.
pub async fn update_delivery(pool: &PgPool, delivery: &WebhookDelivery) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE webhook_deliveries \
         SET response_status = $1, response_body = $2, attempts = $3, \
             delivered_at = $4, next_retry_at = $5 \
         WHERE id = $6",
    )
    .bind(delivery.response_status)
    .bind(delivery.response_body.as_deref())
    .bind(delivery.attempts)
    .bind(delivery.delivered_at)
    .bind(delivery.next_retry_at)
    .bind(delivery.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Deliveries whose retry marker is due, oldest marker first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn due_deliveries(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<WebhookDelivery>, DbError> {
    let rows = sqlx::query_as::<_, WebhookDeliveryRow>(&format!(
        "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries \
         WHERE next_retry_at IS NOT NULL AND next_retry_at <= $1 \
         ORDER BY next_retry_at, id \
         LIMIT $2"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WebhookDelivery::try_from).collect()
}

/// Delivery attempts for one webhook, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_deliveries(
    pool: &PgPool,
    webhook_id: Uuid,
    limit: i64,
) -> Result<Vec<WebhookDelivery>, DbError> {
    let rows = sqlx::query_as::<_, WebhookDeliveryRow>(&format!(
        "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries \
         WHERE webhook_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(webhook_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WebhookDelivery::try_from).collect()
}
