//! Inbound crawler event types and outbound webhook records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Event types pushed by the external crawler and fanned out to users.
    pub enum CrawlerEventType {
        Page => "crawl.page",
        Completed => "crawl.completed",
        Failed => "crawl.failed",
    }
}

/// A user-registered outbound webhook.
#[derive(Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub id: Uuid,
    pub user_id: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<CrawlerEventType>,
    /// Extra headers sent with every delivery.
    pub headers: BTreeMap<String, String>,
    pub is_active: bool,
}

impl WebhookConfig {
    #[must_use]
    pub fn subscribes_to(&self, event: CrawlerEventType) -> bool {
        self.is_active && self.events.contains(&event)
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("url", &self.url)
            .field("secret", &"[redacted]")
            .field("events", &self.events)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// One delivery attempt record. Failed attempts carry `next_retry_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: CrawlerEventType,
    pub payload: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub attempts: i32,
    pub delivered_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
