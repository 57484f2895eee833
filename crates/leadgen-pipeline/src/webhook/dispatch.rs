use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use leadgen_core::{CrawlerEventType, WebhookConfig, WebhookDelivery};
use reqwest::Client;
use uuid::Uuid;

use crate::store::Store;
use crate::StoreError;

/// Attempts after which a failing delivery is no longer retried.
pub const MAX_DELIVERY_ATTEMPTS: i32 = 5;

const FIRST_RETRY_DELAY_SECS: i64 = 60;
const MAX_RESPONSE_BODY_CHARS: usize = 1000;

/// Counts from one [`WebhookDispatcher::retry_due_deliveries`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub delivered: usize,
    pub rescheduled: usize,
    /// Out of attempts, or the webhook is gone or inactive.
    pub abandoned: usize,
}

struct Attempt {
    status: Option<i32>,
    body: String,
    ok: bool,
}

/// Delay before the next attempt once `attempts` attempts have failed.
fn retry_delay(attempts: i32) -> chrono::Duration {
    let exponent = u32::try_from(attempts.saturating_sub(1)).unwrap_or(0).min(16);
    chrono::Duration::seconds(FIRST_RETRY_DELAY_SECS.saturating_mul(1_i64 << exponent))
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_RESPONSE_BODY_CHARS).collect()
}

/// Posts crawler events to user-registered webhooks and records every attempt.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
    store: Arc<dyn Store>,
}

impl WebhookDispatcher {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be constructed.
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("leadgen-webhooks/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, store })
    }

    /// Delivers `payload` to every active webhook of `user_id` subscribed to
    /// `event`, one at a time. Returns the number of deliveries recorded.
    ///
    /// A failed delivery is recorded with `next_retry_at` one minute out.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the webhooks cannot be listed or an attempt
    /// cannot be recorded.
    pub async fn dispatch(
        &self,
        user_id: &str,
        event: CrawlerEventType,
        payload: &serde_json::Value,
    ) -> Result<usize, StoreError> {
        let hooks = self.store.active_webhooks(user_id, event).await?;
        for hook in &hooks {
            let attempt = self.send(hook, payload).await;
            let now = Utc::now();
            let delivery = WebhookDelivery {
                id: Uuid::new_v4(),
                webhook_id: hook.id,
                event_type: event,
                payload: payload.clone(),
                response_status: attempt.status,
                response_body: Some(attempt.body),
                attempts: 1,
                delivered_at: attempt.ok.then_some(now),
                next_retry_at: (!attempt.ok).then(|| now + retry_delay(1)),
                created_at: now,
            };
            self.store.insert_delivery(&delivery).await?;
        }
        Ok(hooks.len())
    }

    /// Re-sends up to `limit` deliveries whose `next_retry_at` has passed.
    ///
    /// The wait after the n-th failed attempt is one minute doubled n-1
    /// times. After [`MAX_DELIVERY_ATTEMPTS`] the marker is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the due deliveries cannot be loaded or an
    /// outcome cannot be written.
    pub async fn retry_due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<RetrySummary, StoreError> {
        let mut summary = RetrySummary::default();
        for mut delivery in self.store.due_deliveries(now, limit).await? {
            let hook = match self.store.get_webhook(delivery.webhook_id).await {
                Ok(hook) if hook.is_active => hook,
                Ok(_) | Err(StoreError::NotFound) => {
                    tracing::warn!(delivery_id = %delivery.id, webhook_id = %delivery.webhook_id, "webhook missing or inactive; dropping retry");
                    delivery.next_retry_at = None;
                    self.store.update_delivery(&delivery).await?;
                    summary.abandoned += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            summary.attempted += 1;
            let attempt = self.send(&hook, &delivery.payload).await;
            delivery.attempts += 1;
            delivery.response_status = attempt.status;
            delivery.response_body = Some(attempt.body);

            if attempt.ok {
                delivery.delivered_at = Some(Utc::now());
                delivery.next_retry_at = None;
                summary.delivered += 1;
            } else if delivery.attempts >= MAX_DELIVERY_ATTEMPTS {
                tracing::warn!(delivery_id = %delivery.id, attempts = delivery.attempts, "webhook delivery exhausted retries");
                delivery.next_retry_at = None;
                summary.abandoned += 1;
            } else {
                delivery.next_retry_at = Some(now + retry_delay(delivery.attempts));
                summary.rescheduled += 1;
            }
            self.store.update_delivery(&delivery).await?;
        }
        Ok(summary)
    }

    async fn send(&self, hook: &WebhookConfig, payload: &serde_json::Value) -> Attempt {
        let mut request = self
            .client
            .post(&hook.url)
            .header("X-Webhook-Secret", &hook.secret)
            .json(payload);
        for (name, value) in &hook.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if !status.is_success() {
                    tracing::warn!(webhook_id = %hook.id, status = status.as_u16(), "webhook delivery rejected");
                }
                Attempt {
                    status: Some(i32::from(status.as_u16())),
                    body: truncate(&body),
                    ok: status.is_success(),
                }
            }
            Err(e) => {
                tracing::warn!(webhook_id = %hook.id, error = %e, "webhook delivery failed");
                Attempt {
                    status: None,
                    body: truncate(&e.to_string()),
                    ok: false,
                }
            }
        }
    }
}
