use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadgen_core::AppConfig;
use leadgen_pipeline::{Store, WebhookDispatcher};

/// Runs one retry sweep over failed outbound deliveries.
pub(crate) async fn retry(
    store: Arc<dyn Store>,
    config: &AppConfig,
    limit: i64,
) -> anyhow::Result<()> {
    let dispatcher = WebhookDispatcher::new(
        store,
        Duration::from_secs(config.webhook_delivery_timeout_secs),
    )?;
    let summary = dispatcher.retry_due_deliveries(Utc::now(), limit).await?;
    println!(
        "retried {} deliveries: {} delivered, {} rescheduled, {} abandoned",
        summary.attempted, summary.delivered, summary.rescheduled, summary.abandoned
    );
    Ok(())
}
