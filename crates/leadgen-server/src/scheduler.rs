//! Background job scheduler.
//!
//! Registers the recurring campaign trigger and the outbound webhook retry
//! sweep. Both cron expressions can be overridden from the environment.

use std::sync::Arc;

use chrono::Utc;
use leadgen_pipeline::{JobRunner, WebhookDispatcher};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::spawn_job_run;

const DEFAULT_CAMPAIGN_CRON: &str = "0 * * * * *";
const DEFAULT_DELIVERY_RETRY_CRON: &str = "30 * * * * *";
const RETRY_BATCH: i64 = 100;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    runner: Arc<JobRunner>,
    dispatcher: WebhookDispatcher,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if runner.has_adapters() {
        register_campaign_job(&scheduler, runner).await?;
    } else {
        tracing::warn!("scheduler: scraping disabled; recurring campaigns will not run");
    }
    register_delivery_retry_job(&scheduler, dispatcher).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Triggers and runs a job for every due recurring campaign.
///
/// Runs every minute by default; override with `LEADGEN_CAMPAIGN_CRON`.
async fn register_campaign_job(
    scheduler: &JobScheduler,
    runner: Arc<JobRunner>,
) -> Result<(), JobSchedulerError> {
    let cron = std::env::var("LEADGEN_CAMPAIGN_CRON")
        .unwrap_or_else(|_| DEFAULT_CAMPAIGN_CRON.to_string());

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let runner = Arc::clone(&runner);

        Box::pin(async move {
            match runner.trigger_due(Utc::now()).await {
                Ok(jobs) if jobs.is_empty() => {}
                Ok(jobs) => {
                    tracing::info!(count = jobs.len(), "scheduler: starting due campaign jobs");
                    for job in jobs {
                        spawn_job_run(Arc::clone(&runner), job.id);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: failed to load due campaigns");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered campaign job");
    Ok(())
}

/// Re-sends failed webhook deliveries whose retry time has passed.
///
/// Override the schedule with `LEADGEN_DELIVERY_RETRY_CRON`.
async fn register_delivery_retry_job(
    scheduler: &JobScheduler,
    dispatcher: WebhookDispatcher,
) -> Result<(), JobSchedulerError> {
    let cron = std::env::var("LEADGEN_DELIVERY_RETRY_CRON")
        .unwrap_or_else(|_| DEFAULT_DELIVERY_RETRY_CRON.to_string());
    let dispatcher = Arc::new(dispatcher);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let dispatcher = Arc::clone(&dispatcher);

        Box::pin(async move {
            match dispatcher.retry_due_deliveries(Utc::now(), RETRY_BATCH).await {
                Ok(summary) if summary.attempted == 0 && summary.abandoned == 0 => {}
                Ok(summary) => tracing::info!(
                    attempted = summary.attempted,
                    delivered = summary.delivered,
                    abandoned = summary.abandoned,
                    "scheduler: webhook retries complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: webhook retry sweep failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered webhook retry job");
    Ok(())
}
