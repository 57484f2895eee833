//! Scrape job commands.
//!
//! Jobs run in the foreground so the command exits once the job is terminal.
//! A failed job on one campaign is logged and does not stop `campaign due`.

use std::sync::Arc;

use chrono::Utc;
use leadgen_core::{AppConfig, JobType, Platform};
use leadgen_pipeline::{CampaignStore, JobOutcome, JobRunner, PipelineError, Store, StoreError};
use uuid::Uuid;

/// Builds a runner with the Firecrawl-backed adapters.
///
/// # Errors
///
/// Returns an error if `FIRECRAWL_API_KEY` is not set or the HTTP client
/// cannot be built.
pub(crate) fn runner(store: Arc<dyn Store>, config: &AppConfig) -> anyhow::Result<JobRunner> {
    let runner = JobRunner::from_app_config(store, config)?;
    if !runner.has_adapters() {
        anyhow::bail!("FIRECRAWL_API_KEY is required to run scrape jobs");
    }
    Ok(runner)
}

/// Lists the targets a run would scrape, one line per target.
pub(crate) async fn plan_lines(
    store: &dyn Store,
    campaign_id: Uuid,
    platforms: &[Platform],
) -> anyhow::Result<Vec<String>> {
    let campaign = match store.get_campaign(campaign_id).await {
        Ok(campaign) => campaign,
        Err(StoreError::NotFound) => anyhow::bail!("campaign {campaign_id} not found"),
        Err(e) => return Err(e.into()),
    };
    let configs = store.platform_configs(campaign_id).await?;

    let mut lines = Vec::new();
    for config in configs
        .iter()
        .filter(|c| platforms.is_empty() || platforms.contains(&c.platform()))
    {
        let keywords = config.config.keywords(&campaign.keywords);
        for target in config.config.targets() {
            lines.push(format!(
                "{} {} (limit {}, keywords [{}])",
                config.platform(),
                target.identifier(),
                config.config.limit(),
                keywords.join(", ")
            ));
        }
    }
    Ok(lines)
}

pub(crate) async fn print_plan(
    store: &dyn Store,
    campaign_id: Uuid,
    platforms: &[Platform],
) -> anyhow::Result<()> {
    let lines = plan_lines(store, campaign_id, platforms).await?;
    println!("dry-run: would scrape {} targets", lines.len());
    for line in lines {
        println!("  {line}");
    }
    Ok(())
}

fn report(job_id: Uuid, outcome: JobOutcome) {
    let stats = outcome.stats();
    let verb = match outcome {
        JobOutcome::Completed(_) => "completed",
        JobOutcome::Cancelled(_) => "cancelled",
    };
    println!(
        "job {job_id} {verb}: {} leads, {} pages, {} errors",
        stats.leads_found, stats.pages_scraped, stats.errors
    );
}

/// Triggers a job for `campaign_id` and runs it to a terminal state.
///
/// # Errors
///
/// Returns an error if the job cannot be created or the run fails.
pub(crate) async fn run_campaign(
    runner: &JobRunner,
    campaign_id: Uuid,
    job_type: JobType,
    platforms: &[Platform],
) -> anyhow::Result<()> {
    let job = runner.trigger(campaign_id, job_type, platforms).await?;
    let outcome = runner.run(job.id).await?;
    report(job.id, outcome);
    Ok(())
}

/// Runs every due recurring campaign, one job at a time.
///
/// # Errors
///
/// Returns an error if the due campaigns cannot be loaded, or if every
/// triggered job failed.
pub(crate) async fn run_due(runner: &JobRunner) -> anyhow::Result<()> {
    let jobs = runner.trigger_due(Utc::now()).await?;
    if jobs.is_empty() {
        println!("no campaigns due");
        return Ok(());
    }

    let total = jobs.len();
    let mut failed = 0_usize;
    for job in jobs {
        match runner.run(job.id).await {
            Ok(outcome) => report(job.id, outcome),
            Err(e) => {
                failed += 1;
                log_failure(job.id, &e);
            }
        }
    }

    if failed == total {
        anyhow::bail!("all {failed} due jobs failed");
    }
    Ok(())
}

fn log_failure(job_id: Uuid, error: &PipelineError) {
    tracing::error!(job_id = %job_id, error = %error, "job failed");
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;
