//! Campaign job lifecycle: trigger, run, complete or fail.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use leadgen_core::{
    AppConfig, Campaign, CandidateLead, Job, JobStats, JobType, Platform, PlatformConfig,
};
use leadgen_scraper::{
    FirecrawlClient, FirecrawlConfig, LinkedInAdapter, RateLimiter, RedditAdapter, ScraperError,
    SourceAdapter, WebsiteAdapter,
};
use uuid::Uuid;

use crate::extract::{extract_record, ExtractContext};
use crate::score::{LeadScorer, RuleScorer};
use crate::store::Store;
use crate::{persist_candidates, Deduplicator, PersistSummary, PipelineError, StoreError};

/// How a job run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(JobStats),
    /// The job was cancelled (or otherwise terminated) while running.
    /// Leads stored before that point are kept.
    Cancelled(JobStats),
}

impl JobOutcome {
    #[must_use]
    pub fn stats(&self) -> JobStats {
        match self {
            JobOutcome::Completed(stats) | JobOutcome::Cancelled(stats) => *stats,
        }
    }
}

enum Flow {
    Finished,
    Stopped,
}

/// Runs campaign jobs through the adapters and the
/// extract, score, dedupe and persist chain.
///
/// Platforms are processed in job order and targets in configuration order,
/// one at a time, so the first-seen lead of a dedupe key is deterministic.
pub struct JobRunner {
    store: Arc<dyn Store>,
    adapters: HashMap<Platform, Arc<dyn SourceAdapter>>,
    scorer: Arc<dyn LeadScorer>,
}

impl JobRunner {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            adapters: HashMap::new(),
            scorer: Arc::new(RuleScorer),
        }
    }

    /// A runner with the Firecrawl-backed adapters for every platform, all
    /// sharing one rate limiter.
    ///
    /// Without `FIRECRAWL_API_KEY` the runner has no adapters; see
    /// [`JobRunner::has_adapters`].
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn from_app_config(store: Arc<dyn Store>, config: &AppConfig) -> Result<Self, ScraperError> {
        let runner = Self::new(store);
        let firecrawl = match FirecrawlConfig::from_app_config(config) {
            Ok(firecrawl) => firecrawl,
            Err(ScraperError::MissingApiKey) => {
                tracing::warn!("FIRECRAWL_API_KEY not set; scrape jobs are disabled");
                return Ok(runner);
            }
            Err(e) => return Err(e),
        };
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max_tokens,
            Duration::from_millis(config.rate_limit_refill_ms),
        ));
        let client = Arc::new(FirecrawlClient::new(firecrawl, limiter)?);
        Ok(runner
            .with_adapter(Arc::new(RedditAdapter::new(Arc::clone(&client))))
            .with_adapter(Arc::new(WebsiteAdapter::new(Arc::clone(&client))))
            .with_adapter(Arc::new(LinkedInAdapter::new(client))))
    }

    /// Registers the adapter for its platform, replacing any previous one.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn LeadScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn has_adapters(&self) -> bool {
        !self.adapters.is_empty()
    }

    #[must_use]
    pub fn scorer(&self) -> &Arc<dyn LeadScorer> {
        &self.scorer
    }

    /// Creates a `pending` job for `campaign_id`.
    ///
    /// An empty `platforms` list means every platform of the campaign.
    /// Repeated platforms are collapsed, keeping the first position.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CampaignNotFound`] for an unknown campaign and
    /// [`PipelineError::PlatformNotInCampaign`] when a requested platform is
    /// not one of the campaign's platforms.
    pub async fn trigger(
        &self,
        campaign_id: Uuid,
        job_type: JobType,
        platforms: &[Platform],
    ) -> Result<Job, PipelineError> {
        let campaign = self.campaign(campaign_id).await?;
        let requested = if platforms.is_empty() {
            campaign.platforms.as_slice()
        } else {
            platforms
        };

        let mut selected: Vec<Platform> = Vec::with_capacity(requested.len());
        for &platform in requested {
            if !campaign.platforms.contains(&platform) {
                return Err(PipelineError::PlatformNotInCampaign {
                    campaign_id,
                    platform,
                });
            }
            if !selected.contains(&platform) {
                selected.push(platform);
            }
        }

        let job = self
            .store
            .create_job(campaign_id, job_type, &selected)
            .await?;
        tracing::info!(
            job_id = %job.id,
            campaign_id = %campaign_id,
            job_type = %job_type,
            platforms = ?selected,
            "job created"
        );
        Ok(job)
    }

    /// Triggers a `scheduled` job for every due recurring campaign.
    ///
    /// Each campaign's next run is moved one period past `now` before its
    /// job is created, so a job that fails (or a trigger that errors) waits
    /// for the next period instead of firing on every tick. A successful run
    /// reschedules again from its completion time.
    ///
    /// A campaign that cannot be triggered is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] if the due campaigns cannot be loaded.
    pub async fn trigger_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>, PipelineError> {
        let due = self.store.due_campaigns(now).await?;
        let mut jobs = Vec::with_capacity(due.len());
        for campaign in due {
            let next_run_at = campaign.frequency.next_run_after(now);
            if let Err(e) = self.store.set_next_run_at(campaign.id, next_run_at).await {
                tracing::error!(campaign_id = %campaign.id, error = %e, "failed to reschedule campaign");
                continue;
            }
            match self.trigger(campaign.id, JobType::Scheduled, &[]).await {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::error!(campaign_id = %campaign.id, error = %e, "failed to trigger scheduled job");
                }
            }
        }
        Ok(jobs)
    }

    /// Runs a `pending` job to a terminal state.
    ///
    /// Per-target adapter failures are counted in `errors` and the run goes
    /// on. A store failure ends the job as `failed`, keeping the stats
    /// gathered so far, and is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::JobNotFound`] for an unknown job, or
    /// [`PipelineError::Store`] when the job cannot be started or a store
    /// write fails mid-run.
    pub async fn run(&self, job_id: Uuid) -> Result<JobOutcome, PipelineError> {
        let job = match self.store.get_job(job_id).await {
            Ok(job) => job,
            Err(StoreError::NotFound) => return Err(PipelineError::JobNotFound(job_id)),
            Err(e) => return Err(e.into()),
        };
        if job.status.is_terminal() {
            tracing::info!(job_id = %job_id, status = %job.status, "job already finished; not running");
            return Ok(JobOutcome::Cancelled(job.stats));
        }
        let job = self.store.start_job(job_id).await?;
        tracing::info!(job_id = %job_id, campaign_id = %job.campaign_id, "job started");

        let mut stats = JobStats::default();
        let result = match self.execute(&job, &mut stats).await {
            Ok(Flow::Finished) => self.finish(&job, stats).await,
            Ok(Flow::Stopped) => Ok(JobOutcome::Cancelled(stats)),
            Err(e) => Err(e),
        };

        let err = match result {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };
        // A guard miss on add_job_stats/complete_job means someone else ended the job.
        if matches!(err, StoreError::InvalidJobTransition { .. }) && self.stopped(job_id).await? {
            tracing::info!(job_id = %job_id, "job was cancelled during the run");
            return Ok(JobOutcome::Cancelled(stats));
        }

        tracing::error!(job_id = %job_id, error = %err, "job failed");
        if let Err(mark_err) = self.store.fail_job(job_id, &err.to_string(), stats).await {
            tracing::error!(job_id = %job_id, error = %mark_err, "failed to mark job failed");
        }
        Err(err.into())
    }

    async fn campaign(&self, campaign_id: Uuid) -> Result<Campaign, PipelineError> {
        match self.store.get_campaign(campaign_id).await {
            Ok(campaign) => Ok(campaign),
            Err(StoreError::NotFound) => Err(PipelineError::CampaignNotFound(campaign_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn stopped(&self, job_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.store.job_status(job_id).await?.is_terminal())
    }

    async fn finish(&self, job: &Job, stats: JobStats) -> Result<JobOutcome, StoreError> {
        self.store.complete_job(job.id, stats).await?;
        self.store
            .record_campaign_run(job.campaign_id, stats.leads_found, Utc::now())
            .await?;
        tracing::info!(
            job_id = %job.id,
            leads_found = stats.leads_found,
            pages_scraped = stats.pages_scraped,
            errors = stats.errors,
            "job completed"
        );
        Ok(JobOutcome::Completed(stats))
    }

    async fn execute(&self, job: &Job, stats: &mut JobStats) -> Result<Flow, StoreError> {
        let campaign = self.store.get_campaign(job.campaign_id).await?;
        let configs = self.store.platform_configs(campaign.id).await?;
        let mut dedup = Deduplicator::seeded(self.store.canonical_keys(campaign.id).await?);

        for &platform in &job.platforms {
            let Some(configuration) = configs.iter().find(|c| c.platform() == platform) else {
                tracing::warn!(job_id = %job.id, %platform, "no platform configuration; skipping");
                continue;
            };
            let Some(adapter) = self.adapters.get(&platform) else {
                tracing::warn!(job_id = %job.id, %platform, "no adapter registered; skipping");
                continue;
            };

            let config = &configuration.config;
            let keywords = config.keywords(&campaign.keywords);
            let limit = config.limit();
            let target_titles: &[String] = match config {
                PlatformConfig::LinkedIn(c) => &c.target_titles,
                PlatformConfig::Reddit(_) | PlatformConfig::Website(_) => &[],
            };
            let ctx = ExtractContext {
                keywords: &keywords,
                negative_keywords: &campaign.negative_keywords,
                target_titles,
                ..ExtractContext::new(campaign.id, Some(job.id))
            };

            for target in config.targets() {
                if self.stopped(job.id).await? {
                    return Ok(Flow::Stopped);
                }

                let delta = match adapter.fetch(&target, &keywords, limit).await {
                    Ok(outcome) => {
                        let candidates = self.score_all(&outcome.records, &ctx);
                        if self.stopped(job.id).await? {
                            return Ok(Flow::Stopped);
                        }
                        let mut summary = PersistSummary::default();
                        let persisted = persist_candidates(
                            &*self.store,
                            &mut dedup,
                            candidates,
                            Utc::now(),
                            &mut summary,
                        )
                        .await;
                        if let Err(e) = persisted {
                            // Leads stored before the failure still count.
                            stats.merge(JobStats {
                                leads_found: summary.unique,
                                pages_scraped: count(outcome.pages_scraped),
                                errors: count(outcome.failures),
                            });
                            return Err(e);
                        }
                        tracing::info!(
                            job_id = %job.id,
                            %platform,
                            target = %target.identifier(),
                            records = outcome.records.len(),
                            leads = summary.unique,
                            duplicates = summary.inserted - summary.unique,
                            "target processed"
                        );
                        JobStats {
                            leads_found: summary.unique,
                            pages_scraped: count(outcome.pages_scraped),
                            errors: count(outcome.failures),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            job_id = %job.id,
                            %platform,
                            target = %target.identifier(),
                            error = %e,
                            "target failed; continuing"
                        );
                        JobStats {
                            errors: 1,
                            ..JobStats::default()
                        }
                    }
                };

                stats.merge(delta);
                self.store.add_job_stats(job.id, delta).await?;
            }
        }
        Ok(Flow::Finished)
    }

    fn score_all(
        &self,
        records: &[leadgen_scraper::SourceRecord],
        ctx: &ExtractContext<'_>,
    ) -> Vec<CandidateLead> {
        records
            .iter()
            .flat_map(|record| extract_record(record, ctx))
            .map(|extracted| {
                let mut lead = extracted.lead;
                lead.lead_score = self.scorer.score(&lead, &extracted.signals);
                lead
            })
            .collect()
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
