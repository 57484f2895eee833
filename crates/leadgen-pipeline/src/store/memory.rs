use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadgen_core::{
    Campaign, CampaignStatus, CrawlerEventType, Frequency, Job, JobStats, JobStatus, JobType,
    Lead, LeadAnalytics, LeadFilter, LeadUpdate, Platform, PlatformConfig, PlatformConfiguration,
    WebhookConfig, WebhookDelivery,
};
use leadgen_db::DbError;
use uuid::Uuid;

use super::{CampaignStore, JobStore, LeadStore, WebhookStore};
use crate::StoreError;

#[derive(Debug, Default)]
struct Tables {
    campaigns: HashMap<Uuid, Campaign>,
    configs: Vec<PlatformConfiguration>,
    jobs: HashMap<Uuid, Job>,
    leads: Vec<Lead>,
    webhooks: Vec<WebhookConfig>,
    deliveries: Vec<WebhookDelivery>,
    /// Lead inserts left before writes start failing; `None` is unlimited.
    lead_write_budget: Option<usize>,
}

/// In-process store with the same guard and ordering rules as Postgres.
///
/// Backs the test suites and `--dry-run` invocations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `insert_lead` fail as if the database were
    /// unreachable.
    pub fn set_lead_writes_failing(&self, failing: bool) {
        self.tables().lead_write_budget = failing.then_some(0);
    }

    /// Lets the next `n` lead inserts through, then fails the rest.
    pub fn fail_lead_writes_after(&self, n: usize) {
        self.tables().lead_write_budget = Some(n);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves a job to `next` if its current status is one of `from`.
    fn transition(
        &self,
        id: Uuid,
        from: &[JobStatus],
        expected_status: &'static str,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, StoreError> {
        let mut tables = self.tables();
        match tables.jobs.get_mut(&id) {
            Some(job) if from.contains(&job.status) => {
                apply(job);
                Ok(job.clone())
            }
            _ => Err(StoreError::InvalidJobTransition {
                id,
                expected_status,
            }),
        }
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        configs: &[PlatformConfig],
    ) -> Result<Campaign, StoreError> {
        let mut tables = self.tables();
        tables.campaigns.insert(campaign.id, campaign.clone());
        tables
            .configs
            .extend(configs.iter().map(|config| PlatformConfiguration {
                id: Uuid::new_v4(),
                campaign_id: campaign.id,
                config: config.clone(),
                is_active: true,
            }));
        Ok(campaign.clone())
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Campaign, StoreError> {
        self.tables()
            .campaigns
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_campaigns(
        &self,
        user_id: Option<&str>,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, StoreError> {
        let mut matching: Vec<Campaign> = self
            .tables()
            .campaigns
            .values()
            .filter(|c| user_id.is_none_or(|u| c.user_id == u))
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(page(matching, limit, offset))
    }

    async fn set_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<Campaign, StoreError> {
        let mut tables = self.tables();
        let campaign = tables.campaigns.get_mut(&id).ok_or(StoreError::NotFound)?;
        campaign.status = status;
        Ok(campaign.clone())
    }

    async fn platform_configs(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<PlatformConfiguration>, StoreError> {
        Ok(self
            .tables()
            .configs
            .iter()
            .filter(|c| c.campaign_id == campaign_id && c.is_active)
            .cloned()
            .collect())
    }

    async fn record_campaign_run(
        &self,
        id: Uuid,
        leads_found: i64,
        ran_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let campaign = tables.campaigns.get_mut(&id).ok_or(StoreError::NotFound)?;
        campaign.total_leads_found += leads_found;
        campaign.last_run_at = Some(ran_at);
        campaign.next_run_at = campaign.frequency.next_run_after(ran_at);
        if campaign.frequency == Frequency::Once {
            campaign.status = CampaignStatus::Completed;
        }
        Ok(())
    }

    async fn set_next_run_at(
        &self,
        id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let campaign = tables.campaigns.get_mut(&id).ok_or(StoreError::NotFound)?;
        campaign.next_run_at = next_run_at;
        Ok(())
    }

    async fn due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        let tables = self.tables();
        let busy = |campaign_id: Uuid| {
            tables.jobs.values().any(|j| {
                j.campaign_id == campaign_id
                    && matches!(j.status, JobStatus::Pending | JobStatus::Running)
            })
        };
        let mut due: Vec<Campaign> = tables
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Active && c.frequency != Frequency::Once)
            .filter(|c| c.next_run_at.is_none_or(|at| at <= now))
            .filter(|c| !busy(c.id))
            .cloned()
            .collect();
        // NULLS FIRST: None sorts before Some.
        due.sort_by(|a, b| (a.next_run_at, a.id).cmp(&(b.next_run_at, b.id)));
        Ok(due)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(
        &self,
        campaign_id: Uuid,
        job_type: JobType,
        platforms: &[Platform],
    ) -> Result<Job, StoreError> {
        let mut tables = self.tables();
        if !tables.campaigns.contains_key(&campaign_id) {
            return Err(StoreError::NotFound);
        }
        let job = Job {
            id: Uuid::new_v4(),
            campaign_id,
            job_type,
            status: JobStatus::Pending,
            platforms: platforms.to_vec(),
            started_at: None,
            completed_at: None,
            error_message: None,
            stats: JobStats::default(),
            created_at: Utc::now(),
        };
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        self.tables()
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_jobs(&self, campaign_id: Uuid, limit: i64) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .tables()
            .jobs
            .values()
            .filter(|j| j.campaign_id == campaign_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(page(jobs, limit, 0))
    }

    async fn start_job(&self, id: Uuid) -> Result<Job, StoreError> {
        self.transition(id, &[JobStatus::Pending], "pending", |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        })
    }

    async fn complete_job(&self, id: Uuid, stats: JobStats) -> Result<(), StoreError> {
        self.transition(id, &[JobStatus::Running], "running", |job| {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.stats = stats;
        })
        .map(drop)
    }

    async fn fail_job(&self, id: Uuid, error: &str, stats: JobStats) -> Result<(), StoreError> {
        self.transition(
            id,
            &[JobStatus::Pending, JobStatus::Running],
            "pending or running",
            |job| {
                job.status = JobStatus::Failed;
                job.completed_at = Some(Utc::now());
                job.error_message = Some(error.to_string());
                job.stats = stats;
            },
        )
        .map(drop)
    }

    async fn cancel_job(&self, id: Uuid) -> Result<(), StoreError> {
        self.transition(
            id,
            &[JobStatus::Pending, JobStatus::Running],
            "pending or running",
            |job| {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
            },
        )
        .map(drop)
    }

    async fn add_job_stats(&self, id: Uuid, delta: JobStats) -> Result<JobStats, StoreError> {
        self.transition(id, &[JobStatus::Running], "running", |job| {
            job.stats.merge(delta);
        })
        .map(|job| job.stats)
    }

    async fn job_status(&self, id: Uuid) -> Result<JobStatus, StoreError> {
        self.tables()
            .jobs
            .get(&id)
            .map(|j| j.status)
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn insert_lead(&self, lead: &Lead) -> Result<Lead, StoreError> {
        let mut tables = self.tables();
        if let Some(budget) = tables.lead_write_budget.as_mut() {
            if *budget == 0 {
                return Err(StoreError::Db(DbError::Sqlx(sqlx::Error::PoolTimedOut)));
            }
            *budget -= 1;
        }

        let mut stored = lead.clone();
        if !stored.candidate.is_duplicate {
            // Mirrors the unique canonical-key index.
            let holder = stored.dedupe_key.as_deref().and_then(|key| {
                tables
                    .leads
                    .iter()
                    .find(|l| {
                        l.candidate.campaign_id == stored.candidate.campaign_id
                            && !l.candidate.is_duplicate
                            && l.dedupe_key.as_deref() == Some(key)
                    })
                    .map(Lead::id)
            });
            if let Some(first) = holder {
                stored.candidate.is_duplicate = true;
                stored.candidate.duplicate_of = Some(first);
            }
        }
        tables.leads.push(stored.clone());
        Ok(stored)
    }

    async fn get_lead(&self, id: Uuid) -> Result<Lead, StoreError> {
        self.tables()
            .leads
            .iter()
            .find(|l| l.id() == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn canonical_keys(&self, campaign_id: Uuid) -> Result<Vec<(String, Uuid)>, StoreError> {
        let tables = self.tables();
        let mut canonical: Vec<&Lead> = tables
            .leads
            .iter()
            .filter(|l| l.candidate.campaign_id == campaign_id && !l.candidate.is_duplicate)
            .collect();
        canonical.sort_by_key(|l| (l.created_at, l.id()));
        Ok(canonical
            .into_iter()
            .filter_map(|l| l.dedupe_key.clone().map(|key| (key, l.id())))
            .collect())
    }

    async fn query_leads(&self, filter: &LeadFilter) -> Result<(Vec<Lead>, i64), StoreError> {
        let mut matching: Vec<Lead> = self
            .tables()
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id()).cmp(&(a.created_at, a.id())));
        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        Ok((page(matching, filter.limit, filter.offset), total))
    }

    async fn update_lead(&self, id: Uuid, update: &LeadUpdate) -> Result<Lead, StoreError> {
        let mut tables = self.tables();
        let lead = tables
            .leads
            .iter_mut()
            .find(|l| l.id() == id)
            .ok_or(StoreError::NotFound)?;
        update.apply(lead, Utc::now());
        Ok(lead.clone())
    }

    async fn lead_analytics(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<LeadAnalytics, StoreError> {
        let tables = self.tables();
        let owned = |campaign_id: Uuid| {
            tables
                .campaigns
                .get(&campaign_id)
                .is_some_and(|c| c.user_id == user_id)
        };
        Ok(LeadAnalytics::tally(
            tables.leads.iter().filter(|l| owned(l.candidate.campaign_id)),
            since,
        ))
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn create_webhook(&self, webhook: &WebhookConfig) -> Result<(), StoreError> {
        self.tables().webhooks.push(webhook.clone());
        Ok(())
    }

    async fn get_webhook(&self, id: Uuid) -> Result<WebhookConfig, StoreError> {
        self.tables()
            .webhooks
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_webhooks(&self, user_id: &str) -> Result<Vec<WebhookConfig>, StoreError> {
        Ok(self
            .tables()
            .webhooks
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn active_webhooks(
        &self,
        user_id: &str,
        event: CrawlerEventType,
    ) -> Result<Vec<WebhookConfig>, StoreError> {
        Ok(self
            .tables()
            .webhooks
            .iter()
            .filter(|w| w.user_id == user_id && w.subscribes_to(event))
            .cloned()
            .collect())
    }

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        self.tables().deliveries.push(delivery.clone());
        Ok(())
    }

    async fn update_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let stored = tables
            .deliveries
            .iter_mut()
            .find(|d| d.id == delivery.id)
            .ok_or(StoreError::NotFound)?;
        stored.response_status = delivery.response_status;
        stored.response_body.clone_from(&delivery.response_body);
        stored.attempts = delivery.attempts;
        stored.delivered_at = delivery.delivered_at;
        stored.next_retry_at = delivery.next_retry_at;
        Ok(())
    }

    async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut deliveries: Vec<WebhookDelivery> = self
            .tables()
            .deliveries
            .iter()
            .filter(|d| d.webhook_id == webhook_id)
            .cloned()
            .collect();
        deliveries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(page(deliveries, limit, 0))
    }

    async fn due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut due: Vec<WebhookDelivery> = self
            .tables()
            .deliveries
            .iter()
            .filter(|d| d.next_retry_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|d| (d.next_retry_at, d.id));
        Ok(page(due, limit, 0))
    }
}
