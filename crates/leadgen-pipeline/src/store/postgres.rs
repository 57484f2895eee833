use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadgen_core::{
    Campaign, CampaignStatus, CrawlerEventType, Job, JobStats, JobStatus, JobType, Lead,
    LeadAnalytics, LeadFilter, LeadUpdate, Platform, PlatformConfig, PlatformConfiguration,
    WebhookConfig, WebhookDelivery,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CampaignStore, JobStore, LeadStore, WebhookStore};
use crate::StoreError;

/// [`Store`](super::Store) backed by the `leadgen_db` query functions.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CampaignStore for PgStore {
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        configs: &[PlatformConfig],
    ) -> Result<Campaign, StoreError> {
        Ok(leadgen_db::create_campaign(&self.pool, campaign, configs).await?)
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Campaign, StoreError> {
        Ok(leadgen_db::get_campaign(&self.pool, id).await?)
    }

    async fn list_campaigns(
        &self,
        user_id: Option<&str>,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, StoreError> {
        Ok(leadgen_db::list_campaigns(&self.pool, user_id, status, limit, offset).await?)
    }

    async fn set_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<Campaign, StoreError> {
        Ok(leadgen_db::set_campaign_status(&self.pool, id, status).await?)
    }

    async fn platform_configs(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<PlatformConfiguration>, StoreError> {
        Ok(leadgen_db::list_platform_configs(&self.pool, campaign_id).await?)
    }

    async fn record_campaign_run(
        &self,
        id: Uuid,
        leads_found: i64,
        ran_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Ok(leadgen_db::record_campaign_run(&self.pool, id, leads_found, ran_at).await?)
    }

    async fn set_next_run_at(
        &self,
        id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        Ok(leadgen_db::set_next_run_at(&self.pool, id, next_run_at).await?)
    }

    async fn due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        Ok(leadgen_db::due_campaigns(&self.pool, now).await?)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(
        &self,
        campaign_id: Uuid,
        job_type: JobType,
        platforms: &[Platform],
    ) -> Result<Job, StoreError> {
        Ok(leadgen_db::create_job(&self.pool, campaign_id, job_type, platforms).await?)
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        Ok(leadgen_db::get_job(&self.pool, id).await?)
    }

    async fn list_jobs(&self, campaign_id: Uuid, limit: i64) -> Result<Vec<Job>, StoreError> {
        Ok(leadgen_db::list_jobs(&self.pool, campaign_id, limit).await?)
    }

    async fn start_job(&self, id: Uuid) -> Result<Job, StoreError> {
        Ok(leadgen_db::start_job(&self.pool, id).await?)
    }

    async fn complete_job(&self, id: Uuid, stats: JobStats) -> Result<(), StoreError> {
        Ok(leadgen_db::complete_job(&self.pool, id, stats).await?)
    }

    async fn fail_job(&self, id: Uuid, error: &str, stats: JobStats) -> Result<(), StoreError> {
        Ok(leadgen_db::fail_job(&self.pool, id, error, stats).await?)
    }

    async fn cancel_job(&self, id: Uuid) -> Result<(), StoreError> {
        Ok(leadgen_db::cancel_job(&self.pool, id).await?)
    }

    async fn add_job_stats(&self, id: Uuid, delta: JobStats) -> Result<JobStats, StoreError> {
        Ok(leadgen_db::add_job_stats(&self.pool, id, delta).await?)
    }

    async fn job_status(&self, id: Uuid) -> Result<JobStatus, StoreError> {
        Ok(leadgen_db::job_status(&self.pool, id).await?)
    }
}

#[async_trait]
impl LeadStore for PgStore {
    async fn insert_lead(&self, lead: &Lead) -> Result<Lead, StoreError> {
        Ok(leadgen_db::insert_lead(&self.pool, lead).await?)
    }

    async fn get_lead(&self, id: Uuid) -> Result<Lead, StoreError> {
        Ok(leadgen_db::get_lead(&self.pool, id).await?)
    }

    async fn canonical_keys(&self, campaign_id: Uuid) -> Result<Vec<(String, Uuid)>, StoreError> {
        Ok(leadgen_db::canonical_keys(&self.pool, campaign_id).await?)
    }

    async fn query_leads(&self, filter: &LeadFilter) -> Result<(Vec<Lead>, i64), StoreError> {
        Ok(leadgen_db::query_leads(&self.pool, filter).await?)
    }

    async fn update_lead(&self, id: Uuid, update: &LeadUpdate) -> Result<Lead, StoreError> {
        Ok(leadgen_db::update_lead(&self.pool, id, update).await?)
    }

    async fn lead_analytics(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<LeadAnalytics, StoreError> {
        Ok(leadgen_db::lead_analytics(&self.pool, user_id, since).await?)
    }
}

#[async_trait]
impl WebhookStore for PgStore {
    async fn create_webhook(&self, webhook: &WebhookConfig) -> Result<(), StoreError> {
        Ok(leadgen_db::create_webhook(&self.pool, webhook).await?)
    }

    async fn get_webhook(&self, id: Uuid) -> Result<WebhookConfig, StoreError> {
        Ok(leadgen_db::get_webhook(&self.pool, id).await?)
    }

    async fn list_webhooks(&self, user_id: &str) -> Result<Vec<WebhookConfig>, StoreError> {
        Ok(leadgen_db::list_webhooks(&self.pool, user_id).await?)
    }

    async fn active_webhooks(
        &self,
        user_id: &str,
        event: CrawlerEventType,
    ) -> Result<Vec<WebhookConfig>, StoreError> {
        Ok(leadgen_db::list_active_webhooks(&self.pool, user_id, event).await?)
    }

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        Ok(leadgen_db::insert_delivery(&self.pool, delivery).await?)
    }

    async fn update_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        Ok(leadgen_db::update_delivery(&self.pool, delivery).await?)
    }

    async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        Ok(leadgen_db::list_deliveries(&self.pool, webhook_id, limit).await?)
    }

    async fn due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        Ok(leadgen_db::due_deliveries(&self.pool, now, limit).await?)
    }
}
