//! Storage seams for the pipeline.
//!
//! Every pipeline operation reaches the database through these traits so the
//! same orchestration code runs against Postgres ([`PgStore`]) or the
//! in-process [`MemoryStore`] used by tests and dry runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadgen_core::{
    Campaign, CampaignStatus, CrawlerEventType, Job, JobStats, JobStatus, JobType, Lead,
    LeadAnalytics, LeadFilter, LeadUpdate, Platform, PlatformConfig, PlatformConfiguration,
    WebhookConfig, WebhookDelivery,
};
use uuid::Uuid;

use crate::StoreError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        configs: &[PlatformConfig],
    ) -> Result<Campaign, StoreError>;

    async fn get_campaign(&self, id: Uuid) -> Result<Campaign, StoreError>;

    async fn list_campaigns(
        &self,
        user_id: Option<&str>,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, StoreError>;

    async fn set_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<Campaign, StoreError>;

    /// Active configurations, in creation order.
    async fn platform_configs(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<PlatformConfiguration>, StoreError>;

    /// Adds `leads_found` to the campaign total and advances its schedule.
    async fn record_campaign_run(
        &self,
        id: Uuid,
        leads_found: i64,
        ran_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_next_run_at(
        &self,
        id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Active recurring campaigns that are due and have no job in flight.
    async fn due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError>;
}

/// Job persistence. Every status change is guarded on the current status and
/// fails with [`StoreError::InvalidJobTransition`] when the guard misses.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(
        &self,
        campaign_id: Uuid,
        job_type: JobType,
        platforms: &[Platform],
    ) -> Result<Job, StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError>;

    async fn list_jobs(&self, campaign_id: Uuid, limit: i64) -> Result<Vec<Job>, StoreError>;

    async fn start_job(&self, id: Uuid) -> Result<Job, StoreError>;

    async fn complete_job(&self, id: Uuid, stats: JobStats) -> Result<(), StoreError>;

    async fn fail_job(&self, id: Uuid, error: &str, stats: JobStats) -> Result<(), StoreError>;

    async fn cancel_job(&self, id: Uuid) -> Result<(), StoreError>;

    /// Adds `delta` to a running job's counters and returns the new totals.
    async fn add_job_stats(&self, id: Uuid, delta: JobStats) -> Result<JobStats, StoreError>;

    async fn job_status(&self, id: Uuid) -> Result<JobStatus, StoreError>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Stores `lead` and returns it as stored.
    ///
    /// A canonical lead whose dedupe key is already held by another
    /// canonical lead of the campaign (a concurrent writer got there first)
    /// is stored as that lead's duplicate instead.
    async fn insert_lead(&self, lead: &Lead) -> Result<Lead, StoreError>;

    async fn get_lead(&self, id: Uuid) -> Result<Lead, StoreError>;

    /// `(dedupe_key, lead_id)` for every canonical lead of the campaign,
    /// oldest first.
    async fn canonical_keys(&self, campaign_id: Uuid) -> Result<Vec<(String, Uuid)>, StoreError>;

    /// A page of matching leads, newest first, plus the total match count.
    async fn query_leads(&self, filter: &LeadFilter) -> Result<(Vec<Lead>, i64), StoreError>;

    async fn update_lead(&self, id: Uuid, update: &LeadUpdate) -> Result<Lead, StoreError>;

    /// Summary of the canonical leads across `user_id`'s campaigns; the
    /// daily series starts at `since`.
    async fn lead_analytics(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<LeadAnalytics, StoreError>;
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn create_webhook(&self, webhook: &WebhookConfig) -> Result<(), StoreError>;

    async fn get_webhook(&self, id: Uuid) -> Result<WebhookConfig, StoreError>;

    async fn list_webhooks(&self, user_id: &str) -> Result<Vec<WebhookConfig>, StoreError>;

    async fn active_webhooks(
        &self,
        user_id: &str,
        event: CrawlerEventType,
    ) -> Result<Vec<WebhookConfig>, StoreError>;

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError>;

    async fn update_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError>;

    /// Delivery attempts for one webhook, newest first.
    async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    async fn due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;
}

/// Everything the pipeline and API need from storage.
pub trait Store: CampaignStore + JobStore + LeadStore + WebhookStore {}

impl<T> Store for T where T: CampaignStore + JobStore + LeadStore + WebhookStore {}
