use std::sync::Arc;

use chrono::Utc;
use leadgen_core::{CrawlerEventType, Job, JobStats, JobStatus, Platform};
use leadgen_scraper::{PageMetadata, ScrapedPage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::dispatch::WebhookDispatcher;
use super::signature::verify_signature;
use crate::extract::{extract_page, ExtractContext};
use crate::score::{LeadScorer, RuleScorer};
use crate::store::Store;
use crate::{persist_candidates, Deduplicator, IngestError, PersistSummary, StoreError};

/// One page pushed by the crawler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawledPage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: PageMetadata,
}

impl CrawledPage {
    fn into_scraped(self) -> ScrapedPage {
        ScrapedPage {
            url: self
                .url
                .or(self.source_url)
                .or_else(|| self.metadata.source_url.clone())
                .unwrap_or_default(),
            markdown: self.markdown.or(self.content).unwrap_or_default(),
            metadata: self.metadata,
        }
    }
}

/// An event from the external crawling service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerEvent {
    #[serde(rename = "type")]
    pub event_type: CrawlerEventType,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Vec<CrawledPage>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl CrawlerEvent {
    fn job_id(&self) -> Option<Uuid> {
        self.metadata
            .get("jobId")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    fn metadata_count(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }
}

/// What [`WebhookIngestor::ingest`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub job_id: Uuid,
    pub event_type: CrawlerEventType,
    /// Non-duplicate leads stored from a page event.
    pub leads_stored: i64,
    /// Whether the job row changed state or counters.
    pub job_updated: bool,
    /// Outbound deliveries recorded for the fan-out.
    pub deliveries: usize,
}

/// Entry point for signed crawler events.
pub struct WebhookIngestor {
    store: Arc<dyn Store>,
    secret: Option<String>,
    scorer: Arc<dyn LeadScorer>,
    dispatcher: WebhookDispatcher,
}

impl WebhookIngestor {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, secret: Option<String>, dispatcher: WebhookDispatcher) -> Self {
        Self {
            store,
            secret,
            scorer: Arc::new(RuleScorer),
            dispatcher,
        }
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn LeadScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Verifies, parses, and applies one crawler event, then fans it out to
    /// subscribed user webhooks.
    ///
    /// Nothing is parsed or written before the signature checks out. Events
    /// for a job that is already terminal do not change it. Fan-out failures
    /// are logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// Signature problems ([`IngestError::MissingSecret`],
    /// [`IngestError::InvalidSignature`]), an unparseable body
    /// ([`IngestError::Malformed`]), no `metadata.jobId`
    /// ([`IngestError::MissingJobId`]), an unknown job
    /// ([`IngestError::JobNotFound`]), or a store failure.
    pub async fn ingest(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        verify_signature(self.secret.as_deref(), signature, body)?;

        let raw: Value = serde_json::from_slice(body)?;
        let event: CrawlerEvent = serde_json::from_value(raw.clone())?;
        let job_id = event.job_id().ok_or(IngestError::MissingJobId)?;
        let job = match self.store.get_job(job_id).await {
            Ok(job) => job,
            Err(StoreError::NotFound) => return Err(IngestError::JobNotFound(job_id)),
            Err(e) => return Err(e.into()),
        };

        let event_type = event.event_type;
        let data = raw.get("data").cloned().unwrap_or(Value::Array(Vec::new()));
        let metadata = event.metadata.clone();
        let mut outcome = IngestOutcome {
            job_id,
            event_type,
            leads_stored: 0,
            job_updated: false,
            deliveries: 0,
        };

        if job.status.is_terminal() {
            tracing::info!(job_id = %job_id, status = %job.status, event = %event_type, "crawler event for finished job; leaving it unchanged");
        } else {
            match event_type {
                CrawlerEventType::Page => {
                    outcome.leads_stored = self.ingest_pages(&job, event.data).await?;
                    outcome.job_updated = true;
                }
                CrawlerEventType::Completed => {
                    self.complete(&job, &event).await?;
                    outcome.job_updated = true;
                }
                CrawlerEventType::Failed => {
                    let message = event.error.as_deref().unwrap_or("Crawl failed");
                    self.store.fail_job(job_id, message, job.stats).await?;
                    tracing::warn!(job_id = %job_id, error = message, "crawl failed");
                    outcome.job_updated = true;
                }
            }
        }

        let payload = json!({
            "job_id": job_id,
            "campaign_id": job.campaign_id,
            "event_type": event_type,
            "data": data,
            "metadata": metadata,
        });
        outcome.deliveries = self.fan_out(job.campaign_id, event_type, &payload).await;
        Ok(outcome)
    }

    async fn ensure_running(&self, job: &Job) -> Result<(), StoreError> {
        if job.status != JobStatus::Pending {
            return Ok(());
        }
        match self.store.start_job(job.id).await {
            Ok(_) => Ok(()),
            Err(e @ StoreError::InvalidJobTransition { .. }) => {
                // Another event for this job may have started it first.
                if self.store.job_status(job.id).await? == JobStatus::Running {
                    Ok(())
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn ingest_pages(&self, job: &Job, pages: Vec<CrawledPage>) -> Result<i64, StoreError> {
        self.ensure_running(job).await?;
        let campaign = self.store.get_campaign(job.campaign_id).await?;
        let ctx = ExtractContext {
            keywords: &campaign.keywords,
            negative_keywords: &campaign.negative_keywords,
            ..ExtractContext::new(campaign.id, Some(job.id))
        };

        let page_count = pages.len();
        let candidates: Vec<_> = pages
            .into_iter()
            .map(CrawledPage::into_scraped)
            .flat_map(|page| extract_page(&page, Platform::Website, &ctx))
            .map(|extracted| {
                let mut lead = extracted.lead;
                lead.lead_score = self.scorer.score(&lead, &extracted.signals);
                lead
            })
            .collect();

        let mut dedup = Deduplicator::seeded(self.store.canonical_keys(campaign.id).await?);
        let mut summary = PersistSummary::default();
        let persisted =
            persist_candidates(&*self.store, &mut dedup, candidates, Utc::now(), &mut summary)
                .await;
        // Leads stored before a failed insert are counted either way.
        self.store
            .add_job_stats(
                job.id,
                JobStats {
                    leads_found: summary.unique,
                    pages_scraped: i64::try_from(page_count).unwrap_or(i64::MAX),
                    errors: 0,
                },
            )
            .await?;
        persisted?;
        tracing::info!(job_id = %job.id, pages = page_count, leads = summary.unique, "crawler pages ingested");
        Ok(summary.unique)
    }

    async fn complete(&self, job: &Job, event: &CrawlerEvent) -> Result<(), StoreError> {
        self.ensure_running(job).await?;
        let mut stats = self.store.get_job(job.id).await?.stats;
        if let Some(total_pages) = event.metadata_count("totalPages") {
            stats.pages_scraped = stats.pages_scraped.max(total_pages);
        }
        self.store.complete_job(job.id, stats).await?;
        self.store
            .record_campaign_run(job.campaign_id, stats.leads_found, Utc::now())
            .await?;
        tracing::info!(job_id = %job.id, leads_found = stats.leads_found, pages_scraped = stats.pages_scraped, "crawl completed");
        Ok(())
    }

    async fn fan_out(&self, campaign_id: Uuid, event: CrawlerEventType, payload: &Value) -> usize {
        let user_id = match self.store.get_campaign(campaign_id).await {
            Ok(campaign) => campaign.user_id,
            Err(e) => {
                tracing::error!(campaign_id = %campaign_id, error = %e, "cannot resolve webhook owner");
                return 0;
            }
        };
        match self.dispatcher.dispatch(&user_id, event, payload).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(campaign_id = %campaign_id, error = %e, "webhook fan-out failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use leadgen_core::{
        Campaign, CampaignStatus, Frequency, JobType, PlatformConfig, TargetCriteria,
        WebsiteConfig,
    };

    use crate::store::{CampaignStore, JobStore};
    use crate::MemoryStore;

    async fn website_campaign(store: &MemoryStore) -> Campaign {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            name: "Crawl".into(),
            description: None,
            platforms: vec![Platform::Website],
            keywords: vec![],
            negative_keywords: vec![],
            target: TargetCriteria::default(),
            frequency: Frequency::Once,
            status: CampaignStatus::Active,
            total_leads_found: 0,
            last_run_at: None,
            next_run_at: None,
            created_at: Utc::now(),
        };
        let config = PlatformConfig::Website(WebsiteConfig {
            website_urls: vec!["https://acme.com".into()],
            ..WebsiteConfig::default()
        });
        store.create_campaign(&campaign, &[config]).await.unwrap()
    }

    fn ingestor(store: &Arc<MemoryStore>) -> WebhookIngestor {
        let shared: Arc<dyn Store> = store.clone();
        let dispatcher = WebhookDispatcher::new(Arc::clone(&shared), Duration::from_secs(1))
            .expect("client");
        WebhookIngestor::new(shared, Some("whsec_test".into()), dispatcher)
    }

    #[tokio::test]
    async fn pages_for_a_job_started_by_another_event_are_kept() {
        let store = Arc::new(MemoryStore::new());
        let campaign = website_campaign(&store).await;
        let seen_pending = store
            .create_job(campaign.id, JobType::Manual, &[Platform::Website])
            .await
            .unwrap();
        // A concurrent page event wins the pending -> running transition.
        store.start_job(seen_pending.id).await.unwrap();

        let page = CrawledPage {
            url: Some("https://acme.com/team".into()),
            markdown: Some("Talk to jane.doe@acme.com".into()),
            ..CrawledPage::default()
        };
        let stored = ingestor(&store)
            .ingest_pages(&seen_pending, vec![page])
            .await
            .unwrap();

        assert!(stored >= 1);
        let job = store.get_job(seen_pending.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.stats.leads_found, stored);
        assert_eq!(job.stats.pages_scraped, 1);
    }

    #[tokio::test]
    async fn pages_for_a_job_cancelled_meanwhile_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let campaign = website_campaign(&store).await;
        let seen_pending = store
            .create_job(campaign.id, JobType::Manual, &[Platform::Website])
            .await
            .unwrap();
        store.cancel_job(seen_pending.id).await.unwrap();

        let err = ingestor(&store)
            .ingest_pages(&seen_pending, vec![CrawledPage::default()])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidJobTransition { .. }));
    }
}
