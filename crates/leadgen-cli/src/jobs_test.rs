use super::*;
use async_trait::async_trait;
use leadgen_core::{
    Campaign, CampaignStatus, Frequency, JobStatus, PlatformConfig, RedditConfig, ScrapeTarget,
    TargetCriteria, WebsiteConfig,
};
use leadgen_pipeline::{JobStore, MemoryStore};
use leadgen_scraper::{FetchOutcome, ScraperError, SourceAdapter};

struct IdleAdapter(Platform);

#[async_trait]
impl SourceAdapter for IdleAdapter {
    fn platform(&self) -> Platform {
        self.0
    }

    async fn fetch(
        &self,
        _target: &ScrapeTarget,
        _keywords: &[String],
        _limit: usize,
    ) -> Result<FetchOutcome, ScraperError> {
        Ok(FetchOutcome {
            pages_scraped: 1,
            ..FetchOutcome::default()
        })
    }
}

async fn seeded_campaign(store: &MemoryStore, frequency: Frequency) -> Campaign {
    let campaign = Campaign {
        id: Uuid::new_v4(),
        user_id: "u1".into(),
        name: "CLI".into(),
        description: None,
        platforms: vec![Platform::Reddit, Platform::Website],
        keywords: vec!["crm".into()],
        negative_keywords: vec![],
        target: TargetCriteria::default(),
        frequency,
        status: CampaignStatus::Active,
        total_leads_found: 0,
        last_run_at: None,
        next_run_at: None,
        created_at: Utc::now(),
    };
    let reddit = PlatformConfig::Reddit(RedditConfig {
        subreddits: vec!["r/smallbusiness".into(), "startups".into()],
        search_terms: vec!["need a CRM".into(), "CRM".into()],
        max_results: None,
    });
    let website = PlatformConfig::Website(WebsiteConfig {
        website_urls: vec!["https://acme.com".into()],
        ..WebsiteConfig::default()
    });
    store
        .create_campaign(&campaign, &[reddit, website])
        .await
        .unwrap()
}

#[tokio::test]
async fn plan_lists_targets_of_selected_platforms() {
    let store = MemoryStore::new();
    let campaign = seeded_campaign(&store, Frequency::Daily).await;

    let lines = plan_lines(&store, campaign.id, &[Platform::Reddit])
        .await
        .unwrap();
    assert_eq!(
        lines,
        vec![
            "reddit r/smallbusiness (limit 10, keywords [crm, need a CRM])".to_string(),
            "reddit r/startups (limit 10, keywords [crm, need a CRM])".to_string(),
        ]
    );

    let all = plan_lines(&store, campaign.id, &[]).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[2].starts_with("website https://acme.com"));

    assert!(plan_lines(&store, Uuid::new_v4(), &[]).await.is_err());
}

#[tokio::test]
async fn due_campaigns_are_run_to_completion() {
    let store = Arc::new(MemoryStore::new());
    let campaign = seeded_campaign(&store, Frequency::Daily).await;
    let shared: Arc<dyn Store> = store.clone();
    let runner = JobRunner::new(shared)
        .with_adapter(Arc::new(IdleAdapter(Platform::Reddit)))
        .with_adapter(Arc::new(IdleAdapter(Platform::Website)));

    run_due(&runner).await.unwrap();

    let jobs = store.list_jobs(campaign.id, 10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].job_type, JobType::Scheduled);
    assert_eq!(jobs[0].stats.pages_scraped, 3);

    let campaign = store.get_campaign(campaign.id).await.unwrap();
    assert!(campaign.next_run_at.is_some());

    // Nothing is due until the next run time.
    run_due(&runner).await.unwrap();
    assert_eq!(store.list_jobs(campaign.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn run_campaign_rejects_unknown_campaign() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let runner = JobRunner::new(store);
    let err = run_campaign(&runner, Uuid::new_v4(), JobType::Manual, &[])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}
