//! Bulk insertion of leads scraped outside a job run.

use chrono::{DateTime, Utc};
use leadgen_core::{CandidateLead, JobStats, JobStatus, Platform};
use serde::Deserialize;
use uuid::Uuid;

use crate::score::{LeadScorer, SourceSignals};
use crate::store::Store;
use crate::{persist_candidates, Deduplicator, PersistSummary, PipelineError, StoreError};

/// One lead as submitted by a caller. Unset scores are computed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeadInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_handle: Option<String>,
    pub reddit_username: Option<String>,
    pub source_url: Option<String>,
    pub source_content: Option<String>,
    pub scraped_data: Option<serde_json::Value>,
    pub lead_score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BulkInsert {
    pub campaign_id: Uuid,
    pub job_id: Option<Uuid>,
    pub platform: Platform,
    pub leads: Vec<LeadInput>,
}

impl LeadInput {
    fn into_candidate(self, campaign_id: Uuid, job_id: Option<Uuid>, platform: Platform) -> CandidateLead {
        let mut lead = CandidateLead::new(campaign_id, job_id, platform);
        match (self.full_name, self.first_name, self.last_name) {
            (Some(full), first, last) => {
                lead.set_name(&full);
                if first.is_some() {
                    lead.first_name = first;
                }
                if last.is_some() {
                    lead.last_name = last;
                }
            }
            (None, first, last) => {
                let joined = [first.as_deref(), last.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                lead.set_name(&joined);
                lead.first_name = first;
                lead.last_name = last;
            }
        }
        lead.email = self.email;
        lead.phone = self.phone;
        lead.title = self.title;
        lead.company = self.company;
        lead.company_size = self.company_size;
        lead.industry = self.industry;
        lead.location = self.location;
        lead.website = self.website;
        lead.linkedin_url = self.linkedin_url;
        lead.twitter_handle = self.twitter_handle;
        lead.reddit_username = self.reddit_username;
        lead.source_url = self.source_url;
        lead.source_content = self.source_content;
        lead.scraped_data = self.scraped_data.unwrap_or(serde_json::Value::Null);
        lead
    }
}

/// Scores, deduplicates and stores a batch of externally scraped leads.
///
/// Leads without a score go through `scorer`. Deduplication is seeded with
/// the campaign's stored keys. A `job_id` must name a running job of the
/// campaign; its counters are advanced by the unique leads stored.
///
/// # Errors
///
/// [`PipelineError::InvalidLead`] for a score outside `[0, 1]` (nothing is
/// written), [`PipelineError::CampaignNotFound`],
/// [`PipelineError::PlatformNotInCampaign`], [`PipelineError::JobNotFound`],
/// [`PipelineError::JobNotInCampaign`], [`PipelineError::JobNotRunning`]
/// (nothing is written), or a store failure.
pub async fn insert_bulk(
    store: &dyn Store,
    scorer: &dyn LeadScorer,
    request: BulkInsert,
    now: DateTime<Utc>,
) -> Result<PersistSummary, PipelineError> {
    if let Some((index, score)) = request
        .leads
        .iter()
        .enumerate()
        .find_map(|(i, l)| l.lead_score.filter(|s| !(0.0..=1.0).contains(s)).map(|s| (i, s)))
    {
        return Err(PipelineError::InvalidLead {
            index,
            reason: format!("lead_score {score} is outside [0, 1]"),
        });
    }

    let campaign = match store.get_campaign(request.campaign_id).await {
        Ok(campaign) => campaign,
        Err(StoreError::NotFound) => {
            return Err(PipelineError::CampaignNotFound(request.campaign_id))
        }
        Err(e) => return Err(e.into()),
    };
    if !campaign.platforms.contains(&request.platform) {
        return Err(PipelineError::PlatformNotInCampaign {
            campaign_id: campaign.id,
            platform: request.platform,
        });
    }
    let job = match request.job_id {
        Some(job_id) => match store.get_job(job_id).await {
            Ok(job) if job.campaign_id != campaign.id => {
                return Err(PipelineError::JobNotInCampaign {
                    job_id,
                    campaign_id: campaign.id,
                })
            }
            Ok(job) if job.status != JobStatus::Running => {
                return Err(PipelineError::JobNotRunning {
                    job_id,
                    status: job.status,
                })
            }
            Ok(job) => Some(job),
            Err(StoreError::NotFound) => return Err(PipelineError::JobNotFound(job_id)),
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let BulkInsert {
        job_id,
        platform,
        leads,
        ..
    } = request;
    let candidates: Vec<CandidateLead> = leads
        .into_iter()
        .map(|input| {
            let score = input.lead_score;
            let mut lead = input.into_candidate(campaign.id, job_id, platform);
            lead.lead_score = score.unwrap_or_else(|| scorer.score(&lead, &SourceSignals::default()));
            lead
        })
        .collect();

    let mut dedup = Deduplicator::seeded(store.canonical_keys(campaign.id).await?);
    let mut summary = PersistSummary::default();
    let persisted =
        persist_candidates(store, &mut dedup, candidates, now, &mut summary).await;

    if let Some(job) = job {
        let delta = JobStats {
            leads_found: summary.unique,
            ..JobStats::default()
        };
        match store.add_job_stats(job.id, delta).await {
            // The job ended after the status check; its counters are final.
            Ok(_) | Err(StoreError::InvalidJobTransition { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    persisted?;

    tracing::info!(
        campaign_id = %campaign.id,
        %platform,
        inserted = summary.inserted,
        unique = summary.unique,
        "bulk leads stored"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::RuleScorer;
    use crate::store::{CampaignStore, JobStore, LeadStore};
    use crate::MemoryStore;
    use leadgen_core::{
        Campaign, CampaignStatus, Frequency, JobType, LeadFilter, PlatformConfig, TargetCriteria,
        WebsiteConfig,
    };

    async fn seeded_store() -> (MemoryStore, Campaign) {
        let store = MemoryStore::new();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            name: "Bulk".into(),
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
        store.create_campaign(&campaign, &[config]).await.unwrap();
        (store, campaign)
    }

    fn input(email: &str, score: Option<f64>) -> LeadInput {
        LeadInput {
            full_name: Some("Jane Doe".into()),
            email: Some(email.into()),
            lead_score: score,
            ..LeadInput::default()
        }
    }

    fn request(campaign_id: Uuid, leads: Vec<LeadInput>) -> BulkInsert {
        BulkInsert {
            campaign_id,
            job_id: None,
            platform: Platform::Website,
            leads,
        }
    }

    #[tokio::test]
    async fn unscored_leads_are_scored_and_deduplicated() {
        let (store, campaign) = seeded_store().await;
        let summary = insert_bulk(
            &store,
            &RuleScorer,
            request(
                campaign.id,
                vec![input("jane@acme.com", None), input("JANE@acme.com", Some(0.9))],
            ),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.unique, 1);

        let (leads, _) = store
            .query_leads(&LeadFilter {
                campaign_id: Some(campaign.id),
                limit: 10,
                ..LeadFilter::default()
            })
            .await
            .unwrap();
        let canonical = leads.iter().find(|l| !l.candidate.is_duplicate).unwrap();
        // website base 0.4 + email 0.3
        assert!((canonical.candidate.lead_score - 0.7).abs() < 1e-9);
        assert_eq!(canonical.candidate.first_name.as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn out_of_range_score_writes_nothing() {
        let (store, campaign) = seeded_store().await;
        let err = insert_bulk(
            &store,
            &RuleScorer,
            request(campaign.id, vec![input("a@acme.com", None), input("b@acme.com", Some(1.5))]),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLead { index: 1, .. }));
        assert!(store.canonical_keys(campaign.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn running_job_counts_bulk_leads() {
        let (store, campaign) = seeded_store().await;
        let job = store
            .create_job(campaign.id, JobType::Manual, &[Platform::Website])
            .await
            .unwrap();
        store.start_job(job.id).await.unwrap();

        let mut req = request(campaign.id, vec![input("a@acme.com", None)]);
        req.job_id = Some(job.id);
        insert_bulk(&store, &RuleScorer, req, Utc::now()).await.unwrap();

        assert_eq!(store.get_job(job.id).await.unwrap().stats.leads_found, 1);
    }

    #[tokio::test]
    async fn finished_or_pending_job_is_rejected_before_writing() {
        let (store, campaign) = seeded_store().await;
        let pending = store
            .create_job(campaign.id, JobType::Manual, &[Platform::Website])
            .await
            .unwrap();
        let finished = store
            .create_job(campaign.id, JobType::Manual, &[Platform::Website])
            .await
            .unwrap();
        store.start_job(finished.id).await.unwrap();
        store
            .complete_job(finished.id, JobStats::default())
            .await
            .unwrap();

        let cases = [
            (pending.id, JobStatus::Pending),
            (finished.id, JobStatus::Completed),
        ];
        for (job_id, status) in cases {
            let mut req = request(campaign.id, vec![input("a@acme.com", None)]);
            req.job_id = Some(job_id);
            let err = insert_bulk(&store, &RuleScorer, req, Utc::now())
                .await
                .unwrap_err();
            assert!(
                matches!(err, PipelineError::JobNotRunning { status: s, .. } if s == status),
                "{err}"
            );
        }

        assert!(store.canonical_keys(campaign.id).await.unwrap().is_empty());
        assert_eq!(store.get_job(finished.id).await.unwrap().stats.leads_found, 0);
    }

    #[tokio::test]
    async fn platform_outside_campaign_is_rejected() {
        let (store, campaign) = seeded_store().await;
        let mut req = request(campaign.id, vec![input("a@acme.com", None)]);
        req.platform = Platform::Reddit;
        let err = insert_bulk(&store, &RuleScorer, req, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PlatformNotInCampaign { .. }));
    }
}
