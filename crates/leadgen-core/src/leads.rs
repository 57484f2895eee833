//! Lead records produced by the extraction chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, Platform};

string_enum! {
    pub enum LeadStatus {
        New => "new",
        Qualified => "qualified",
        Contacted => "contacted",
        Nurturing => "nurturing",
        Converted => "converted",
        Disqualified => "disqualified",
    }
}

impl LeadStatus {
    /// `qualified` or any later stage of the funnel.
    #[must_use]
    pub fn is_qualified(self) -> bool {
        matches!(
            self,
            LeadStatus::Qualified
                | LeadStatus::Contacted
                | LeadStatus::Nurturing
                | LeadStatus::Converted
        )
    }
}

string_enum! {
    pub enum EnrichmentStatus {
        Pending => "pending",
        Enriched => "enriched",
        Failed => "failed",
        NoData => "no_data",
    }
}

/// A lead as it leaves the extractor, before it is stored.
///
/// `id` is assigned up front so the deduplicator can point later candidates
/// at the canonical one before anything is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLead {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub job_id: Option<Uuid>,
    pub platform: Platform,
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
    pub scraped_data: serde_json::Value,
    pub lead_score: f64,
    pub is_duplicate: bool,
    pub duplicate_of: Option<Uuid>,
}

impl CandidateLead {
    /// An empty candidate for `platform`, with a fresh id.
    #[must_use]
    pub fn new(campaign_id: Uuid, job_id: Option<Uuid>, platform: Platform) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            job_id,
            platform,
            first_name: None,
            last_name: None,
            full_name: None,
            email: None,
            phone: None,
            title: None,
            company: None,
            company_size: None,
            industry: None,
            location: None,
            website: None,
            linkedin_url: None,
            twitter_handle: None,
            reddit_username: None,
            source_url: None,
            source_content: None,
            scraped_data: serde_json::Value::Null,
            lead_score: 0.0,
            is_duplicate: false,
            duplicate_of: None,
        }
    }

    /// Sets `full_name` and splits it into first name and the remainder.
    pub fn set_name(&mut self, full_name: &str) {
        let full_name = full_name.split_whitespace().collect::<Vec<_>>().join(" ");
        if full_name.is_empty() {
            return;
        }
        let mut parts = full_name.splitn(2, ' ');
        self.first_name = parts.next().map(str::to_string);
        self.last_name = parts.next().map(str::to_string);
        self.full_name = Some(full_name);
    }

    /// Key used to collapse candidates that describe the same entity.
    ///
    /// Strongest identifier first: LinkedIn profile, Reddit post, email,
    /// `name:{full_name}-{company}`, then the bare source URL.
    #[must_use]
    pub fn dedupe_key(&self) -> Option<String> {
        if let Some(url) = non_empty(self.linkedin_url.as_deref()) {
            return Some(format!("linkedin:{}", url.trim_end_matches('/')));
        }
        if self.platform == Platform::Reddit {
            if let Some(url) = non_empty(self.source_url.as_deref()) {
                return Some(format!("reddit:{}", reddit_post_id(url).unwrap_or(url)));
            }
        }
        if let Some(email) = non_empty(self.email.as_deref()) {
            return Some(format!("email:{}", email.to_lowercase()));
        }
        if let (Some(name), Some(company)) = (
            non_empty(self.full_name.as_deref()),
            non_empty(self.company.as_deref()),
        ) {
            return Some(format!("name:{name}-{company}"));
        }
        non_empty(self.source_url.as_deref()).map(|url| format!("url:{url}"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Post id from `https://www.reddit.com/r/{sub}/comments/{id}/...`.
fn reddit_post_id(url: &str) -> Option<&str> {
    let mut segments = url.split('/');
    segments.find(|s| *s == "comments")?;
    segments.next().filter(|id| !id.is_empty())
}

/// A stored lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    #[serde(flatten)]
    pub candidate: CandidateLead,
    pub status: LeadStatus,
    pub enrichment_status: EnrichmentStatus,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Wraps a scored candidate as a fresh `new`/`pending` lead.
    #[must_use]
    pub fn from_candidate(candidate: CandidateLead, now: DateTime<Utc>) -> Self {
        let dedupe_key = candidate.dedupe_key();
        Self {
            candidate,
            status: LeadStatus::New,
            enrichment_status: EnrichmentStatus::Pending,
            dedupe_key,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.candidate.id
    }
}

/// Filters for lead queries. `None` means "don't filter on this".
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub campaign_id: Option<Uuid>,
    pub platform: Option<Platform>,
    pub status: Option<LeadStatus>,
    pub enrichment_status: Option<EnrichmentStatus>,
    pub has_email: Option<bool>,
    pub has_phone: Option<bool>,
    pub min_score: Option<f64>,
    pub limit: i64,
    pub offset: i64,
}

impl LeadFilter {
    /// In-process equivalent of the SQL `WHERE` clause.
    #[must_use]
    pub fn matches(&self, lead: &Lead) -> bool {
        let c = &lead.candidate;
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        self.campaign_id.is_none_or(|id| c.campaign_id == id)
            && self.platform.is_none_or(|p| c.platform == p)
            && self.status.is_none_or(|s| lead.status == s)
            && self
                .enrichment_status
                .is_none_or(|s| lead.enrichment_status == s)
            && self.has_email.is_none_or(|want| present(&c.email) == want)
            && self.has_phone.is_none_or(|want| present(&c.phone) == want)
            && self.min_score.is_none_or(|min| c.lead_score >= min)
    }
}

/// Partial update for a stored lead.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::option_option)]
pub struct LeadUpdate {
    pub status: Option<LeadStatus>,
    pub enrichment_status: Option<EnrichmentStatus>,
    pub lead_score: Option<f64>,
    #[serde(default, with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub last_name: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub full_name: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub company: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub company_size: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub industry: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub website: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub linkedin_url: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub twitter_handle: Option<Option<String>>,
}

impl LeadUpdate {
    /// Nullable text columns paired with their new values, in column order.
    #[must_use]
    pub fn text_fields(&self) -> Vec<(&'static str, Option<&str>)> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("title", &self.title),
            ("company", &self.company),
            ("company_size", &self.company_size),
            ("industry", &self.industry),
            ("location", &self.location),
            ("website", &self.website),
            ("linkedin_url", &self.linkedin_url),
            ("twitter_handle", &self.twitter_handle),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_ref().map(|v| (column, v.as_deref())))
        .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.enrichment_status.is_none()
            && self.lead_score.is_none()
            && self.text_fields().is_empty()
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidValue`] for a score outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(score) = self.lead_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(CoreError::InvalidValue {
                    kind: "lead_score",
                    value: score.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Applies the update to an in-memory lead.
    pub fn apply(&self, lead: &mut Lead, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(status) = self.enrichment_status {
            lead.enrichment_status = status;
        }
        if let Some(score) = self.lead_score {
            lead.candidate.lead_score = score;
        }
        let c = &mut lead.candidate;
        for (column, value) in self.text_fields() {
            let slot = match column {
                "first_name" => &mut c.first_name,
                "last_name" => &mut c.last_name,
                "full_name" => &mut c.full_name,
                "email" => &mut c.email,
                "phone" => &mut c.phone,
                "title" => &mut c.title,
                "company" => &mut c.company,
                "company_size" => &mut c.company_size,
                "industry" => &mut c.industry,
                "location" => &mut c.location,
                "website" => &mut c.website,
                "linkedin_url" => &mut c.linkedin_url,
                _ => &mut c.twitter_handle,
            };
            *slot = value.map(str::to_string);
        }
        lead.updated_at = now;
    }
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    #[allow(clippy::option_option)]
    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
