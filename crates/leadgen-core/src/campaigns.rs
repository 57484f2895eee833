//! Campaigns and their per-platform scraping configuration.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, Platform};

string_enum! {
    pub enum CampaignStatus {
        Draft => "draft",
        Active => "active",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
    }
}

string_enum! {
    pub enum Frequency {
        Once => "once",
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
    }
}

impl Frequency {
    /// When the next scheduled run is due after a run finishing at `ran_at`.
    ///
    /// `Once` campaigns are never rescheduled.
    #[must_use]
    pub fn next_run_after(self, ran_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Frequency::Once => None,
            Frequency::Daily => Some(ran_at + Duration::days(1)),
            Frequency::Weekly => Some(ran_at + Duration::weeks(1)),
            Frequency::Monthly => ran_at.checked_add_months(Months::new(1)),
        }
    }
}

/// Who the campaign is looking for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCriteria {
    #[serde(default)]
    pub job_titles: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub company_sizes: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub platforms: Vec<Platform>,
    pub keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub target: TargetCriteria,
    pub frequency: Frequency,
    pub status: CampaignStatus,
    pub total_leads_found: i64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Checks the invariants a campaign must satisfy before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoPlatforms`] if `platforms` is empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.platforms.is_empty() {
            return Err(CoreError::NoPlatforms);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Platform configuration
// ---------------------------------------------------------------------------

const DEFAULT_REDDIT_MAX_RESULTS: usize = 10;
const DEFAULT_WEBSITE_MAX_PAGES: usize = 10;
const DEFAULT_WEBSITE_CRAWL_DEPTH: u32 = 2;
const DEFAULT_LINKEDIN_MAX_RESULTS: usize = 25;

/// Communities searched when a quick scrape includes Reddit.
pub const QUICK_SCRAPE_SUBREDDITS: &[&str] = &["entrepreneur", "startups", "smallbusiness"];
const QUICK_SCRAPE_MAX_RESULTS: usize = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedditConfig {
    pub subreddits: Vec<String>,
    /// Extra search terms appended to the campaign keywords.
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebsiteConfig {
    pub website_urls: Vec<String>,
    #[serde(default)]
    pub crawl_depth: Option<u32>,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub include_paths: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_paths: Option<Vec<String>>,
}

impl WebsiteConfig {
    #[must_use]
    pub fn crawl_depth(&self) -> u32 {
        self.crawl_depth.unwrap_or(DEFAULT_WEBSITE_CRAWL_DEPTH)
    }

    /// Include globs, falling back to the people/contact page defaults.
    #[must_use]
    pub fn include_paths(&self) -> Vec<String> {
        self.include_paths.clone().unwrap_or_else(|| {
            ["**/team*", "**/about*", "**/contact*", "**/people*"]
                .map(String::from)
                .to_vec()
        })
    }

    #[must_use]
    pub fn exclude_paths(&self) -> Vec<String> {
        self.exclude_paths.clone().unwrap_or_else(|| {
            ["**/blog*", "**/news*", "**/career*"]
                .map(String::from)
                .to_vec()
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkedInConfig {
    #[serde(default)]
    pub company_urls: Vec<String>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub target_titles: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Per-platform settings, one variant per platform with a strict schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformConfig {
    Reddit(RedditConfig),
    Website(WebsiteConfig),
    LinkedIn(LinkedInConfig),
}

/// A site to crawl, with the crawl bounds from its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteTarget {
    pub url: String,
    pub crawl_depth: u32,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

/// One unit of adapter work derived from a platform configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeTarget {
    Subreddit(String),
    Website(WebsiteTarget),
    LinkedInCompany(String),
    LinkedInSearch(String),
}

impl ScrapeTarget {
    /// Human-readable identifier for logs and error messages.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            ScrapeTarget::Subreddit(name) => format!("r/{name}"),
            ScrapeTarget::Website(site) => site.url.clone(),
            ScrapeTarget::LinkedInCompany(url) => url.clone(),
            ScrapeTarget::LinkedInSearch(keyword) => format!("search:{keyword}"),
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        match self {
            ScrapeTarget::Subreddit(_) => Platform::Reddit,
            ScrapeTarget::Website(_) => Platform::Website,
            ScrapeTarget::LinkedInCompany(_) | ScrapeTarget::LinkedInSearch(_) => {
                Platform::LinkedIn
            }
        }
    }
}

impl PlatformConfig {
    /// Default settings for a one-off search of `search_term` on `platform`.
    ///
    /// Website scrapes have no default sites and crawl `website_urls`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPlatformConfig`] for a website scrape
    /// without URLs.
    pub fn quick_scrape(
        platform: Platform,
        search_term: &str,
        website_urls: &[String],
    ) -> Result<Self, CoreError> {
        let config = match platform {
            Platform::Reddit => PlatformConfig::Reddit(RedditConfig {
                subreddits: QUICK_SCRAPE_SUBREDDITS
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                search_terms: vec![],
                max_results: Some(QUICK_SCRAPE_MAX_RESULTS),
            }),
            Platform::LinkedIn => PlatformConfig::LinkedIn(LinkedInConfig {
                search_keywords: vec![search_term.to_string()],
                max_results: Some(QUICK_SCRAPE_MAX_RESULTS),
                ..LinkedInConfig::default()
            }),
            Platform::Website => PlatformConfig::Website(WebsiteConfig {
                website_urls: website_urls.to_vec(),
                max_pages: Some(QUICK_SCRAPE_MAX_RESULTS),
                ..WebsiteConfig::default()
            }),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses the stored JSON blob for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPlatformConfig`] when the blob does not
    /// match the platform's schema (unknown fields are rejected).
    pub fn from_json(platform: Platform, value: serde_json::Value) -> Result<Self, CoreError> {
        let invalid = |e: serde_json::Error| CoreError::InvalidPlatformConfig {
            platform,
            reason: e.to_string(),
        };
        let config = match platform {
            Platform::Reddit => PlatformConfig::Reddit(serde_json::from_value(value).map_err(invalid)?),
            Platform::Website => {
                PlatformConfig::Website(serde_json::from_value(value).map_err(invalid)?)
            }
            Platform::LinkedIn => {
                PlatformConfig::LinkedIn(serde_json::from_value(value).map_err(invalid)?)
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Serializes the variant body back into the stored JSON shape.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            PlatformConfig::Reddit(c) => serde_json::to_value(c),
            PlatformConfig::Website(c) => serde_json::to_value(c),
            PlatformConfig::LinkedIn(c) => serde_json::to_value(c),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        match self {
            PlatformConfig::Reddit(_) => Platform::Reddit,
            PlatformConfig::Website(_) => Platform::Website,
            PlatformConfig::LinkedIn(_) => Platform::LinkedIn,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        let empty = match self {
            PlatformConfig::Reddit(c) => c.subreddits.iter().all(|s| s.trim().is_empty()),
            PlatformConfig::Website(c) => c.website_urls.iter().all(|u| u.trim().is_empty()),
            PlatformConfig::LinkedIn(c) => c.company_urls.is_empty() && c.search_keywords.is_empty(),
        };
        if empty {
            return Err(CoreError::InvalidPlatformConfig {
                platform: self.platform(),
                reason: "no targets configured".to_string(),
            });
        }
        Ok(())
    }

    /// Targets in configuration order. Blank entries are skipped.
    #[must_use]
    pub fn targets(&self) -> Vec<ScrapeTarget> {
        let non_blank = |s: &String| {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        };
        match self {
            PlatformConfig::Reddit(c) => c
                .subreddits
                .iter()
                .filter_map(non_blank)
                .map(|name| ScrapeTarget::Subreddit(name.trim_start_matches("r/").to_string()))
                .collect(),
            PlatformConfig::Website(c) => c
                .website_urls
                .iter()
                .filter_map(non_blank)
                .map(|url| {
                    ScrapeTarget::Website(WebsiteTarget {
                        url,
                        crawl_depth: c.crawl_depth(),
                        include_paths: c.include_paths(),
                        exclude_paths: c.exclude_paths(),
                    })
                })
                .collect(),
            PlatformConfig::LinkedIn(c) => c
                .company_urls
                .iter()
                .filter_map(non_blank)
                .map(ScrapeTarget::LinkedInCompany)
                .chain(
                    c.search_keywords
                        .iter()
                        .filter_map(non_blank)
                        .map(ScrapeTarget::LinkedInSearch),
                )
                .collect(),
        }
    }

    /// Result cap handed to the adapter for every target.
    #[must_use]
    pub fn limit(&self) -> usize {
        match self {
            PlatformConfig::Reddit(c) => c.max_results.unwrap_or(DEFAULT_REDDIT_MAX_RESULTS),
            PlatformConfig::Website(c) => c.max_pages.unwrap_or(DEFAULT_WEBSITE_MAX_PAGES),
            PlatformConfig::LinkedIn(c) => c.max_results.unwrap_or(DEFAULT_LINKEDIN_MAX_RESULTS),
        }
    }

    /// Search keywords for this platform: the campaign keywords followed by
    /// any platform-specific extras, de-duplicated case-insensitively.
    #[must_use]
    pub fn keywords(&self, campaign_keywords: &[String]) -> Vec<String> {
        let extras: &[String] = match self {
            PlatformConfig::Reddit(c) => &c.search_terms,
            PlatformConfig::Website(_) | PlatformConfig::LinkedIn(_) => &[],
        };
        let mut seen = std::collections::HashSet::new();
        campaign_keywords
            .iter()
            .chain(extras)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
            .collect()
    }
}

/// A stored configuration row.
#[derive(Debug, Clone)]
pub struct PlatformConfiguration {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub config: PlatformConfig,
    pub is_active: bool,
}

impl PlatformConfiguration {
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.config.platform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn quick_scrape_defaults_search_for_the_term() {
        let reddit = PlatformConfig::quick_scrape(Platform::Reddit, "need a CRM", &[]).unwrap();
        assert_eq!(reddit.targets().len(), QUICK_SCRAPE_SUBREDDITS.len());
        assert_eq!(reddit.limit(), 25);

        let linkedin = PlatformConfig::quick_scrape(Platform::LinkedIn, "need a CRM", &[]).unwrap();
        assert_eq!(
            linkedin.targets(),
            vec![ScrapeTarget::LinkedInSearch("need a CRM".into())]
        );

        let err = PlatformConfig::quick_scrape(Platform::Website, "need a CRM", &[]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidPlatformConfig {
                platform: Platform::Website,
                ..
            }
        ));
        let sites = vec!["https://acme.com".to_string()];
        assert!(PlatformConfig::quick_scrape(Platform::Website, "crm", &sites).is_ok());
    }

    #[test]
    fn reddit_config_parses_and_yields_subreddit_targets() {
        let config = PlatformConfig::from_json(
            Platform::Reddit,
            json!({"subreddits": ["saas", "r/startups", " "], "max_results": 4}),
        )
        .unwrap();
        assert_eq!(
            config.targets(),
            vec![
                ScrapeTarget::Subreddit("saas".into()),
                ScrapeTarget::Subreddit("startups".into())
            ]
        );
        assert_eq!(config.limit(), 4);
    }

    #[test]
    fn config_rejects_fields_from_another_platform() {
        let err = PlatformConfig::from_json(
            Platform::Reddit,
            json!({"subreddits": ["saas"], "website_urls": ["https://a.com"]}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidPlatformConfig {
                platform: Platform::Reddit,
                ..
            }
        ));
    }

    #[test]
    fn config_without_targets_is_rejected() {
        let err = PlatformConfig::from_json(Platform::LinkedIn, json!({})).unwrap_err();
        assert!(err.to_string().contains("no targets"));
    }

    #[test]
    fn linkedin_targets_list_companies_before_searches() {
        let config = PlatformConfig::from_json(
            Platform::LinkedIn,
            json!({
                "company_urls": ["https://linkedin.com/company/acme"],
                "search_keywords": ["vp sales"]
            }),
        )
        .unwrap();
        let targets = config.targets();
        assert_eq!(targets.len(), 2);
        assert!(matches!(targets[0], ScrapeTarget::LinkedInCompany(_)));
        assert_eq!(targets[1].identifier(), "search:vp sales");
    }

    #[test]
    fn website_config_defaults_to_contact_page_globs() {
        let config = WebsiteConfig {
            website_urls: vec!["https://acme.com".into()],
            ..WebsiteConfig::default()
        };
        assert!(config.include_paths().contains(&"**/contact*".to_string()));
        assert!(config.exclude_paths().contains(&"**/blog*".to_string()));
        assert_eq!(config.crawl_depth(), 2);
    }

    #[test]
    fn website_targets_carry_crawl_bounds() {
        let config = PlatformConfig::from_json(
            Platform::Website,
            json!({"website_urls": ["https://acme.com"], "crawl_depth": 1, "exclude_paths": []}),
        )
        .unwrap();
        let targets = config.targets();
        let [ScrapeTarget::Website(site)] = targets.as_slice() else {
            panic!("expected one website target, got {targets:?}");
        };
        assert_eq!(site.url, "https://acme.com");
        assert_eq!(site.crawl_depth, 1);
        assert!(site.exclude_paths.is_empty());
        assert_eq!(site.include_paths.len(), 4);
    }

    #[test]
    fn reddit_keywords_merge_search_terms_without_duplicates() {
        let config = PlatformConfig::Reddit(RedditConfig {
            subreddits: vec!["saas".into()],
            search_terms: vec!["CRM".into(), "need a crm".into()],
            max_results: None,
        });
        let keywords = config.keywords(&["need a CRM".into()]);
        assert_eq!(keywords, vec!["need a CRM".to_string(), "CRM".to_string()]);
    }

    #[test]
    fn config_round_trips_through_stored_json() {
        let stored = json!({"website_urls": ["https://acme.com"], "max_pages": 3});
        let config = PlatformConfig::from_json(Platform::Website, stored).unwrap();
        let again = PlatformConfig::from_json(Platform::Website, config.to_json()).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn frequency_schedules_next_run() {
        let ran_at = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(Frequency::Once.next_run_after(ran_at), None);
        assert_eq!(
            Frequency::Daily.next_run_after(ran_at),
            Some(Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            Frequency::Monthly.next_run_after(ran_at),
            Some(Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn campaign_without_platforms_fails_validation() {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            name: "Empty".into(),
            description: None,
            platforms: vec![],
            keywords: vec![],
            negative_keywords: vec![],
            target: TargetCriteria::default(),
            frequency: Frequency::Once,
            status: CampaignStatus::Draft,
            total_leads_found: 0,
            last_run_at: None,
            next_run_at: None,
            created_at: Utc::now(),
        };
        assert!(matches!(campaign.validate(), Err(CoreError::NoPlatforms)));
    }
}
