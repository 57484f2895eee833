//! Raw records returned by source adapters, before extraction.

use serde::{Deserialize, Serialize};

/// Page metadata as reported by the crawler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub og_site_name: Option<String>,
    #[serde(default, rename = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

/// One scraped or crawled page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub metadata: PageMetadata,
}

impl ScrapedPage {
    /// Canonical URL of the page: explicit url, then metadata.
    #[must_use]
    pub fn resolved_url(&self) -> &str {
        if !self.url.is_empty() {
            return &self.url;
        }
        self.metadata
            .url
            .as_deref()
            .or(self.metadata.source_url.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedditPost {
    pub url: String,
    pub subreddit: String,
    pub title: String,
    pub author: Option<String>,
    pub content: String,
    /// Only set when the page shows a count; never guessed.
    pub upvotes: Option<u32>,
    pub comments_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub recent_updates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub profile_url: Option<String>,
    pub about: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub profile_url: Option<String>,
    pub about: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInCompanyPage {
    pub source_url: String,
    pub company: CompanyInfo,
    pub employees: Vec<Employee>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInSearchPage {
    pub source_url: String,
    pub keyword: String,
    pub profiles: Vec<Profile>,
}

/// A raw record, one variant per kind of source content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRecord {
    RedditPost(RedditPost),
    WebPage(ScrapedPage),
    LinkedInCompany(LinkedInCompanyPage),
    LinkedInSearch(LinkedInSearchPage),
}
