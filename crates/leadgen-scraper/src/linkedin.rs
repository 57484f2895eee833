//! LinkedIn company pages and people search via structured extraction.

use std::sync::Arc;

use async_trait::async_trait;
use leadgen_core::{Platform, ScrapeTarget};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapter::{unsupported, FetchOutcome, SourceAdapter};
use crate::error::ScraperError;
use crate::firecrawl::FirecrawlClient;
use crate::types::{CompanyInfo, Employee, LinkedInCompanyPage, LinkedInSearchPage, Profile, SourceRecord};

const COMPANY_PROMPT: &str = "Extract company information and key employees/executives. \
Focus on the company name, industry, size and description; recent company updates, news or \
announcements; key employees with their names, titles, departments, profile URLs and any \
visible contact information; and any mentioned growth, funding or expansion.";

const SEARCH_PROMPT: &str = "Extract LinkedIn profiles from search results. For each profile, \
extract the full name, current title and company, location, profile URL, and any visible \
contact information or about text.";

fn string_props(fields: &[&str]) -> Value {
    let props: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| ((*f).to_string(), json!({"type": "string"})))
        .collect();
    Value::Object(props)
}

/// Output schema for company page extraction.
#[must_use]
pub fn company_schema() -> Value {
    let mut company = string_props(&["name", "industry", "size", "description", "website"]);
    company["recent_updates"] = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "type": "object",
        "properties": {
            "company": {"type": "object", "properties": company},
            "employees": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": string_props(&["full_name", "title", "department", "profile_url", "about"])
                }
            }
        },
        "required": ["company", "employees"]
    })
}

/// Output schema for people search extraction.
#[must_use]
pub fn search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "profiles": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": string_props(&["full_name", "title", "company", "location", "profile_url", "about"])
                }
            }
        },
        "required": ["profiles"]
    })
}

#[must_use]
pub fn people_search_url(keyword: &str) -> String {
    format!(
        "https://www.linkedin.com/search/results/people/?keywords={}",
        utf8_percent_encode(keyword, NON_ALPHANUMERIC)
    )
}

#[derive(Debug, Deserialize)]
struct CompanyExtraction {
    #[serde(default)]
    company: CompanyInfo,
    #[serde(default)]
    employees: Vec<Employee>,
}

#[derive(Debug, Deserialize)]
struct SearchExtraction {
    #[serde(default)]
    profiles: Vec<Profile>,
}

pub struct LinkedInAdapter {
    client: Arc<FirecrawlClient>,
}

impl LinkedInAdapter {
    #[must_use]
    pub fn new(client: Arc<FirecrawlClient>) -> Self {
        Self { client }
    }

    async fn company(&self, url: &str, limit: usize) -> Result<SourceRecord, ScraperError> {
        let mut extraction: CompanyExtraction = self
            .client
            .extract(url, COMPANY_PROMPT, &company_schema())
            .await?;
        extraction.employees.truncate(limit);
        tracing::debug!(url, employees = extraction.employees.len(), "linkedin company extracted");
        Ok(SourceRecord::LinkedInCompany(LinkedInCompanyPage {
            source_url: url.to_string(),
            company: extraction.company,
            employees: extraction.employees,
        }))
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<SourceRecord, ScraperError> {
        let url = people_search_url(keyword);
        let mut extraction: SearchExtraction = self
            .client
            .extract(&url, SEARCH_PROMPT, &search_schema())
            .await?;
        extraction.profiles.truncate(limit);
        tracing::debug!(keyword, profiles = extraction.profiles.len(), "linkedin search extracted");
        Ok(SourceRecord::LinkedInSearch(LinkedInSearchPage {
            source_url: url,
            keyword: keyword.to_string(),
            profiles: extraction.profiles,
        }))
    }
}

#[async_trait]
impl SourceAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    async fn fetch(
        &self,
        target: &ScrapeTarget,
        _keywords: &[String],
        limit: usize,
    ) -> Result<FetchOutcome, ScraperError> {
        let record = match target {
            ScrapeTarget::LinkedInCompany(url) => self.company(url, limit).await?,
            ScrapeTarget::LinkedInSearch(keyword) => self.search(keyword, limit).await?,
            other => return Err(unsupported("linkedin", other)),
        };
        Ok(FetchOutcome {
            records: vec![record],
            pages_scraped: 1,
            failures: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_keyword() {
        assert_eq!(
            people_search_url("vp sales"),
            "https://www.linkedin.com/search/results/people/?keywords=vp%20sales"
        );
    }

    #[test]
    fn company_schema_declares_employee_fields() {
        let schema = company_schema();
        let employee = &schema["properties"]["employees"]["items"]["properties"];
        for field in ["full_name", "title", "department", "profile_url", "about"] {
            assert_eq!(employee[field]["type"], "string", "missing {field}");
        }
        assert_eq!(
            schema["properties"]["company"]["properties"]["recent_updates"]["type"],
            "array"
        );
    }

    #[test]
    fn partial_extraction_still_decodes() {
        let extraction: CompanyExtraction =
            serde_json::from_value(json!({"employees": [{"full_name": "Ana Ruiz"}]})).unwrap();
        assert_eq!(extraction.company, CompanyInfo::default());
        assert_eq!(extraction.employees[0].title, None);
    }
}
