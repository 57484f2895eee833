//! HTTP client for a Firecrawl-compatible scraping API.
//!
//! Three capabilities are used: single-page scrape to markdown, structured
//! extraction against a JSON schema, and asynchronous crawl with polling.
//! Every outbound request, including retries and crawl status polls, first
//! takes a token from the shared [`RateLimiter`].

use std::sync::Arc;
use std::time::Duration;

use leadgen_core::AppConfig;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{preview, ScraperError};
use crate::rate_limit::RateLimiter;
use crate::retry::retry_with_backoff;
use crate::types::{PageMetadata, ScrapedPage};

const DEFAULT_CRAWL_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_CRAWL_MAX_POLLS: u32 = 90;

/// Maximum number of crawl result pages followed through `next` links.
const MAX_CRAWL_RESULT_PAGES: usize = 50;

/// Construction parameters for [`FirecrawlClient`].
#[derive(Clone)]
pub struct FirecrawlConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub crawl_poll_interval: Duration,
    pub crawl_max_polls: u32,
}

impl std::fmt::Debug for FirecrawlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirecrawlConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("crawl_poll_interval", &self.crawl_poll_interval)
            .field("crawl_max_polls", &self.crawl_max_polls)
            .finish()
    }
}

impl FirecrawlConfig {
    /// Builds the client config from application config.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::MissingApiKey`] if `FIRECRAWL_API_KEY` is unset.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let api_key = config
            .firecrawl_api_key
            .clone()
            .ok_or(ScraperError::MissingApiKey)?;
        Ok(Self {
            base_url: config.firecrawl_base_url.clone(),
            api_key,
            timeout_secs: config.scraper_request_timeout_secs,
            max_retries: config.scraper_max_retries,
            backoff_base_ms: config.scraper_retry_backoff_base_secs.saturating_mul(1000),
            crawl_poll_interval: DEFAULT_CRAWL_POLL_INTERVAL,
            crawl_max_polls: DEFAULT_CRAWL_MAX_POLLS,
        })
    }
}

/// Options for a site crawl.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOptions {
    pub limit: usize,
    pub max_depth: u32,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScrapeResponse<T> {
    success: bool,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarkdownData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: PageMetadata,
}

#[derive(Debug, Deserialize)]
struct ExtractData<T> {
    extract: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CrawlStarted {
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrawlStatus {
    status: String,
    #[serde(default)]
    data: Vec<MarkdownData>,
    #[serde(default)]
    next: Option<String>,
}

impl From<MarkdownData> for ScrapedPage {
    fn from(data: MarkdownData) -> Self {
        let url = data
            .metadata
            .url
            .clone()
            .or_else(|| data.metadata.source_url.clone())
            .unwrap_or_default();
        ScrapedPage {
            url,
            markdown: data.markdown.unwrap_or_default(),
            metadata: data.metadata,
        }
    }
}

/// Firecrawl API client.
pub struct FirecrawlClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff_base_ms: u64,
    crawl_poll_interval: Duration,
    crawl_max_polls: u32,
    limiter: Arc<RateLimiter>,
}

impl FirecrawlClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: FirecrawlConfig, limiter: Arc<RateLimiter>) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("leadgen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
            crawl_poll_interval: config.crawl_poll_interval,
            crawl_max_polls: config.crawl_max_polls,
            limiter,
        })
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Scrapes one page to markdown.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Upstream`] when the API reports
    /// `success: false`, or any transport/status error after retries.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage, ScraperError> {
        let body = serde_json::json!({
            "url": url,
            "formats": ["markdown"],
            "onlyMainContent": true,
        });
        let response: ScrapeResponse<MarkdownData> = self
            .send_json(|| self.post("/v1/scrape").json(&body), &format!("scrape of {url}"))
            .await?;
        let data = Self::unwrap_success(url, response)?;
        let mut page = ScrapedPage::from(data);
        if page.url.is_empty() {
            page.url = url.to_string();
        }
        Ok(page)
    }

    /// Runs prompt-driven structured extraction on one page.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Upstream`] when the API reports failure or
    /// returns no extraction, [`ScraperError::Deserialize`] when the
    /// extraction does not match `T`.
    pub async fn extract<T: DeserializeOwned>(
        &self,
        url: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<T, ScraperError> {
        let body = serde_json::json!({
            "url": url,
            "formats": ["extract"],
            "extract": { "prompt": prompt, "schema": schema },
        });
        let response: ScrapeResponse<ExtractData<serde_json::Value>> = self
            .send_json(|| self.post("/v1/scrape").json(&body), &format!("extract of {url}"))
            .await?;
        let extracted = Self::unwrap_success(url, response)?
            .extract
            .ok_or_else(|| ScraperError::Upstream {
                url: url.to_string(),
                message: "response contained no extraction".to_string(),
            })?;
        serde_json::from_value(extracted).map_err(|source| ScraperError::Deserialize {
            context: format!("extraction from {url}"),
            source,
        })
    }

    /// Crawls a site and waits for the crawl to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::CrawlFailed`] if the crawl ends in a
    /// non-completed state and [`ScraperError::CrawlTimeout`] if it is still
    /// running after the configured number of polls. Result pages are
    /// followed until `options.limit` pages are held; more than
    /// [`MAX_CRAWL_RESULT_PAGES`] `next` links is a
    /// [`ScraperError::PaginationLimit`].
    pub async fn crawl(
        &self,
        url: &str,
        options: &CrawlOptions,
    ) -> Result<Vec<ScrapedPage>, ScraperError> {
        let body = serde_json::json!({
            "url": url,
            "limit": options.limit,
            "maxDepth": options.max_depth,
            "includePaths": options.include_paths,
            "excludePaths": options.exclude_paths,
            "scrapeOptions": { "formats": ["markdown"], "onlyMainContent": true },
        });
        let started: CrawlStarted = self
            .send_json(|| self.post("/v1/crawl").json(&body), &format!("crawl of {url}"))
            .await?;
        let crawl_id = match (started.success, started.id) {
            (true, Some(id)) => id,
            (_, _) => {
                return Err(ScraperError::Upstream {
                    url: url.to_string(),
                    message: started
                        .error
                        .unwrap_or_else(|| "crawl was not started".to_string()),
                })
            }
        };
        tracing::debug!(crawl_id, url, "crawl started");

        let status_url = format!("{}/v1/crawl/{crawl_id}", self.base_url);
        for poll in 1..=self.crawl_max_polls {
            let status: CrawlStatus = self
                .send_json(|| self.get(&status_url), &format!("crawl {crawl_id} status"))
                .await?;
            match status.status.as_str() {
                "completed" => {
                    let mut pages: Vec<ScrapedPage> =
                        status.data.into_iter().map(ScrapedPage::from).collect();
                    let mut next = status.next;
                    let mut followed = 0usize;
                    while let Some(next_url) = next {
                        if pages.len() >= options.limit {
                            break;
                        }
                        followed += 1;
                        if followed > MAX_CRAWL_RESULT_PAGES {
                            return Err(ScraperError::PaginationLimit {
                                crawl_id,
                                max_pages: MAX_CRAWL_RESULT_PAGES,
                            });
                        }
                        let more: CrawlStatus = self
                            .send_json(|| self.get(&next_url), &format!("crawl {crawl_id} page"))
                            .await?;
                        pages.extend(more.data.into_iter().map(ScrapedPage::from));
                        next = more.next;
                    }
                    tracing::debug!(crawl_id, pages = pages.len(), polls = poll, "crawl completed");
                    return Ok(pages);
                }
                "failed" | "cancelled" => {
                    return Err(ScraperError::CrawlFailed {
                        crawl_id,
                        status: status.status,
                    });
                }
                _ => tokio::time::sleep(self.crawl_poll_interval).await,
            }
        }

        Err(ScraperError::CrawlTimeout {
            crawl_id,
            polls: self.crawl_max_polls,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.api_key)
    }

    fn unwrap_success<T>(url: &str, response: ScrapeResponse<T>) -> Result<T, ScraperError> {
        match response {
            ScrapeResponse {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            ScrapeResponse { error, .. } => Err(ScraperError::Upstream {
                url: url.to_string(),
                message: error.unwrap_or_else(|| "no data returned".to_string()),
            }),
        }
    }

    /// Sends a request built by `build`, with rate limiting and retries, and
    /// decodes a JSON body.
    async fn send_json<T, B>(&self, build: B, context: &str) -> Result<T, ScraperError>
    where
        T: DeserializeOwned,
        B: Fn() -> RequestBuilder,
    {
        let build = &build;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            self.limiter.wait_if_needed().await;
            let response = build().send().await?;
            let status = response.status();
            let url = response.url().to_string();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                let domain = response.url().host_str().unwrap_or_default().to_string();
                return Err(ScraperError::RateLimited {
                    domain,
                    retry_after_secs,
                });
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ScraperError::NotFound { url });
            }

            let body = response.text().await?;
            if !status.is_success() {
                return Err(ScraperError::UnexpectedStatus {
                    status: status.as_u16(),
                    url,
                    preview: preview(&body),
                });
            }

            serde_json::from_str::<T>(&body).map_err(|source| ScraperError::Deserialize {
                context: context.to_string(),
                source,
            })
        })
        .await
    }
}

#[cfg(test)]
#[path = "firecrawl_test.rs"]
mod tests;
