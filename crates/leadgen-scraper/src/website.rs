//! Bounded site crawl for team, about and contact pages.

use std::sync::Arc;

use async_trait::async_trait;
use leadgen_core::{Platform, ScrapeTarget, WebsiteTarget};
use reqwest::Url;

use crate::adapter::{unsupported, FetchOutcome, SourceAdapter};
use crate::error::ScraperError;
use crate::firecrawl::{CrawlOptions, FirecrawlClient};
use crate::glob::PathGlobs;
use crate::types::{ScrapedPage, SourceRecord};

pub struct WebsiteAdapter {
    client: Arc<FirecrawlClient>,
}

impl WebsiteAdapter {
    #[must_use]
    pub fn new(client: Arc<FirecrawlClient>) -> Self {
        Self { client }
    }
}

fn url_path(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| u.path().to_string())
}

/// Applies the include/exclude globs to crawled pages. The crawl root is
/// always kept; other pages need to match an include glob (when any are set)
/// and no exclude glob.
pub(crate) fn filter_pages(
    site: &WebsiteTarget,
    pages: Vec<ScrapedPage>,
    limit: usize,
) -> Vec<ScrapedPage> {
    let include = PathGlobs::new(&site.include_paths);
    let exclude = PathGlobs::new(&site.exclude_paths);
    let root = site.url.trim_end_matches('/');

    pages
        .into_iter()
        .filter(|page| {
            let url = page.resolved_url();
            if url.trim_end_matches('/') == root {
                return true;
            }
            let Some(path) = url_path(url) else {
                return false;
            };
            if path.is_empty() || path == "/" {
                return true;
            }
            (include.is_empty() || include.matches(&path)) && !exclude.matches(&path)
        })
        .take(limit)
        .collect()
}

#[async_trait]
impl SourceAdapter for WebsiteAdapter {
    fn platform(&self) -> Platform {
        Platform::Website
    }

    async fn fetch(
        &self,
        target: &ScrapeTarget,
        _keywords: &[String],
        limit: usize,
    ) -> Result<FetchOutcome, ScraperError> {
        let ScrapeTarget::Website(site) = target else {
            return Err(unsupported("website", target));
        };

        let options = CrawlOptions {
            limit,
            max_depth: site.crawl_depth,
            include_paths: site.include_paths.clone(),
            exclude_paths: site.exclude_paths.clone(),
        };
        let pages = self.client.crawl(&site.url, &options).await?;
        let crawled = pages.len();
        let kept = filter_pages(site, pages, limit);
        tracing::debug!(url = %site.url, crawled, kept = kept.len(), "website crawled");

        Ok(FetchOutcome {
            records: kept.into_iter().map(SourceRecord::WebPage).collect(),
            pages_scraped: crawled,
            failures: 0,
        })
    }
}
