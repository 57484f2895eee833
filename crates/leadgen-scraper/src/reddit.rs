//! Subreddit search followed by per-post scrapes.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use leadgen_core::{Platform, ScrapeTarget};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::adapter::{unsupported, FetchOutcome, SourceAdapter};
use crate::error::ScraperError;
use crate::firecrawl::FirecrawlClient;
use crate::types::{RedditPost, ScrapedPage, SourceRecord};

/// Posts scraped per subreddit, regardless of the configured limit.
pub const MAX_POSTS_PER_SUBREDDIT: usize = 5;

const DEFAULT_SEARCH_TERMS: &str = "looking for OR need OR recommend OR advice OR help";

/// Characters `encodeURIComponent` leaves alone.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static POST_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://www\.reddit\.com/r/\w+/comments/\w+/[^\s)\]]+").expect("valid regex")
});
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+?)\s*$").expect("valid regex"));
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bu/([A-Za-z0-9_-]{3,20})").expect("valid regex"));
static UPVOTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*)\s+(?:upvotes?|points?)\b").expect("valid regex")
});
static COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,]*)\s+comments?\b").expect("valid regex"));

pub struct RedditAdapter {
    client: Arc<FirecrawlClient>,
}

impl RedditAdapter {
    #[must_use]
    pub fn new(client: Arc<FirecrawlClient>) -> Self {
        Self { client }
    }
}

/// Subreddit search URL for `keywords`, newest first.
#[must_use]
pub fn search_url(subreddit: &str, keywords: &[String], limit: usize) -> String {
    let terms = if keywords.is_empty() {
        DEFAULT_SEARCH_TERMS.to_string()
    } else {
        keywords.join(" OR ")
    };
    format!(
        "https://www.reddit.com/r/{subreddit}/search/?q={}&restrict_sr=1&sort=new&limit={limit}",
        utf8_percent_encode(&terms, QUERY)
    )
}

/// Unique post URLs in the order they appear.
#[must_use]
pub fn post_urls(markdown: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    POST_URL_RE
        .find_iter(markdown)
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn parse_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|c| c[1].replace(',', "").parse().ok())
}

/// Builds a post record from its scraped page.
#[must_use]
pub fn parse_post(subreddit: &str, page: &ScrapedPage) -> RedditPost {
    let markdown = &page.markdown;
    let title = HEADING_RE
        .captures(markdown)
        .map(|c| c[1].to_string())
        .or_else(|| page.metadata.title.clone())
        .unwrap_or_default();
    RedditPost {
        url: page.resolved_url().to_string(),
        subreddit: subreddit.to_string(),
        title,
        author: AUTHOR_RE.captures(markdown).map(|c| c[1].to_string()),
        content: markdown.clone(),
        upvotes: parse_count(&UPVOTES_RE, markdown),
        comments_count: parse_count(&COMMENTS_RE, markdown),
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn fetch(
        &self,
        target: &ScrapeTarget,
        keywords: &[String],
        limit: usize,
    ) -> Result<FetchOutcome, ScraperError> {
        let ScrapeTarget::Subreddit(subreddit) = target else {
            return Err(unsupported("reddit", target));
        };

        let listing = self
            .client
            .scrape(&search_url(subreddit, keywords, limit))
            .await?;
        let mut outcome = FetchOutcome {
            pages_scraped: 1,
            ..FetchOutcome::default()
        };

        let urls = post_urls(&listing.markdown);
        tracing::debug!(subreddit, found = urls.len(), "subreddit search scraped");

        for url in urls.into_iter().take(limit.min(MAX_POSTS_PER_SUBREDDIT)) {
            match self.client.scrape(&url).await {
                Ok(page) => {
                    outcome.pages_scraped += 1;
                    let mut post = parse_post(subreddit, &page);
                    if post.url.is_empty() {
                        post.url = url;
                    }
                    outcome.records.push(SourceRecord::RedditPost(post));
                }
                Err(e) => {
                    tracing::warn!(subreddit, url, error = %e, "reddit post scrape failed, skipping");
                    outcome.failures += 1;
                }
            }
        }

        Ok(outcome)
    }
}
