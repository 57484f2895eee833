use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}: {preview}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        preview: String,
    },

    #[error("scrape of {url} reported failure: {message}")]
    Upstream { url: String, message: String },

    #[error("crawl {crawl_id} ended with status {status}")]
    CrawlFailed { crawl_id: String, status: String },

    #[error("crawl {crawl_id} did not finish after {polls} status checks")]
    CrawlTimeout { crawl_id: String, polls: u32 },

    #[error("pagination limit reached for crawl {crawl_id}: exceeded {max_pages} result pages")]
    PaginationLimit { crawl_id: String, max_pages: usize },

    #[error("FIRECRAWL_API_KEY is not configured")]
    MissingApiKey,

    #[error("{adapter} adapter cannot handle target {target}")]
    UnsupportedTarget {
        adapter: &'static str,
        target: String,
    },
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
