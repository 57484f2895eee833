//! Outbound scraping for the lead pipeline.
//!
//! A single [`FirecrawlClient`] talks to a Firecrawl-compatible API and gates
//! every request through a shared [`RateLimiter`]. The three
//! [`SourceAdapter`] implementations turn campaign targets into raw
//! [`SourceRecord`]s for the extractor.

pub mod adapter;
pub mod error;
pub mod firecrawl;
mod glob;
pub mod linkedin;
pub mod rate_limit;
pub mod reddit;
mod retry;
pub mod types;
pub mod website;

pub use adapter::{FetchOutcome, SourceAdapter};
pub use error::ScraperError;
pub use firecrawl::{CrawlOptions, FirecrawlClient, FirecrawlConfig};
pub use linkedin::LinkedInAdapter;
pub use rate_limit::RateLimiter;
pub use reddit::RedditAdapter;
pub use types::{
    CompanyInfo, Employee, LinkedInCompanyPage, LinkedInSearchPage, PageMetadata, Profile,
    RedditPost, ScrapedPage, SourceRecord,
};
pub use website::WebsiteAdapter;
