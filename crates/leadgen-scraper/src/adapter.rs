//! The uniform interface every source adapter implements.

use async_trait::async_trait;
use leadgen_core::{Platform, ScrapeTarget};

use crate::error::ScraperError;
use crate::types::SourceRecord;

/// What one target produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub records: Vec<SourceRecord>,
    /// Pages successfully fetched from the upstream API for this target.
    pub pages_scraped: usize,
    /// Sub-requests that failed and were skipped (e.g. a single Reddit post).
    pub failures: usize,
}

/// Turns one campaign target into raw records.
///
/// Implementations must not panic on upstream failures. An `Err` means the
/// whole target failed; the caller counts it and moves on to the next one.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch(
        &self,
        target: &ScrapeTarget,
        keywords: &[String],
        limit: usize,
    ) -> Result<FetchOutcome, ScraperError>;
}

pub(crate) fn unsupported(adapter: &'static str, target: &ScrapeTarget) -> ScraperError {
    ScraperError::UnsupportedTarget {
        adapter,
        target: target.identifier(),
    }
}
