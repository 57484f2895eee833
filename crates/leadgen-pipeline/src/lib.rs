//! Lead extraction, scoring, deduplication and job orchestration.
//!
//! [`JobRunner`] drives a campaign job through the source adapters and the
//! extractor, scorer and deduplicator chain. [`WebhookIngestor`] is the
//! second entry point into the same chain, fed by signed crawler events.
//! Storage is reached only through the [`Store`] traits.

pub mod bulk;
pub mod dedupe;
pub mod error;
pub mod export;
pub mod extract;
pub mod orchestrator;
pub mod persist;
pub mod score;
pub mod store;
pub mod webhook;

pub use bulk::{insert_bulk, BulkInsert, LeadInput};
pub use dedupe::Deduplicator;
pub use error::{IngestError, PipelineError, StoreError};
pub use export::{campaign_leads, render_leads, ExportFormat, ExportRow};
pub use extract::{extract_page, extract_record, ExtractContext, Extracted};
pub use orchestrator::{JobOutcome, JobRunner};
pub use persist::{persist_candidates, PersistSummary};
pub use score::{LeadScorer, NeedsAnalysis, RuleScorer, SourceSignals, Urgency};
pub use store::{
    CampaignStore, JobStore, LeadStore, MemoryStore, PgStore, Store, WebhookStore,
};
pub use webhook::{
    sign_payload, verify_signature, CrawledPage, CrawlerEvent, IngestOutcome, RetrySummary,
    WebhookDispatcher, WebhookIngestor, MAX_DELIVERY_ATTEMPTS,
};
