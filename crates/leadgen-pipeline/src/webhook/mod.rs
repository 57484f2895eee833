//! Signed inbound crawler events and outbound user webhooks.

mod dispatch;
mod ingest;
mod signature;

pub use dispatch::{RetrySummary, WebhookDispatcher, MAX_DELIVERY_ATTEMPTS};
pub use ingest::{CrawledPage, CrawlerEvent, IngestOutcome, WebhookIngestor};
pub use signature::{sign_payload, verify_signature};
