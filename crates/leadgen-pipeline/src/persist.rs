use chrono::{DateTime, Utc};
use leadgen_core::{CandidateLead, Lead};

use crate::store::LeadStore;
use crate::{Deduplicator, StoreError};

/// Counts from one [`persist_candidates`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub inserted: i64,
    /// Inserted leads that are not duplicates.
    pub unique: i64,
}

/// Deduplicates `candidates` against `dedup` and stores every one of them.
///
/// Duplicates are stored too, flagged and pointing at their canonical lead.
/// Counts are added to `summary` as each insert succeeds, so after an error
/// it still covers the leads stored before it. A candidate the store turns
/// into a duplicate (its key was taken concurrently) counts as a duplicate.
///
/// # Errors
///
/// Returns the [`StoreError`] of the first failed insert.
pub async fn persist_candidates<S>(
    store: &S,
    dedup: &mut Deduplicator,
    candidates: Vec<CandidateLead>,
    now: DateTime<Utc>,
    summary: &mut PersistSummary,
) -> Result<(), StoreError>
where
    S: LeadStore + ?Sized,
{
    for candidate in dedup.dedupe(candidates) {
        let stored = store.insert_lead(&Lead::from_candidate(candidate, now)).await?;
        summary.inserted += 1;
        match (stored.candidate.duplicate_of, stored.dedupe_key) {
            (None, _) => summary.unique += 1,
            (Some(canonical), Some(key)) => dedup.redirect(key, canonical),
            (Some(_), None) => {}
        }
    }
    Ok(())
}
