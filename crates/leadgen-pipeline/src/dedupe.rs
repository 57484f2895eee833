//! Campaign-scoped, first-seen-wins deduplication.

use std::collections::HashMap;

use leadgen_core::CandidateLead;
use uuid::Uuid;

/// Tracks the canonical lead id for every dedupe key seen so far.
///
/// Candidates are processed in the order given; the first candidate with a
/// key becomes canonical and later ones are marked as its duplicates.
#[derive(Debug, Default)]
pub struct Deduplicator {
    canonical: HashMap<String, Uuid>,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from keys already stored for the campaign.
    #[must_use]
    pub fn seeded(keys: impl IntoIterator<Item = (String, Uuid)>) -> Self {
        let mut canonical = HashMap::new();
        for (key, id) in keys {
            canonical.entry(key).or_insert(id);
        }
        Self { canonical }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    /// Marks `candidate` as a duplicate if its key is already taken.
    ///
    /// Candidates that are already duplicates, or that have no key, pass
    /// through unchanged. Returns `true` if the candidate is canonical.
    pub fn mark(&mut self, candidate: &mut CandidateLead) -> bool {
        if candidate.is_duplicate {
            return false;
        }
        let Some(key) = candidate.dedupe_key() else {
            return true;
        };
        match self.canonical.get(&key) {
            Some(&first) if first != candidate.id => {
                candidate.is_duplicate = true;
                candidate.duplicate_of = Some(first);
                false
            }
            Some(_) => true,
            None => {
                self.canonical.insert(key, candidate.id);
                true
            }
        }
    }

    /// Points `key` at `canonical`, replacing whatever it was mapped to.
    pub fn redirect(&mut self, key: String, canonical: Uuid) {
        self.canonical.insert(key, canonical);
    }

    /// Marks every candidate in order and returns them all.
    #[must_use]
    pub fn dedupe(&mut self, mut candidates: Vec<CandidateLead>) -> Vec<CandidateLead> {
        for candidate in &mut candidates {
            self.mark(candidate);
        }
        candidates
    }
}
