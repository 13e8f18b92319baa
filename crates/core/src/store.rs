//! Bounded in-memory store of live prefetch entries.
//!
//! One entry per normalized search terms, a hard capacity, per-entry
//! expiry deadlines swept by [`PrefetchStore::expire_stale`], and the
//! global error-backoff clock armed by any fetch failure. All mutation
//! happens on the owner's single logical sequence.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::engine::SearchTerms;
use crate::entry::PrefetchEntry;

/// Insertion failure: the key is already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("an entry already exists for these search terms")]
    AlreadyExists,
}

/// In-memory mapping from search terms to live prefetch entries.
#[derive(Debug)]
pub struct PrefetchStore {
    entries: HashMap<SearchTerms, PrefetchEntry>,
    max_entries: usize,
    error_backoff: Duration,
    last_error_at: Option<Instant>,
}

impl PrefetchStore {
    pub fn new(max_entries: usize, error_backoff: Duration) -> Self {
        Self { entries: HashMap::new(), max_entries, error_backoff, last_error_at: None }
    }

    /// Insert a new entry. The caller is expected to have checked for a
    /// duplicate already; an occupied key is rejected, never replaced.
    pub fn insert(&mut self, terms: SearchTerms, entry: PrefetchEntry) -> Result<(), StoreError> {
        if self.entries.contains_key(&terms) {
            return Err(StoreError::AlreadyExists);
        }
        self.entries.insert(terms, entry);
        Ok(())
    }

    pub fn get(&self, terms: &SearchTerms) -> Option<&PrefetchEntry> {
        self.entries.get(terms)
    }

    pub fn get_mut(&mut self, terms: &SearchTerms) -> Option<&mut PrefetchEntry> {
        self.entries.get_mut(terms)
    }

    pub fn remove(&mut self, terms: &SearchTerms) -> Option<PrefetchEntry> {
        self.entries.remove(terms)
    }

    pub fn contains(&self, terms: &SearchTerms) -> bool {
        self.entries.contains_key(terms)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn at_capacity(&self) -> bool {
        self.entries.len() >= self.max_entries
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&SearchTerms, &mut PrefetchEntry)> {
        self.entries.iter_mut()
    }

    /// Delete every entry whose deadline has passed. Returns the number
    /// removed. A delayed sweep only ever serves longer than intended,
    /// never shorter, so callers may run this as coarsely as they like.
    pub fn expire_stale(&mut self, now: Instant) -> usize {
        let expired: Vec<SearchTerms> =
            self.entries.iter().filter(|(_, e)| e.is_expired(now)).map(|(t, _)| t.clone()).collect();

        for terms in &expired {
            if let Some(mut entry) = self.entries.remove(terms) {
                entry.abort_fetch();
                tracing::debug!(
                    search_terms = %terms,
                    final_status = %entry.status(),
                    navigation_prefetch = entry.navigation_prefetch(),
                    "prefetch entry expired"
                );
            }
        }
        expired.len()
    }

    /// Drop all entries, aborting any in-flight fetches. Used on
    /// default-search-engine change and explicit cache clears.
    pub fn clear(&mut self) {
        for (terms, entry) in self.entries.iter_mut() {
            entry.abort_fetch();
            tracing::debug!(
                search_terms = %terms,
                final_status = %entry.status(),
                navigation_prefetch = entry.navigation_prefetch(),
                "prefetch entry dropped by clear"
            );
        }
        self.entries.clear();
    }

    /// Arm the global backoff clock after a fetch failure. Suppresses all
    /// eligibility, not just the failing query, for the backoff duration.
    pub fn record_fetch_error(&mut self, now: Instant) {
        self.last_error_at = Some(now);
    }

    pub fn in_error_backoff(&self, now: Instant) -> bool {
        self.last_error_at.is_some_and(|at| now < at + self.error_backoff)
    }
}
