//! Reconciles the live store against the current suggestion candidates.
//!
//! Each time the suggestion backend reports a fresh candidate set, any
//! suggestion-driven entry whose terms are no longer on screen is torn
//! down so its slot frees up for queries the user can still reach.

use std::collections::HashSet;

use crate::engine::SearchTerms;
use crate::store::PrefetchStore;

/// One suggested query from the suggestion backend.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub search_terms: SearchTerms,
    /// Whether the backend scored this suggestion likely enough to be
    /// navigated to that it should be prefetched eagerly.
    pub is_likely_navigation: bool,
}

/// Decide which entries to cancel given the new candidate set.
///
/// Navigation prefetches are exempt: they were started by a strong user
/// signal, not by a suggestion, and outlive the set that was showing at
/// the time. Prerendered entries are exempt too, since their consumption
/// path is activation. Every surviving entry also loses any pending
/// prerender-upgrade hook; upgrades are re-derived from the new set.
pub(crate) fn reconcile(store: &mut PrefetchStore, candidates: &[Candidate]) -> Vec<SearchTerms> {
    let current: HashSet<&SearchTerms> = candidates.iter().map(|c| &c.search_terms).collect();

    let mut to_cancel = Vec::new();
    for (terms, entry) in store.entries_mut() {
        if !entry.navigation_prefetch()
            && entry.status() != crate::entry::PrefetchStatus::Prerendered
            && !current.contains(terms)
        {
            to_cancel.push(terms.clone());
        } else {
            entry.reset_prerender_upgrade();
        }
    }
    to_cancel
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use url::Url;

    use super::*;
    use crate::entry::PrefetchEntry;

    fn terms(raw: &str) -> SearchTerms {
        SearchTerms::new(raw).unwrap()
    }

    fn entry(raw: &str, navigation: bool) -> PrefetchEntry {
        PrefetchEntry::new(
            terms(raw),
            Url::parse(&format!("https://se.com/search?q={raw}&pf=cs")).unwrap(),
            navigation,
            1,
            Instant::now() + Duration::from_secs(60),
        )
    }

    fn candidate(raw: &str) -> Candidate {
        Candidate { search_terms: terms(raw), is_likely_navigation: false }
    }

    #[test]
    fn test_cancels_suggestion_entries_missing_from_set() {
        let mut store = PrefetchStore::new(10, Duration::from_secs(60));
        store.insert(terms("kept"), entry("kept", false)).unwrap();
        store.insert(terms("gone"), entry("gone", false)).unwrap();

        let cancelled = reconcile(&mut store, &[candidate("kept")]);
        assert_eq!(cancelled, vec![terms("gone")]);
    }

    #[test]
    fn test_navigation_prefetch_survives_any_set() {
        let mut store = PrefetchStore::new(10, Duration::from_secs(60));
        store.insert(terms("typed"), entry("typed", true)).unwrap();

        let cancelled = reconcile(&mut store, &[]);
        assert!(cancelled.is_empty());
    }

    #[test]
    fn test_prerendered_entry_survives_any_set() {
        let mut store = PrefetchStore::new(10, Duration::from_secs(60));
        let mut e = entry("shown", false);
        e.mark_complete(crate::fetcher::FetchedResponse {
            status_code: 200,
            content_type: None,
            body: bytes::Bytes::new(),
        });
        e.mark_prerendered();
        store.insert(terms("shown"), e).unwrap();

        let cancelled = reconcile(&mut store, &[]);
        assert!(cancelled.is_empty());
    }

    #[test]
    fn test_surviving_entries_lose_pending_upgrade() {
        let mut store = PrefetchStore::new(10, Duration::from_secs(60));
        let mut e = entry("kept", false);
        e.set_prerender_upgrade();
        store.insert(terms("kept"), e).unwrap();

        reconcile(&mut store, &[candidate("kept")]);
        assert!(!store.get(&terms("kept")).unwrap().prerender_upgrade_pending());
    }
}
