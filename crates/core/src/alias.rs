//! Durable URL-to-URL alias cache.
//!
//! Maps a normalized navigation URL to the prefetch URL whose response can
//! satisfy it, so a slightly different but equivalent navigation still
//! benefits from an already-fetched response, even after the in-memory
//! entry expired and across restarts. Bounded by evicting the entry with
//! the oldest `last_used_time`; the cardinality is small enough that a
//! linear scan is fine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use url::Url;

use crate::engine::SearchEngine;
use crate::urls::{normalized_key, same_origin, strip_fragment};

/// Persisted form: navigation URL string to `[prefetch_url, timestamp]`.
/// Serde serializes the tuple as a 2-element JSON array.
pub type PersistedAliasMap = BTreeMap<String, (String, String)>;

#[derive(Debug, Clone)]
struct AliasEntry {
    prefetch_url: Url,
    last_used_at: DateTime<Utc>,
}

/// Bounded, recency-evicted navigation-URL to prefetch-URL mapping.
#[derive(Debug)]
pub struct AliasCache {
    entries: BTreeMap<String, AliasEntry>,
    max_entries: usize,
}

impl AliasCache {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: BTreeMap::new(), max_entries }
    }

    /// Map `navigation_url` to `prefetch_url`.
    ///
    /// No-op when the normalized URLs are equal (a self-alias is useless)
    /// or when the two are cross-origin: an alias must never redirect a
    /// navigation to another origin, so the check is enforced at creation
    /// time as well as at load time. Returns whether the cache changed.
    pub fn put(&mut self, navigation_url: &Url, prefetch_url: &Url) -> bool {
        let navigation = strip_fragment(navigation_url);
        let prefetch = strip_fragment(prefetch_url);

        if navigation == prefetch {
            return false;
        }
        if !same_origin(&navigation, &prefetch) {
            tracing::warn!(%navigation, %prefetch, "refusing cross-origin alias");
            return false;
        }

        self.insert_at(navigation.into(), prefetch, Utc::now());
        true
    }

    /// Look up the prefetch URL aliased to `navigation_url`, if any.
    pub fn get(&self, navigation_url: &Url) -> Option<&Url> {
        self.entries.get(&normalized_key(navigation_url)).map(|e| &e.prefetch_url)
    }

    /// Bump the recency of an alias on a cache hit, without changing the
    /// mapping. Returns whether the alias existed.
    pub fn touch(&mut self, navigation_url: &Url) -> bool {
        match self.entries.get_mut(&normalized_key(navigation_url)) {
            Some(entry) => {
                entry.last_used_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, navigation_url: &Url) -> bool {
        self.entries.remove(&normalized_key(navigation_url)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot in the persisted dictionary form.
    pub fn to_persisted(&self) -> PersistedAliasMap {
        self.entries
            .iter()
            .map(|(key, entry)| {
                (key.clone(), (entry.prefetch_url.to_string(), entry.last_used_at.to_rfc3339()))
            })
            .collect()
    }

    /// Rebuild a cache from its persisted form, re-validating every entry.
    ///
    /// An entry is silently dropped when either URL fails to parse, the
    /// pair is cross-origin or identical, the navigation URL no longer
    /// extracts search terms under the current engine, or the timestamp is
    /// malformed or in the future. Returns the cache and the number of
    /// entries dropped; a partially corrupt snapshot degrades instead of
    /// failing the whole load.
    pub fn from_persisted(
        persisted: &PersistedAliasMap, engine: &SearchEngine, max_entries: usize, now: DateTime<Utc>,
    ) -> (Self, usize) {
        let mut cache = Self::new(max_entries);
        let mut dropped = 0usize;

        for (navigation_raw, (prefetch_raw, timestamp_raw)) in persisted {
            let Some(validated) = validate_persisted_entry(navigation_raw, prefetch_raw, timestamp_raw, engine, now)
            else {
                dropped += 1;
                continue;
            };
            let (navigation, prefetch, last_used_at) = validated;
            cache.insert_at(navigation.into(), prefetch, last_used_at);
        }

        (cache, dropped)
    }

    fn insert_at(&mut self, key: String, prefetch_url: Url, last_used_at: DateTime<Utc>) {
        self.entries.insert(key, AliasEntry { prefetch_url, last_used_at });

        if self.entries.len() <= self.max_entries {
            return;
        }

        // Evict the single entry with the globally oldest last_used_time.
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used_at)
            .map(|(key, _)| key.clone())
        {
            tracing::debug!(navigation = %oldest, "evicting oldest alias cache entry");
            self.entries.remove(&oldest);
        }
    }
}

fn validate_persisted_entry(
    navigation_raw: &str, prefetch_raw: &str, timestamp_raw: &str, engine: &SearchEngine, now: DateTime<Utc>,
) -> Option<(Url, Url, DateTime<Utc>)> {
    let navigation = Url::parse(navigation_raw).ok().map(|u| strip_fragment(&u))?;
    let prefetch = Url::parse(prefetch_raw).ok().map(|u| strip_fragment(&u))?;

    // Only same-origin mappings survive a corrupted snapshot.
    if !same_origin(&navigation, &prefetch) {
        return None;
    }
    if navigation == prefetch {
        return None;
    }

    // The navigation side must still be a search results URL.
    engine.extract_search_terms(&navigation)?;

    let last_used_at = DateTime::parse_from_rfc3339(timestamp_raw).ok()?.with_timezone(&Utc);
    if last_used_at > now {
        return None;
    }

    Some((navigation, prefetch, last_used_at))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn engine() -> SearchEngine {
        SearchEngine::new(Url::parse("https://se.com/search").unwrap(), "q").unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = AliasCache::new(10);
        assert!(cache.put(&url("https://se.com/search?q=weather"), &url("https://se.com/search?q=weather&pf=cs")));

        let hit = cache.get(&url("https://se.com/search?q=weather")).unwrap();
        assert_eq!(hit.as_str(), "https://se.com/search?q=weather&pf=cs");
    }

    #[test]
    fn test_fragment_is_ignored_on_lookup() {
        let mut cache = AliasCache::new(10);
        cache.put(&url("https://se.com/search?q=a#x"), &url("https://se.com/search?q=a&pf=cs"));
        assert!(cache.get(&url("https://se.com/search?q=a#y")).is_some());
    }

    #[test]
    fn test_self_alias_is_rejected() {
        let mut cache = AliasCache::new(10);
        assert!(!cache.put(&url("https://se.com/search?q=a"), &url("https://se.com/search?q=a#frag")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cross_origin_alias_is_rejected() {
        let mut cache = AliasCache::new(10);
        assert!(!cache.put(&url("https://se.com/search?q=a"), &url("https://evil.com/search?q=a&pf=cs")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_removes_globally_oldest() {
        let base = Utc::now() - Duration::minutes(10);
        let mut persisted = PersistedAliasMap::new();
        for (i, q) in ["a", "b", "c"].iter().enumerate() {
            persisted.insert(
                format!("https://se.com/search?q={q}"),
                (format!("https://se.com/search?q={q}&pf=cs"), (base + Duration::minutes(i as i64)).to_rfc3339()),
            );
        }

        let (mut cache, dropped) = AliasCache::from_persisted(&persisted, &engine(), 3, Utc::now());
        assert_eq!(dropped, 0);
        assert_eq!(cache.len(), 3);

        // "a" is oldest, but a touch refreshes it, so "b" must go instead.
        assert!(cache.touch(&url("https://se.com/search?q=a")));
        cache.put(&url("https://se.com/search?q=d"), &url("https://se.com/search?q=d&pf=cs"));

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&url("https://se.com/search?q=b")).is_none());
        assert!(cache.get(&url("https://se.com/search?q=a")).is_some());
        assert!(cache.get(&url("https://se.com/search?q=d")).is_some());
    }

    #[test]
    fn test_eviction_bound_holds_after_every_put() {
        let mut cache = AliasCache::new(2);
        for q in ["a", "b", "c", "d", "e"] {
            cache.put(
                &url(&format!("https://se.com/search?q={q}")),
                &url(&format!("https://se.com/search?q={q}&pf=cs")),
            );
            assert!(cache.len() <= 2);
        }
    }

    #[test]
    fn test_round_trip() {
        let mut cache = AliasCache::new(10);
        cache.put(&url("https://se.com/search?q=a"), &url("https://se.com/search?q=a&pf=cs"));
        cache.put(&url("https://se.com/search?q=b"), &url("https://se.com/search?q=b&pf=cs"));

        let (reloaded, dropped) = AliasCache::from_persisted(&cache.to_persisted(), &engine(), 10, Utc::now());
        assert_eq!(dropped, 0);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get(&url("https://se.com/search?q=a")).map(Url::as_str),
            Some("https://se.com/search?q=a&pf=cs")
        );
        assert_eq!(
            reloaded.get(&url("https://se.com/search?q=b")).map(Url::as_str),
            Some("https://se.com/search?q=b&pf=cs")
        );
    }

    #[test]
    fn test_load_drops_malformed_entries() {
        let now = Utc::now();
        let valid_ts = (now - Duration::minutes(1)).to_rfc3339();
        let mut persisted = PersistedAliasMap::new();
        // Valid entry.
        persisted.insert(
            "https://se.com/search?q=ok".to_string(),
            ("https://se.com/search?q=ok&pf=cs".to_string(), valid_ts.clone()),
        );
        // Unparseable navigation URL.
        persisted.insert("not a url".to_string(), ("https://se.com/search?q=x&pf=cs".to_string(), valid_ts.clone()));
        // Cross-origin mapping.
        persisted.insert(
            "https://se.com/search?q=evil".to_string(),
            ("https://evil.com/search?q=evil".to_string(), valid_ts.clone()),
        );
        // Navigation URL that is not a search URL anymore.
        persisted.insert(
            "https://se.com/images?q=pic".to_string(),
            ("https://se.com/images?q=pic&pf=cs".to_string(), valid_ts.clone()),
        );
        // Timestamp in the future.
        persisted.insert(
            "https://se.com/search?q=future".to_string(),
            ("https://se.com/search?q=future&pf=cs".to_string(), (now + Duration::hours(1)).to_rfc3339()),
        );
        // Identical pair.
        persisted.insert(
            "https://se.com/search?q=same".to_string(),
            ("https://se.com/search?q=same".to_string(), valid_ts),
        );

        let (cache, dropped) = AliasCache::from_persisted(&persisted, &engine(), 10, now);
        assert_eq!(cache.len(), 1);
        assert_eq!(dropped, 5);
        assert!(cache.get(&url("https://se.com/search?q=ok")).is_some());
    }
}
