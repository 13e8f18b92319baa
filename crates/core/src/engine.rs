//! Default search engine boundary: term extraction and preload URLs.
//!
//! The engine owns the one extraction rule the whole service keys on. The
//! same rule is used when deciding whether to prefetch a candidate, when
//! intercepting a navigation, and when re-validating persisted alias
//! entries, so that a prefetched response is only ever matched against
//! terms produced by identical logic.

use std::fmt;

use url::Url;

use crate::Error;
use crate::urls::same_origin;

/// Query parameter appended to URLs fetched speculatively, so the search
/// engine can distinguish prefetch traffic from real navigations.
const PREFETCH_PARAM: (&str, &str) = ("pf", "cs");

/// Normalized search terms, the primary key for live prefetches.
///
/// Normalization collapses runs of whitespace, trims, and lowercases, so
/// `" Weather  Tomorrow"` and `"weather tomorrow"` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerms(String);

impl SearchTerms {
    /// Normalize `raw` into search terms. Returns `None` when nothing
    /// remains after trimming.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        if normalized.is_empty() { None } else { Some(Self(normalized)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The active default search engine.
///
/// Holds the results-page base URL (origin + path) and the query parameter
/// carrying the terms, e.g. `https://se.com/search` with `q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEngine {
    results_base: Url,
    query_param: String,
}

impl SearchEngine {
    /// Create an engine from its results-page base URL.
    ///
    /// The base must be an http(s) URL with a host; query and fragment on
    /// the base are ignored.
    pub fn new(results_base: Url, query_param: impl Into<String>) -> Result<Self, Error> {
        if !matches!(results_base.scheme(), "http" | "https") || results_base.host_str().is_none() {
            return Err(Error::InvalidUrl(format!("unusable search engine base: {results_base}")));
        }

        let mut base = results_base;
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { results_base: base, query_param: query_param.into() })
    }

    /// Extract normalized search terms from `url`.
    ///
    /// Returns `None` unless `url` is this engine's results page (same
    /// origin and path) carrying a non-empty terms parameter.
    pub fn extract_search_terms(&self, url: &Url) -> Option<SearchTerms> {
        if !same_origin(url, &self.results_base) || url.path() != self.results_base.path() {
            return None;
        }

        url.query_pairs()
            .find(|(key, _)| key == self.query_param.as_str())
            .and_then(|(_, value)| SearchTerms::new(&value))
    }

    /// Build the URL to fetch for `terms`.
    ///
    /// `attach_prefetch_param` adds the prefetch marker parameter and must
    /// be set for requests that go to the network; URLs built for
    /// client-internal comparison leave it off.
    pub fn preload_url(&self, terms: &SearchTerms, attach_prefetch_param: bool) -> Url {
        let mut url = self.results_base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(&self.query_param, terms.as_str());
            if attach_prefetch_param {
                pairs.append_pair(PREFETCH_PARAM.0, PREFETCH_PARAM.1);
            }
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SearchEngine {
        SearchEngine::new(Url::parse("https://se.com/search").unwrap(), "q").unwrap()
    }

    #[test]
    fn test_terms_normalization() {
        let terms = SearchTerms::new("  Weather   Tomorrow ").unwrap();
        assert_eq!(terms.as_str(), "weather tomorrow");
    }

    #[test]
    fn test_terms_empty() {
        assert!(SearchTerms::new("   ").is_none());
        assert!(SearchTerms::new("").is_none());
    }

    #[test]
    fn test_extract_search_terms() {
        let url = Url::parse("https://se.com/search?q=Weather+Tomorrow").unwrap();
        let terms = engine().extract_search_terms(&url).unwrap();
        assert_eq!(terms.as_str(), "weather tomorrow");
    }

    #[test]
    fn test_extract_ignores_other_origins_and_paths() {
        let e = engine();
        assert!(e.extract_search_terms(&Url::parse("https://other.com/search?q=a").unwrap()).is_none());
        assert!(e.extract_search_terms(&Url::parse("https://se.com/images?q=a").unwrap()).is_none());
    }

    #[test]
    fn test_extract_requires_terms() {
        let e = engine();
        assert!(e.extract_search_terms(&Url::parse("https://se.com/search").unwrap()).is_none());
        assert!(e.extract_search_terms(&Url::parse("https://se.com/search?q=").unwrap()).is_none());
    }

    #[test]
    fn test_preload_url_attaches_prefetch_param() {
        let terms = SearchTerms::new("weather").unwrap();
        let with = engine().preload_url(&terms, true);
        let without = engine().preload_url(&terms, false);
        assert_eq!(with.as_str(), "https://se.com/search?q=weather&pf=cs");
        assert_eq!(without.as_str(), "https://se.com/search?q=weather");
    }

    #[test]
    fn test_preload_extract_round_trip() {
        let terms = SearchTerms::new("quantum computing").unwrap();
        let url = engine().preload_url(&terms, true);
        assert_eq!(engine().extract_search_terms(&url), Some(terms));
    }

    #[test]
    fn test_engine_rejects_bad_base() {
        assert!(SearchEngine::new(Url::parse("file:///tmp/x").unwrap(), "q").is_err());
    }
}
