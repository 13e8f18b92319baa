//! Eligibility verdicts for prefetch candidates.
//!
//! The checks behind these reasons are ordered and short-circuiting: the
//! first failing check wins and nothing past it is evaluated. The variant
//! order below is the check order.

/// Why a candidate query was not prefetched.
///
/// Returned by `SearchPrefetchService::maybe_prefetch_url`; an `Ok(())`
/// from that method means the prefetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PrefetchIneligibility {
    /// Prefetching (or navigation prefetching, for navigation-triggered
    /// candidates) is disabled by configuration.
    #[error("prefetching is disabled by configuration")]
    FeatureDisabled,

    /// There is no active default search engine.
    #[error("no valid default search engine")]
    SearchEngineNotValid,

    /// The candidate URL is not a default-search results page with
    /// extractable, non-empty search terms.
    #[error("not a default-search URL with terms")]
    NotDefaultSearchWithTerms,

    /// Preloading is disabled by user preference.
    #[error("preloading disabled by user preference")]
    PrefetchDisabled,

    /// Scripting is disabled globally or for this origin.
    #[error("javascript is disabled")]
    JavascriptDisabled,

    /// A recent fetch failure put the whole service in its backoff window.
    #[error("within the error backoff window")]
    ErrorBackoff,

    /// A live entry for these exact search terms already exists. This is a
    /// duplicate attempt, not a failure.
    #[error("these search terms were attempted recently")]
    AttemptedQueryRecently,

    /// The in-memory store is at capacity.
    #[error("concurrent prefetch limit reached")]
    MaxAttemptsReached,

    /// The underlying fetcher refused to start the request.
    #[error("fetcher is throttled")]
    Throttled,
}

impl PrefetchIneligibility {
    /// Duplicate attempts are accounted separately from real rejections.
    pub fn is_duplicate(self) -> bool {
        self == Self::AttemptedQueryRecently
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_classification() {
        assert!(PrefetchIneligibility::AttemptedQueryRecently.is_duplicate());
        assert!(!PrefetchIneligibility::ErrorBackoff.is_duplicate());
        assert!(!PrefetchIneligibility::MaxAttemptsReached.is_duplicate());
    }
}
