//! Serving-time request description, rejection reasons, and handles.
//!
//! A navigation that might be satisfied from the cache is described by a
//! [`ServeRequest`]; the service either returns a [`ResponseHandle`] or a
//! [`NotServed`] reason. A rejection is never an error from the user's
//! perspective: the navigation simply proceeds over the network.

use bytes::Bytes;
use url::Url;

use crate::engine::SearchTerms;

/// How the navigation was initiated.
///
/// Only first-party address-bar navigations may consume a prefetch; link
/// clicks and form submissions on result pages can collide with the same
/// URL pattern and must not be served from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTransition {
    AddressBar,
    Link,
    FormSubmit,
    Reload,
    Other,
}

/// Cache-control flags carried by the tentative request.
///
/// Any of these indicates a reload or devtools-driven request that must
/// not be satisfied by a possibly stale prefetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheFlags {
    pub bypass_cache: bool,
    pub disable_cache: bool,
    pub validate_cache: bool,
}

impl CacheFlags {
    pub fn any(self) -> bool {
        self.bypass_cache || self.disable_cache || self.validate_cache
    }
}

/// A tentative outgoing navigation request.
#[derive(Debug, Clone)]
pub struct ServeRequest {
    pub url: Url,
    pub method: String,
    pub cache_flags: CacheFlags,
    pub transition: NavigationTransition,
}

impl ServeRequest {
    /// A plain GET navigation from the address bar, the common case.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            cache_flags: CacheFlags::default(),
            transition: NavigationTransition::AddressBar,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_transition(mut self, transition: NavigationTransition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_cache_flags(mut self, cache_flags: CacheFlags) -> Self {
        self.cache_flags = cache_flags;
        self
    }
}

/// Why a navigation was not served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotServed {
    #[error("no valid default search engine")]
    SearchEngineNotValid,

    #[error("not a default-search URL with terms")]
    NotDefaultSearchWithTerms,

    /// No entry exists for the extracted terms.
    #[error("no prefetch for these search terms")]
    NoPrefetch,

    /// Scripting was disabled after the prefetch was created.
    #[error("javascript is disabled")]
    JavascriptDisabled,

    /// Defense in depth: the stored response is for another origin.
    #[error("prefetch was for a different origin")]
    PrefetchWasForDifferentOrigin,

    #[error("prefetch request was cancelled")]
    RequestWasCancelled,

    #[error("prefetch request failed")]
    RequestFailed,

    /// The entry was handed to the prerender subsystem; it is consumed
    /// through prerender activation, not through this path.
    #[error("entry is held by a prerender")]
    Prerendered,

    /// The entry is not in a servable state (still pending, for example).
    #[error("entry is not servable")]
    NotServedOtherReason,

    /// Non-GET method, cache-bypass flags, or a link/form transition.
    #[error("request kind cannot be served from a prefetch")]
    PostReloadFormOrLink,
}

/// A response the caller may use to satisfy the navigation.
#[derive(Debug, Clone)]
pub enum ResponseHandle {
    /// A completed in-memory prefetch, handed off at most once.
    Prefetched { search_terms: SearchTerms, prefetch_url: Url, status_code: u16, body: Bytes },

    /// An alias-cache hit: the caller should load `prefetch_url`, whose
    /// response is expected in the HTTP cache. Survives restarts and
    /// needs no in-memory entry.
    AliasForward { prefetch_url: Url },
}
