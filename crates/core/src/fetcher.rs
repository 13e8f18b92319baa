//! The network-issuing seam between the engine and its HTTP client.
//!
//! The service never talks to the network directly: it spawns a task that
//! calls a [`Fetcher`] and reports back through a [`FetchOutcome`] tagged
//! with the entry's generation. The consumer checks that tag before
//! applying any mutation, so completions racing with cancellation or
//! re-prefetching of the same terms are no-ops.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::engine::SearchTerms;

/// A fully received speculative response.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Why a speculative fetch produced no servable response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("fetcher refused to start the request")]
    Throttled,
}

/// Issues speculative fetches.
///
/// Implementations must be cheap to share (`Arc`) and safe to call from
/// spawned tasks. The engine treats any `Err` as a fetch failure that
/// arms the global error backoff.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, returning the complete response body.
    async fn fetch(&self, url: Url) -> Result<FetchedResponse, FetchError>;

    /// Whether the fetcher would currently refuse to start a request.
    ///
    /// Consulted as the last eligibility check; a throttled fetcher
    /// rejects the candidate without creating an entry.
    fn is_throttled(&self) -> bool {
        false
    }
}

/// Completion report delivered back to the service's single sequence.
#[derive(Debug)]
pub struct FetchOutcome {
    pub search_terms: SearchTerms,
    /// Generation of the entry this fetch was started for. Stale
    /// generations are discarded without touching the store.
    pub generation: u64,
    pub result: Result<FetchedResponse, FetchError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        assert!(FetchError::Http { status: 503 }.to_string().contains("503"));
        assert!(FetchError::TooLarge { limit: 1024 }.to_string().contains("1024"));
    }
}
