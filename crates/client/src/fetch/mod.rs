//! Speculative HTTP fetching over reqwest.
//!
//! Implements the core [`Fetcher`] trait with a shared connection pool, a
//! per-request timeout, a response size cap, and a semaphore bounding how
//! many prefetches may be on the wire at once. Throttling is visible to
//! the eligibility checks before an entry is ever created.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use instasearch_core::{FetchError, FetchedResponse, Fetcher, PrefetchConfig};
use reqwest::{Client, Url, header};
use tokio::sync::Semaphore;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// User agent string (default: "instasearch/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum prefetches on the wire at once (default: 4)
    pub max_inflight: usize,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "instasearch/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(10_000),
            max_inflight: 4,
        }
    }
}

impl From<&PrefetchConfig> for HttpFetcherConfig {
    fn from(config: &PrefetchConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_inflight: config.max_inflight_fetches,
        }
    }
}

/// HTTP fetcher backed by a shared reqwest client.
pub struct HttpFetcher {
    http: Client,
    config: HttpFetcherConfig,
    permits: Arc<Semaphore>,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        let permits = Arc::new(Semaphore::new(config.max_inflight));

        Ok(Self { http, config, permits })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: Url) -> Result<FetchedResponse, FetchError> {
        let _permit = self.permits.try_acquire().map_err(|_| FetchError::Throttled)?;
        let start = Instant::now();

        let response = self
            .http
            .get(url.clone())
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| if e.is_timeout() { FetchError::Timeout } else { FetchError::Network(e.to_string()) })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http { status: status.as_u16() });
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { limit: self.config.max_bytes });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| if e.is_timeout() { FetchError::Timeout } else { FetchError::Network(e.to_string()) })?;

        if body.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { limit: self.config.max_bytes });
        }

        tracing::debug!(
            %url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "prefetch response received"
        );

        Ok(FetchedResponse { status_code: status.as_u16(), content_type, body })
    }

    fn is_throttled(&self) -> bool {
        self.permits.available_permits() == 0
    }
}
