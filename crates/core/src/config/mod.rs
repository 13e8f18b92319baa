//! Service configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (INSTASEARCH_*)
//! 2. TOML config file (if INSTASEARCH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Service configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (INSTASEARCH_*)
/// 2. TOML config file (if INSTASEARCH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Whether search prefetching is enabled at all.
    ///
    /// Set via INSTASEARCH_PREFETCHING_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub prefetching_enabled: bool,

    /// Whether navigation prefetches (strong user signal, e.g. a typed
    /// query) are enabled.
    ///
    /// Set via INSTASEARCH_NAVIGATION_PREFETCH_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub navigation_prefetch_enabled: bool,

    /// How long a prefetched response stays servable, in milliseconds.
    ///
    /// Set via INSTASEARCH_CACHING_LIMIT_MS environment variable.
    #[serde(default = "default_caching_limit_ms")]
    pub caching_limit_ms: u64,

    /// How long a single fetch failure suppresses all prefetching, in
    /// milliseconds.
    ///
    /// Set via INSTASEARCH_ERROR_BACKOFF_MS environment variable.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Maximum number of live prefetch entries.
    ///
    /// Set via INSTASEARCH_MAX_CONCURRENT_PREFETCHES environment variable.
    #[serde(default = "default_max_concurrent_prefetches")]
    pub max_concurrent_prefetches: usize,

    /// Maximum number of persisted alias cache entries.
    ///
    /// Set via INSTASEARCH_MAX_CACHE_ENTRIES environment variable.
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Path to the JSON prefs file backing the alias cache, or None to
    /// run without persistence.
    ///
    /// Set via INSTASEARCH_PREFS_PATH environment variable.
    #[serde(default = "default_prefs_path")]
    pub prefs_path: Option<PathBuf>,

    /// User-Agent string for prefetch requests.
    ///
    /// Set via INSTASEARCH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via INSTASEARCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per response.
    ///
    /// Set via INSTASEARCH_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum fetches allowed on the wire at once; requests beyond this
    /// are reported as throttled.
    ///
    /// Set via INSTASEARCH_MAX_INFLIGHT_FETCHES environment variable.
    #[serde(default = "default_max_inflight_fetches")]
    pub max_inflight_fetches: usize,
}

fn default_true() -> bool {
    true
}

fn default_caching_limit_ms() -> u64 {
    60_000
}

fn default_error_backoff_ms() -> u64 {
    60_000
}

fn default_max_concurrent_prefetches() -> usize {
    7
}

fn default_max_cache_entries() -> usize {
    10
}

fn default_prefs_path() -> Option<PathBuf> {
    Some(PathBuf::from("./instasearch-prefs.json"))
}

fn default_user_agent() -> String {
    "instasearch/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_max_inflight_fetches() -> usize {
    4
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            prefetching_enabled: true,
            navigation_prefetch_enabled: true,
            caching_limit_ms: default_caching_limit_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            max_concurrent_prefetches: default_max_concurrent_prefetches(),
            max_cache_entries: default_max_cache_entries(),
            prefs_path: default_prefs_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_inflight_fetches: default_max_inflight_fetches(),
        }
    }
}

impl PrefetchConfig {
    /// Serving lifetime as Duration.
    pub fn caching_limit(&self) -> Duration {
        Duration::from_millis(self.caching_limit_ms)
    }

    /// Error-backoff window as Duration.
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `INSTASEARCH_`
    /// 2. TOML file from `INSTASEARCH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("INSTASEARCH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("INSTASEARCH_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
