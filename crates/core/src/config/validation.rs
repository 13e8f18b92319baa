//! Configuration validation rules.
//!
//! This module provides validation logic for `PrefetchConfig` values
//! after they have been loaded from environment, files, or defaults.

use thiserror::Error;

use crate::config::PrefetchConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl PrefetchConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `caching_limit_ms` or `error_backoff_ms` is 0
    /// - `max_concurrent_prefetches`, `max_cache_entries`, or
    ///   `max_inflight_fetches` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caching_limit_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "caching_limit_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.error_backoff_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "error_backoff_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_concurrent_prefetches == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_prefetches".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_cache_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_cache_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_inflight_fetches == 0 {
            return Err(ConfigError::Invalid {
                field: "max_inflight_fetches".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
