//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_retries` is 0 or exceeds 20
    /// - `retry_delay_ms` exceeds one minute
    /// - `cache_expiration_secs` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `fetch_concurrency` is 0 or exceeds 16
    /// - `top_k` or `max_sources` is 0
    /// - `collection` or `user_agent` is empty
    /// - a base URL does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "must be at least 1"));
        }
        if self.max_retries > 20 {
            return Err(invalid("max_retries", "must not exceed 20"));
        }

        if self.retry_delay_ms > 60_000 {
            return Err(invalid("retry_delay_ms", "must not exceed 1 minute (60000ms)"));
        }

        if self.cache_expiration_secs == 0 {
            return Err(invalid("cache_expiration_secs", "must be greater than 0"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.fetch_concurrency == 0 || self.fetch_concurrency > 16 {
            return Err(invalid("fetch_concurrency", "must be between 1 and 16"));
        }

        if self.top_k == 0 {
            return Err(invalid("top_k", "must be at least 1"));
        }

        if self.max_sources == 0 {
            return Err(invalid("max_sources", "must be at least 1"));
        }

        if self.collection.trim().is_empty() {
            return Err(invalid("collection", "must not be empty"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        for (field, value) in [("notion_base_url", &self.notion_base_url), ("llm_base_url", &self.llm_base_url)] {
            if let Err(e) = url::Url::parse(value) {
                return Err(ConfigError::Invalid { field: field.into(), reason: e.to_string() });
            }
        }

        if self.answer_ttl_secs == Some(0) {
            tracing::warn!("answer_ttl_secs is 0; every memoized answer will be treated as expired");
        }

        Ok(())
    }
}
