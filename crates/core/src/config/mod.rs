//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ROCKY_*)
//! 2. TOML config file (if ROCKY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::fetcher::RetryPolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ROCKY_*)
/// 2. TOML config file (if ROCKY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via ROCKY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Collection name scoping every cache namespace.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Maximum age of the document snapshot before it is rebuilt.
    ///
    /// Set via ROCKY_CACHE_EXPIRATION_SECS environment variable.
    #[serde(default = "default_cache_expiration_secs")]
    pub cache_expiration_secs: u64,

    /// Optional time-to-live for memoized answers. Unset means answers
    /// never expire by time.
    #[serde(default)]
    pub answer_ttl_secs: Option<u64>,

    /// Attempts per source item before a placeholder is emitted.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Constant delay between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Number of source items fetched concurrently.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Explicit source ids. Takes precedence over `pages_file` when non-empty.
    ///
    /// Set via ROCKY_SOURCE_IDS environment variable (comma-separated).
    #[serde(default)]
    pub source_ids: Vec<String>,

    /// Exported page list the source ids are extracted from.
    #[serde(default = "default_pages_file")]
    pub pages_file: PathBuf,

    /// Upper bound on the number of source ids indexed.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Notion integration token.
    ///
    /// Set via ROCKY_NOTION_API_KEY environment variable.
    #[serde(default)]
    pub notion_api_key: Option<String>,

    #[serde(default = "default_notion_base_url")]
    pub notion_base_url: String,

    #[serde(default = "default_notion_version")]
    pub notion_version: String,

    /// API key for the chat-completion endpoint.
    ///
    /// Set via ROCKY_LLM_API_KEY environment variable.
    #[serde(default)]
    pub llm_api_key: Option<String>,

    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Number of documents handed to the language model as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./llm_cache/rocky-cache.sqlite")
}

fn default_collection() -> String {
    "rocky".into()
}

fn default_cache_expiration_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    3_000
}

fn default_fetch_concurrency() -> usize {
    1
}

fn default_pages_file() -> PathBuf {
    PathBuf::from("pages.csv")
}

fn default_max_sources() -> usize {
    10
}

fn default_notion_base_url() -> String {
    "https://api.notion.com/v1".into()
}

fn default_notion_version() -> String {
    "2022-06-28".into()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}

fn default_top_k() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_user_agent() -> String {
    "rocky/0.1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            collection: default_collection(),
            cache_expiration_secs: default_cache_expiration_secs(),
            answer_ttl_secs: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            fetch_concurrency: default_fetch_concurrency(),
            source_ids: Vec::new(),
            pages_file: default_pages_file(),
            max_sources: default_max_sources(),
            notion_api_key: None,
            notion_base_url: default_notion_base_url(),
            notion_version: default_notion_version(),
            llm_api_key: None,
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
            top_k: default_top_k(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Snapshot expiration as a chrono duration for freshness checks.
    pub fn cache_expiration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.cache_expiration_secs).unwrap_or(i64::MAX))
    }

    pub fn answer_ttl(&self) -> Option<chrono::Duration> {
        self.answer_ttl_secs
            .map(|secs| chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
    }

    /// Retry policy shared by every fetch in a rebuild.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `max_retries` is 0.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms)).map_err(|e| {
            ConfigError::Invalid { field: "max_retries".into(), reason: e.to_string() }
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ROCKY_`
    /// 2. TOML file from `ROCKY_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("ROCKY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ROCKY_")
                .ignore(&["CONFIG_FILE", "SOURCE_IDS"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        if let Ok(ids) = std::env::var("ROCKY_SOURCE_IDS") {
            config.source_ids = split_list(&ids);
        }

        config.validate()?;

        Ok(config)
    }

    /// Check if the Notion token is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the token is not set.
    pub fn require_notion_api_key(&self) -> Result<&str, ConfigError> {
        self.notion_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "notion_api_key".into(),
            hint: "Set ROCKY_NOTION_API_KEY environment variable".into(),
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the LLM key is not set.
    pub fn require_llm_api_key(&self) -> Result<&str, ConfigError> {
        self.llm_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "llm_api_key".into(),
            hint: "Set ROCKY_LLM_API_KEY environment variable".into(),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./llm_cache/rocky-cache.sqlite"));
        assert_eq!(config.collection, "rocky");
        assert_eq!(config.cache_expiration_secs, 86_400);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_ms, 3_000);
        assert_eq!(config.fetch_concurrency, 1);
        assert_eq!(config.max_sources, 10);
        assert!(config.source_ids.is_empty());
        assert!(config.answer_ttl_secs.is_none());
        assert!(config.notion_api_key.is_none());
    }

    #[test]
    fn test_duration_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.cache_expiration(), chrono::Duration::hours(24));
        assert!(config.answer_ttl().is_none());

        let config = AppConfig { answer_ttl_secs: Some(60), ..Default::default() };
        assert_eq!(config.answer_ttl(), Some(chrono::Duration::minutes(1)));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = AppConfig { max_retries: 3, retry_delay_ms: 250, ..Default::default() };
        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff(), Duration::from_millis(250));
    }

    #[test]
    fn test_require_notion_api_key() {
        let config = AppConfig::default();
        assert!(matches!(config.require_notion_api_key(), Err(ConfigError::Missing { .. })));

        let config = AppConfig { notion_api_key: Some("secret".into()), ..Default::default() };
        assert_eq!(config.require_notion_api_key().unwrap(), "secret");
    }

    #[test]
    fn test_require_llm_api_key_missing() {
        let config = AppConfig::default();
        assert!(matches!(config.require_llm_api_key(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
