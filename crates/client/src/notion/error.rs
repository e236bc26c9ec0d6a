//! Notion API client error types.

use std::sync::Arc;

use rocky_core::SourceError;

/// Errors from the Notion API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotionError {
    /// No integration token configured.
    #[error("missing API key: ROCKY_NOTION_API_KEY not set")]
    MissingApiKey,

    /// Token rejected, or the page is not shared with the integration.
    #[error("authentication failed: HTTP {status}")]
    AuthError { status: u16 },

    /// Page or block does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited by the Notion API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Any other non-success status.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body is not the expected JSON.
    #[error("parse error: {0}")]
    Parse(String),
}

impl NotionError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            NotionError::Timeout | NotionError::Network(_) | NotionError::RateLimited => true,
            NotionError::HttpError { status } => *status >= 500,
            NotionError::MissingApiKey
            | NotionError::AuthError { .. }
            | NotionError::NotFound(_)
            | NotionError::Parse(_) => false,
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, block_id: &str) -> Self {
        match status.as_u16() {
            401 | 403 => NotionError::AuthError { status: status.as_u16() },
            404 => NotionError::NotFound(block_id.to_string()),
            429 => NotionError::RateLimited,
            code => NotionError::HttpError { status: code },
        }
    }
}

impl From<reqwest::Error> for NotionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotionError::Timeout
        } else if err.is_decode() {
            NotionError::Parse(err.to_string())
        } else {
            NotionError::Network(Arc::new(err))
        }
    }
}

impl From<NotionError> for SourceError {
    fn from(err: NotionError) -> Self {
        if err.is_transient() { SourceError::Transient(err.to_string()) } else { SourceError::Unexpected(err.to_string()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_display() {
        let err = NotionError::MissingApiKey;
        assert!(err.to_string().contains("API key"));

        let err = NotionError::HttpError { status: 502 };
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_status_classification() {
        assert!(NotionError::from_status(StatusCode::TOO_MANY_REQUESTS, "a").is_transient());
        assert!(NotionError::from_status(StatusCode::BAD_GATEWAY, "a").is_transient());
        assert!(NotionError::from_status(StatusCode::SERVICE_UNAVAILABLE, "a").is_transient());

        assert!(!NotionError::from_status(StatusCode::UNAUTHORIZED, "a").is_transient());
        assert!(!NotionError::from_status(StatusCode::BAD_REQUEST, "a").is_transient());
        assert!(matches!(NotionError::from_status(StatusCode::NOT_FOUND, "abc"), NotionError::NotFound(id) if id == "abc"));
    }

    #[test]
    fn test_into_source_error() {
        let err: SourceError = NotionError::Timeout.into();
        assert!(err.is_transient());

        let err: SourceError = NotionError::MissingApiKey.into();
        assert_eq!(err, SourceError::Unexpected("missing API key: ROCKY_NOTION_API_KEY not set".into()));
    }
}
