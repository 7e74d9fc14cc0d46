//! Error taxonomy for provider calls.
//!
//! Providers classify failures but never retry internally; retry and
//! skip decisions belong to the series/batch layers that call them.

use std::time::Duration;

/// Category of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Missing or invalid provider configuration (unknown name, absent
    /// credentials). Fatal at resolution time, never retried.
    Configuration,
    /// Connection-level failure (DNS, refused, reset).
    Network,
    /// The request exceeded its deadline.
    Timeout,
    /// HTTP 429 from the upstream provider.
    RateLimited,
    /// HTTP 401/403 from the upstream provider.
    Auth,
    /// Other 4xx from the upstream provider.
    ClientError,
    /// 5xx from the upstream provider.
    ServerError,
    /// The provider answered, but the text did not parse as the expected
    /// structured shape after normalization.
    MalformedResponse,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Configuration => "configuration error",
            Self::Network => "network error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
            Self::Auth => "authentication error",
            Self::ClientError => "client error",
            Self::ServerError => "server error",
            Self::MalformedResponse => "malformed response",
        };
        write!(f, "{}", s)
    }
}

/// A classified provider failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    /// HTTP status, when the failure came from an upstream response.
    pub status: Option<u16>,
    /// Upstream `Retry-After`, when provided on a 429.
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Configuration, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::MalformedResponse, message)
    }

    /// Build an error from an upstream HTTP status and body.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        Self {
            kind: classify_http_status(status),
            message: format!("HTTP {}: {}", status, truncate(body, 500)),
            status: Some(status),
            retry_after,
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::Network
                | LlmErrorKind::Timeout
                | LlmErrorKind::RateLimited
                | LlmErrorKind::ServerError
        )
    }
}

/// Map an HTTP status code onto an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        401 | 403 => LlmErrorKind::Auth,
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// Map a reqwest transport failure onto an error.
pub fn from_transport(err: &reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::timeout(format!("request timeout: {}", err))
    } else if err.is_connect() {
        LlmError::network(format!("connection failed: {}", err))
    } else {
        LlmError::network(format!("request failed: {}", err))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_auth_statuses() {
        assert_eq!(classify_http_status(401), LlmErrorKind::Auth);
        assert_eq!(classify_http_status(403), LlmErrorKind::Auth);
    }

    #[test]
    fn classify_rate_limit_and_client_errors() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(404), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(422), LlmErrorKind::ClientError);
    }

    #[test]
    fn classify_server_errors() {
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
    }

    #[test]
    fn retryable_kinds() {
        assert!(LlmError::from_status(500, "boom", None).is_retryable());
        assert!(LlmError::from_status(429, "slow down", None).is_retryable());
        assert!(!LlmError::from_status(401, "nope", None).is_retryable());
        assert!(!LlmError::malformed("not json").is_retryable());
        assert!(!LlmError::configuration("no key").is_retryable());
    }

    #[test]
    fn from_status_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let err = LlmError::from_status(502, &body, None);
        assert!(err.message.len() < 600);
        assert_eq!(err.status, Some(502));
    }
}
