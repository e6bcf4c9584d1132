//! Completion service error types

use thiserror::Error;

/// Failure of a single completion exchange
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::InvalidRequest, message)
    }

    /// The service must answer with exactly one top-level choice
    pub fn choice_count(count: usize) -> Self {
        Self::new(
            UpstreamErrorKind::ChoiceCount,
            format!("expected exactly one completion choice, got {count}"),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(UpstreamErrorKind::Cancelled, "completion request cancelled")
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Unknown, message)
    }
}

/// Error classification, kept for callers that want to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Network issues, timeouts
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed or no credential configured
    Auth,
    /// Bad request (400)
    InvalidRequest,
    /// Zero or several top-level choices
    ChoiceCount,
    /// Session closed while the request was in flight
    Cancelled,
    Unknown,
}

impl UpstreamErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}
