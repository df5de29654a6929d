//! GitHub API errors.

use std::time::Duration;

/// Whether a failed call is safe to repeat, and after what delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// The call may be repeated.
    Retryable {
        /// Minimum delay the server asked for, if it said so.
        after: Option<Duration>,
    },
    /// Repeating the call would fail the same way.
    NonRetryable,
}

/// GitHub API errors.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("server error: {status}")]
    ServerError { status: u16, body: String },

    #[error("client error: {status}")]
    ClientError { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<reqwest::Error> for GitHubError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GitHubError::Timeout
        } else if e.is_decode() {
            GitHubError::Decode(e)
        } else {
            GitHubError::Request(e)
        }
    }
}

impl GitHubError {
    /// Retry decision for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Timeout | Self::Request(_) | Self::ServerError { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::ClientBuild(_) | Self::NotFound { .. } | Self::ClientError { .. } | Self::Decode(_) => {
                RetryPolicy::NonRetryable
            }
        }
    }

    /// Shorthand for `retry_policy() != NonRetryable`.
    pub fn is_retryable(&self) -> bool {
        self.retry_policy() != RetryPolicy::NonRetryable
    }

    /// HTTP status the API answered with, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerError { status, .. } | Self::ClientError { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}
