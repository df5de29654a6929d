//! Git error types.

use std::path::PathBuf;
use thiserror::Error;

/// Git operation error.
#[derive(Debug, Error)]
pub enum GitError {
    /// Repository not found.
    #[error("repository not found at {path}")]
    RepoNotFound {
        /// Path that was opened.
        path: String,
    },

    /// Reference not found.
    #[error("reference not found: {name}")]
    RefNotFound {
        /// Full reference name.
        name: String,
    },

    /// Remote not found.
    #[error("remote not found: {name}")]
    RemoteNotFound {
        /// Remote name.
        name: String,
    },

    /// Authentication failed.
    #[error("authentication failed: {reason}")]
    AuthFailed {
        /// Why the remote refused us.
        reason: String,
    },

    /// Git2 library error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Git operations.
pub type GitResult<T> = Result<T, GitError>;

impl GitError {
    /// Check if this is a network-related error.
    pub fn is_network_error(&self) -> bool {
        match self {
            Self::AuthFailed { .. } => true,
            Self::Git2(e) => {
                matches!(e.class(), git2::ErrorClass::Net | git2::ErrorClass::Http | git2::ErrorClass::Ssl)
            }
            _ => false,
        }
    }
}

/// Repository cache error, returned to the plugin that asked for a checkout.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Owner or repository name is not safe to use as a path component.
    #[error("invalid repository name: {name}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// First clone of the repository failed.
    #[error("failed to clone {repo}: {source}")]
    Clone {
        /// `owner/repo`.
        repo: String,
        /// Underlying git failure.
        #[source]
        source: GitError,
    },

    /// Refreshing an existing clone failed.
    #[error("failed to fetch {repo}: {source}")]
    Fetch {
        /// `owner/repo`.
        repo: String,
        /// Underlying git failure.
        #[source]
        source: GitError,
    },

    /// A path inside a checkout escaped the working tree.
    #[error("path {path} is outside the working tree")]
    InvalidPath {
        /// The rejected relative path.
        path: PathBuf,
    },

    /// The cache was cleaned; no further checkouts are served.
    #[error("repository cache has been cleaned")]
    Closed,

    /// Git work on the blocking pool did not complete.
    #[error("git task failed: {0}")]
    Task(String),

    /// Filesystem error in the cache directory.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Whether a later checkout of the same repository may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Clone { source, .. } | Self::Fetch { source, .. } => {
                source.is_network_error() || matches!(source, GitError::Io(_))
            }
            Self::Task(_) | Self::Io(_) => true,
            Self::InvalidName { .. } | Self::InvalidPath { .. } | Self::Closed => false,
        }
    }
}
