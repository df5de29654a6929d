//! Git integration for Hookwarden.
//!
//! Plugins that need repository contents go through [`RepoCache`]: it keeps
//! one working clone per `owner/repo` under a single cache directory, clones
//! on first use, fetches on later uses and hands out [`RepoCheckout`] handles
//! that keep the working tree stable while they are alive.

#![warn(missing_docs)]

pub mod cache;
pub mod credentials;
pub mod error;
pub mod repository;

pub use cache::{CacheStats, RepoCache, RepoCacheConfig, RepoCheckout, RepoKey};
pub use credentials::GitCredential;
pub use error::{CacheError, GitError, GitResult};
pub use repository::GitRepository;

// Re-export git2 for tests and advanced usage
pub use git2;
