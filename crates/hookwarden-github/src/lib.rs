//! GitHub API access for Hookwarden plugins.
//!
//! Plugins talk to GitHub through the [`GitHubApi`] trait. [`GitHubClient`]
//! is the REST implementation; in dry-run mode it performs reads and logs
//! writes. [`RetryingClient`] wraps any implementation and retries commit
//! status writes with exponential backoff.

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::{GitHubClient, GitHubConfig};
pub use error::{GitHubError, RetryPolicy};
pub use retry::{Backoff, RetryingClient};
pub use types::{Comment, GitRef, Label, Membership, NewStatus, PullRequest, Status, StatusState, User};

use async_trait::async_trait;
use std::sync::Arc;

/// Operations plugins may perform against GitHub.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Fetch a pull request.
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest, GitHubError>;

    /// Set a commit status on `sha`.
    async fn create_status(&self, owner: &str, repo: &str, sha: &str, status: &NewStatus) -> Result<Status, GitHubError>;

    /// Comment on an issue or pull request.
    async fn create_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<Comment, GitHubError>;

    /// Logins of every member of a team.
    async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, GitHubError>;

    /// Add (or invite) `login` to a team.
    async fn add_team_membership(&self, org: &str, team: &str, login: &str) -> Result<Membership, GitHubError>;

    /// Remove `login` from a team.
    async fn remove_team_membership(&self, org: &str, team: &str, login: &str) -> Result<(), GitHubError>;
}

#[async_trait]
impl<T: GitHubApi + ?Sized> GitHubApi for Arc<T> {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest, GitHubError> {
        (**self).get_pull_request(owner, repo, number).await
    }

    async fn create_status(&self, owner: &str, repo: &str, sha: &str, status: &NewStatus) -> Result<Status, GitHubError> {
        (**self).create_status(owner, repo, sha, status).await
    }

    async fn create_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<Comment, GitHubError> {
        (**self).create_comment(owner, repo, number, body).await
    }

    async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, GitHubError> {
        (**self).list_team_members(org, team).await
    }

    async fn add_team_membership(&self, org: &str, team: &str, login: &str) -> Result<Membership, GitHubError> {
        (**self).add_team_membership(org, team, login).await
    }

    async fn remove_team_membership(&self, org: &str, team: &str, login: &str) -> Result<(), GitHubError> {
        (**self).remove_team_membership(org, team, login).await
    }
}
