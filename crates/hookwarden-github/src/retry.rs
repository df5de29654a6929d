//! Bounded retry for commit status writes.

use crate::error::RetryPolicy;
use crate::types::{Comment, Membership, NewStatus, PullRequest, Status};
use crate::{GitHubApi, GitHubError};
use async_trait::async_trait;
use hookwarden_common_config::StatusRetryConfig;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
}

impl Backoff {
    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl From<&StatusRetryConfig> for Backoff {
    fn from(config: &StatusRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial: config.initial_backoff(),
            max: config.max_backoff(),
        }
    }
}

/// Decorator that retries [`GitHubApi::create_status`] on transient failures.
///
/// A `Retry-After` longer than [`Backoff::max`] ends the retries with the
/// rate-limit error. Every other call is passed through untouched.
#[derive(Debug, Clone)]
pub struct RetryingClient<C> {
    inner: C,
    backoff: Backoff,
}

impl<C: GitHubApi> RetryingClient<C> {
    pub fn new(inner: C, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

#[async_trait]
impl<C: GitHubApi> GitHubApi for RetryingClient<C> {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest, GitHubError> {
        self.inner.get_pull_request(owner, repo, number).await
    }

    async fn create_status(&self, owner: &str, repo: &str, sha: &str, status: &NewStatus) -> Result<Status, GitHubError> {
        let mut attempt = 1;
        loop {
            let err = match self.inner.create_status(owner, repo, sha, status).await {
                Ok(created) => return Ok(created),
                Err(e) => e,
            };

            let after = match err.retry_policy() {
                // The server's hint is a floor; waiting less would only be refused again.
                RetryPolicy::Retryable { after: Some(after) } if after > self.backoff.max => {
                    warn!(
                        owner, repo, sha,
                        context = %status.context,
                        retry_after_ms = after.as_millis() as u64,
                        "Requested wait exceeds retry budget, giving up"
                    );
                    return Err(err);
                }
                RetryPolicy::Retryable { after } if attempt < self.backoff.max_attempts => after,
                _ => return Err(err),
            };

            let delay = after.unwrap_or_default().max(self.backoff.delay(attempt));
            warn!(
                owner, repo, sha,
                context = %status.context,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Commit status failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn create_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<Comment, GitHubError> {
        self.inner.create_comment(owner, repo, number, body).await
    }

    async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, GitHubError> {
        self.inner.list_team_members(org, team).await
    }

    async fn add_team_membership(&self, org: &str, team: &str, login: &str) -> Result<Membership, GitHubError> {
        self.inner.add_team_membership(org, team, login).await
    }

    async fn remove_team_membership(&self, org: &str, team: &str, login: &str) -> Result<(), GitHubError> {
        self.inner.remove_team_membership(org, team, login).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let backoff = Backoff {
            max_attempts: 5,
            initial: Duration::from_millis(200),
            max: Duration::from_millis(1000),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_millis(1000));
        assert_eq!(backoff.delay(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_from_config() {
        let backoff = Backoff::from(&StatusRetryConfig::default());
        assert_eq!(backoff.max_attempts, 5);
        assert_eq!(backoff.initial, Duration::from_millis(200));
        assert_eq!(backoff.max, Duration::from_millis(5000));
    }
}
