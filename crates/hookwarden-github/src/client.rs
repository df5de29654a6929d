//! REST client for the GitHub API.

use crate::types::{Comment, Membership, NewStatus, PullRequest, Status, User};
use crate::{GitHubApi, GitHubError};
use async_trait::async_trait;
use hookwarden_common_secret::TokenGenerator;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const PAGE_SIZE: usize = 100;

/// GitHub client configuration.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL.
    pub endpoint: String,
    /// Log mutations instead of sending them.
    pub dry_run: bool,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.github.com".to_string(),
            dry_run: false,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("hookwarden/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// GitHub REST client.
///
/// The token is read from its [`TokenGenerator`] on every request, so a
/// rotated token file takes effect without rebuilding the client. Without a
/// generator requests go out anonymously.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    endpoint: String,
    token: Option<TokenGenerator>,
    dry_run: bool,
}

impl GitHubClient {
    /// Build a client.
    pub fn new(config: GitHubConfig, token: Option<TokenGenerator>) -> Result<Self, GitHubError> {
        let http = ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(GitHubError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token,
            dry_run: config.dry_run,
        })
    }

    /// Whether mutations are suppressed.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// API base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        debug!(%method, %url, "GitHub request");

        let mut builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");

        if let Some(token) = self
            .token
            .as_ref()
            .and_then(TokenGenerator::token)
            .and_then(|bytes| bytes.to_utf8())
        {
            builder = builder.bearer_auth(token.expose());
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder, what: impl FnOnce() -> String) -> Result<Response, GitHubError> {
        let response = builder.send().await?;
        check_response(response, what).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: impl FnOnce() -> String) -> Result<T, GitHubError> {
        let response = self.send(self.request(Method::GET, path), what).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B, what: impl FnOnce() -> String) -> Result<T, GitHubError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(method, path).json(body), what).await?;
        Ok(response.json().await?)
    }
}

/// Check response status and convert errors.
async fn check_response(response: Response, what: impl FnOnce() -> String) -> Result<Response, GitHubError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");

    if status.as_u16() == 429 || (status.as_u16() == 403 && exhausted) {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        return Err(GitHubError::RateLimited { retry_after });
    }

    if status.as_u16() == 404 {
        return Err(GitHubError::NotFound { what: what() });
    }

    let body = response.text().await.unwrap_or_default();

    if status.is_server_error() {
        Err(GitHubError::ServerError {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(GitHubError::ClientError {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest, GitHubError> {
        self.get_json(&format!("/repos/{owner}/{repo}/pulls/{number}"), || {
            format!("pull request {owner}/{repo}#{number}")
        })
        .await
    }

    async fn create_status(&self, owner: &str, repo: &str, sha: &str, status: &NewStatus) -> Result<Status, GitHubError> {
        if self.dry_run {
            info!(
                owner, repo, sha,
                state = ?status.state,
                context = %status.context,
                "dry-run: skipping commit status"
            );
            return Ok(Status {
                id: 0,
                state: status.state,
                context: status.context.clone(),
                description: status.description.clone(),
            });
        }

        self.send_json(Method::POST, &format!("/repos/{owner}/{repo}/statuses/{sha}"), status, || {
            format!("commit {owner}/{repo}@{sha}")
        })
        .await
    }

    async fn create_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<Comment, GitHubError> {
        if self.dry_run {
            info!(owner, repo, number, "dry-run: skipping comment");
            return Ok(Comment {
                id: 0,
                body: body.to_string(),
            });
        }

        let payload = serde_json::json!({ "body": body });
        self.send_json(
            Method::POST,
            &format!("/repos/{owner}/{repo}/issues/{number}/comments"),
            &payload,
            || format!("issue {owner}/{repo}#{number}"),
        )
        .await
    }

    async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, GitHubError> {
        let mut members = Vec::new();
        let mut page = 1;
        loop {
            let path = format!("/orgs/{org}/teams/{team}/members?per_page={PAGE_SIZE}&page={page}");
            let batch: Vec<User> = self.get_json(&path, || format!("team {org}/{team}")).await?;
            let done = batch.len() < PAGE_SIZE;
            members.extend(batch.into_iter().map(|u| u.login));
            if done {
                return Ok(members);
            }
            page += 1;
        }
    }

    async fn add_team_membership(&self, org: &str, team: &str, login: &str) -> Result<Membership, GitHubError> {
        if self.dry_run {
            info!(org, team, login, "dry-run: skipping team membership add");
            return Ok(Membership {
                state: "active".to_string(),
                role: "member".to_string(),
            });
        }

        let payload = serde_json::json!({ "role": "member" });
        self.send_json(
            Method::PUT,
            &format!("/orgs/{org}/teams/{team}/memberships/{login}"),
            &payload,
            || format!("team {org}/{team}"),
        )
        .await
    }

    async fn remove_team_membership(&self, org: &str, team: &str, login: &str) -> Result<(), GitHubError> {
        if self.dry_run {
            info!(org, team, login, "dry-run: skipping team membership removal");
            return Ok(());
        }

        let builder = self.request(Method::DELETE, &format!("/orgs/{org}/teams/{team}/memberships/{login}"));
        self.send(builder, || format!("membership {login} in {org}/{team}")).await?;
        Ok(())
    }
}
