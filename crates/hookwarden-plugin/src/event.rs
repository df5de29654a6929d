//! Webhook deliveries and the payloads plugins parse out of them.

use bytes::Bytes;
use hookwarden_github::PullRequest;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Value of the `X-GitHub-Event` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Ping,
    PullRequest,
    Push,
    IssueComment,
    Other(String),
}

impl EventKind {
    pub fn parse(header: &str) -> Self {
        match header {
            "ping" => Self::Ping,
            "pull_request" => Self::PullRequest,
            "push" => Self::Push,
            "issue_comment" => Self::IssueComment,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::PullRequest => "pull_request",
            Self::Push => "push",
            Self::IssueComment => "issue_comment",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authenticated delivery.
///
/// The payload is kept as received; plugins parse the shape they need.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub kind: EventKind,
    /// `X-GitHub-Delivery` id.
    pub delivery: String,
    pub payload: Bytes,
}

impl WebhookEvent {
    pub fn new(kind: EventKind, delivery: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            delivery: delivery.into(),
            payload: payload.into(),
        }
    }

    /// Deserialize the payload.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Repository the delivery is about, when the payload names one.
    pub fn repository(&self) -> Option<Repository> {
        #[derive(Deserialize)]
        struct Envelope {
            repository: Option<Repository>,
        }

        self.parse::<Envelope>().ok().and_then(|e| e.repository)
    }
}

/// Repository owner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Repository block common to repository-scoped payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
    #[serde(default)]
    pub default_branch: Option<String>,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

/// `pull_request` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

/// Commit summary inside a `push` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushCommit {
    pub id: String,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

/// `push` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub after: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    pub repository: Repository,
}

impl PushEvent {
    /// Branch name for branch pushes, `None` for tags.
    pub fn branch(&self) -> Option<&str> {
        self.ref_name.strip_prefix("refs/heads/")
    }

    /// Whether any commit in the push added, changed or removed `path`.
    pub fn touches(&self, path: &str) -> bool {
        self.commits.iter().any(|c| {
            c.added
                .iter()
                .chain(&c.modified)
                .chain(&c.removed)
                .any(|p| p == path)
        })
    }
}
