//! Shared fixtures for server tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hookwarden_common_config::{ConfigAgent, HookwardenConfig};
use hookwarden_common_secret::{signature, TokenGenerator};
use hookwarden_git::{RepoCache, RepoCacheConfig};
use hookwarden_github::{GitHubClient, GitHubConfig};
use hookwarden_plugin::{Clients, Outcome, Plugin, PluginContext, PluginHelp, WebhookEvent};
use hookwarden_server::{RouterState, ShutdownCoordinator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SECRET: &str = "webhook-secret";

pub struct Fixture {
    pub dir: TempDir,
    pub state: RouterState,
    pub repos: Arc<RepoCache>,
    pub coordinator: ShutdownCoordinator,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_grace(Duration::from_secs(5))
    }

    pub fn with_grace(grace: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let remotes = dir.path().join("remotes");
        std::fs::create_dir_all(&remotes).unwrap();

        let repos = Arc::new(
            RepoCache::new(RepoCacheConfig::new(
                dir.path().join("cache"),
                remotes.to_string_lossy().to_string(),
            ))
            .unwrap(),
        );
        let github = GitHubClient::new(
            GitHubConfig {
                endpoint: "http://127.0.0.1:9".to_string(),
                dry_run: true,
                ..Default::default()
            },
            None,
        )
        .unwrap();

        let config = Arc::new(ConfigAgent::degraded(dir.path().join("config.yaml")));
        let coordinator = ShutdownCoordinator::new(grace);

        let state = RouterState {
            hmac: TokenGenerator::fixed("/etc/webhook/hmac", SECRET),
            config,
            clients: Clients {
                github: Arc::new(github),
                repos: Arc::clone(&repos),
            },
            shutdown: coordinator.clone(),
        };

        Self {
            dir,
            state,
            repos,
            coordinator,
        }
    }

    pub fn remotes(&self) -> std::path::PathBuf {
        self.dir.path().join("remotes")
    }
}

/// Create `<remotes>/<owner>/<repo>.git` with a single commit.
pub fn create_remote(remotes: &std::path::Path, owner: &str, repo: &str) {
    create_remote_with(remotes, owner, repo, &[("README.md", "hello\n")]);
}

/// Create `<remotes>/<owner>/<repo>.git` with one commit holding `files`.
pub fn create_remote_with(remotes: &std::path::Path, owner: &str, repo: &str, files: &[(&str, &str)]) {
    use hookwarden_git::git2::{Repository, Signature};

    let path = remotes.join(owner).join(format!("{repo}.git"));
    std::fs::create_dir_all(&path).unwrap();
    let remote = Repository::init(&path).unwrap();

    let mut index = remote.index().unwrap();
    for (name, contents) in files {
        std::fs::write(path.join(name), contents).unwrap();
        index.add_path(std::path::Path::new(name)).unwrap();
    }
    index.write().unwrap();
    let tree = remote.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    remote.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
}

/// A signed delivery for `path`.
pub fn delivery(path: &str, event: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-github-delivery", "delivery-42")
        .header("x-hub-signature-256", signature::sign(SECRET.as_bytes(), body.as_bytes()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Counts calls; optionally fails.
#[derive(Clone, Default)]
pub struct CountingPlugin {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl CountingPlugin {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for CountingPlugin {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn help(&self, _config: &HookwardenConfig) -> PluginHelp {
        PluginHelp {
            description: "Counts deliveries".to_string(),
            ..Default::default()
        }
    }

    async fn handle(&self, _event: &WebhookEvent, _ctx: &PluginContext) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("database password hunter2 rejected");
        }
        Ok(Outcome::Handled)
    }
}
