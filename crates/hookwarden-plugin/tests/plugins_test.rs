//! Reference plugins against a recording GitHub stub and a local git remote.

use async_trait::async_trait;
use hookwarden_common_config::HookwardenConfig;
use hookwarden_git::git2::{Repository as GitRepo, Signature};
use hookwarden_git::{RepoCache, RepoCacheConfig};
use hookwarden_github::{Comment, GitHubApi, GitHubError, Membership, NewStatus, PullRequest, Status, StatusState};
use hookwarden_plugin::jira::JiraChecker;
use hookwarden_plugin::teams::TeamsSync;
use hookwarden_plugin::{Clients, EventKind, Outcome, Plugin, PluginContext, WebhookEvent};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Status { repo: String, sha: String, state: StatusState, context: String },
    Add { team: String, login: String },
    Remove { team: String, login: String },
}

#[derive(Default)]
struct RecordingGitHub {
    teams: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingGitHub {
    fn with_team(mut self, team: &str, members: &[&str]) -> Self {
        self.teams
            .insert(team.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl GitHubApi for RecordingGitHub {
    async fn get_pull_request(&self, _owner: &str, _repo: &str, number: u64) -> Result<PullRequest, GitHubError> {
        Err(GitHubError::NotFound {
            what: format!("pull {number}"),
        })
    }

    async fn create_status(&self, owner: &str, repo: &str, sha: &str, status: &NewStatus) -> Result<Status, GitHubError> {
        self.calls.lock().push(Call::Status {
            repo: format!("{owner}/{repo}"),
            sha: sha.to_string(),
            state: status.state,
            context: status.context.clone(),
        });
        Ok(Status {
            id: 1,
            state: status.state,
            context: status.context.clone(),
            description: status.description.clone(),
        })
    }

    async fn create_comment(&self, _owner: &str, _repo: &str, _number: u64, body: &str) -> Result<Comment, GitHubError> {
        Ok(Comment { id: 1, body: body.to_string() })
    }

    async fn list_team_members(&self, _org: &str, team: &str) -> Result<Vec<String>, GitHubError> {
        self.teams.get(team).cloned().ok_or_else(|| GitHubError::NotFound {
            what: format!("team {team}"),
        })
    }

    async fn add_team_membership(&self, _org: &str, team: &str, login: &str) -> Result<Membership, GitHubError> {
        self.calls.lock().push(Call::Add {
            team: team.to_string(),
            login: login.to_string(),
        });
        Ok(Membership {
            state: "active".into(),
            role: "member".into(),
        })
    }

    async fn remove_team_membership(&self, _org: &str, team: &str, login: &str) -> Result<(), GitHubError> {
        self.calls.lock().push(Call::Remove {
            team: team.to_string(),
            login: login.to_string(),
        });
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    remotes: std::path::PathBuf,
    github: Arc<RecordingGitHub>,
    repos: Arc<RepoCache>,
}

impl Harness {
    fn new(github: RecordingGitHub) -> Self {
        let dir = TempDir::new().unwrap();
        let remotes = dir.path().join("remotes");
        std::fs::create_dir_all(&remotes).unwrap();
        let repos = RepoCache::new(RepoCacheConfig::new(
            dir.path().join("cache"),
            remotes.to_string_lossy().to_string(),
        ))
        .unwrap();

        Self {
            _dir: dir,
            remotes,
            github: Arc::new(github),
            repos: Arc::new(repos),
        }
    }

    fn context(&self, config: HookwardenConfig) -> PluginContext {
        let clients = Clients {
            github: self.github.clone(),
            repos: Arc::clone(&self.repos),
        };
        PluginContext::new(clients, Arc::new(config))
    }

    fn remote_with_file(&self, owner: &str, repo: &str, file: &str, contents: &str) {
        let path = self.remotes.join(owner).join(format!("{repo}.git"));
        std::fs::create_dir_all(&path).unwrap();
        let remote = GitRepo::init(&path).unwrap();
        std::fs::write(path.join(file), contents).unwrap();

        let mut index = remote.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();
        let tree = remote.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        remote.commit(Some("HEAD"), &sig, &sig, "teams", &tree, &[]).unwrap();
    }
}

fn config_enabling(key: &str, plugin: &str) -> HookwardenConfig {
    let mut config = HookwardenConfig::default();
    config.plugins.insert(key.to_string(), vec![plugin.to_string()]);
    config
}

fn pull_request_event(action: &str, title: &str, labels: &[&str]) -> WebhookEvent {
    let labels: Vec<_> = labels.iter().map(|l| json!({"name": l})).collect();
    let payload = json!({
        "action": action,
        "number": 4,
        "pull_request": {
            "number": 4,
            "title": title,
            "state": "open",
            "head": {"ref": "feature", "sha": "headsha"},
            "base": {"ref": "main", "sha": "basesha"},
            "labels": labels,
            "user": {"login": "octocat"}
        },
        "repository": {"name": "widget", "owner": {"login": "acme"}, "default_branch": "main"}
    });
    WebhookEvent::new(EventKind::PullRequest, "delivery-1", payload.to_string())
}

fn push_event(branch: &str, touched: &[&str]) -> WebhookEvent {
    let payload = json!({
        "ref": format!("refs/heads/{branch}"),
        "after": "aftersha",
        "commits": [{"id": "1", "modified": touched}],
        "repository": {"name": "widget", "owner": {"login": "acme"}, "default_branch": "main"}
    });
    WebhookEvent::new(EventKind::Push, "delivery-2", payload.to_string())
}

#[tokio::test]
async fn test_jira_reports_success_for_ticket_in_title() {
    let h = Harness::new(RecordingGitHub::default());
    let ctx = h.context(config_enabling("acme", JiraChecker::NAME));

    let outcome = JiraChecker::new()
        .handle(&pull_request_event("opened", "ABC-1 widget", &[]), &ctx)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(
        h.github.calls(),
        vec![Call::Status {
            repo: "acme/widget".into(),
            sha: "headsha".into(),
            state: StatusState::Success,
            context: "jira-checker".into(),
        }]
    );
}

#[tokio::test]
async fn test_jira_reports_failure_without_ticket() {
    let h = Harness::new(RecordingGitHub::default());
    let ctx = h.context(config_enabling("acme/widget", JiraChecker::NAME));

    JiraChecker::new()
        .handle(&pull_request_event("synchronize", "widget", &[]), &ctx)
        .await
        .unwrap();

    assert!(matches!(
        h.github.calls().as_slice(),
        [Call::Status { state: StatusState::Failure, .. }]
    ));
}

#[tokio::test]
async fn test_jira_ignores_disabled_repo_and_other_actions() {
    let h = Harness::new(RecordingGitHub::default());
    let ctx = h.context(config_enabling("other-org", JiraChecker::NAME));
    let plugin = JiraChecker::new();

    let outcome = plugin.handle(&pull_request_event("opened", "ABC-1", &[]), &ctx).await.unwrap();
    assert!(matches!(outcome, Outcome::Ignored { .. }));

    let ctx = h.context(config_enabling("acme", JiraChecker::NAME));
    let outcome = plugin.handle(&pull_request_event("closed", "ABC-1", &[]), &ctx).await.unwrap();
    assert!(matches!(outcome, Outcome::Ignored { .. }));

    assert!(h.github.calls().is_empty());
}

#[tokio::test]
async fn test_jira_rejects_malformed_payload() {
    let h = Harness::new(RecordingGitHub::default());
    let ctx = h.context(config_enabling("acme", JiraChecker::NAME));
    let event = WebhookEvent::new(EventKind::PullRequest, "d", r#"{"action":"opened"}"#);

    assert!(JiraChecker::new().handle(&event, &ctx).await.is_err());
}

#[tokio::test]
async fn test_teams_sync_adds_missing_members() {
    let h = Harness::new(RecordingGitHub::default().with_team("core", &["alice", "dave"]));
    h.remote_with_file("acme", "widget", "TEAMS.yaml", "core: [alice, bob]\n");
    let ctx = h.context(config_enabling("acme", TeamsSync::NAME));

    let outcome = TeamsSync::new()
        .handle(&push_event("main", &["TEAMS.yaml"]), &ctx)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(
        h.github.calls(),
        vec![Call::Add {
            team: "core".into(),
            login: "bob".into()
        }]
    );
}

#[tokio::test]
async fn test_teams_sync_removes_only_when_allowed() {
    let h = Harness::new(RecordingGitHub::default().with_team("core", &["alice", "dave"]));
    h.remote_with_file("acme", "widget", "TEAMS.yaml", "core: [alice]\n");
    let mut config = config_enabling("acme", TeamsSync::NAME);
    config.teams.allow_removal = true;
    let ctx = h.context(config);

    TeamsSync::new()
        .handle(&push_event("main", &["TEAMS.yaml"]), &ctx)
        .await
        .unwrap();

    assert_eq!(
        h.github.calls(),
        vec![Call::Remove {
            team: "core".into(),
            login: "dave".into()
        }]
    );
}

#[tokio::test]
async fn test_teams_sync_ignores_unrelated_pushes() {
    let h = Harness::new(RecordingGitHub::default());
    let ctx = h.context(config_enabling("acme", TeamsSync::NAME));
    let plugin = TeamsSync::new();

    let outcome = plugin.handle(&push_event("feature", &["TEAMS.yaml"]), &ctx).await.unwrap();
    assert!(matches!(outcome, Outcome::Ignored { .. }));

    let outcome = plugin.handle(&push_event("main", &["README.md"]), &ctx).await.unwrap();
    assert!(matches!(outcome, Outcome::Ignored { .. }));

    // Nothing was cloned for either.
    assert_eq!(h.repos.stats().clones, 0);
    assert!(h.github.calls().is_empty());
}

#[tokio::test]
async fn test_teams_sync_reports_unknown_team() {
    let h = Harness::new(RecordingGitHub::default());
    h.remote_with_file("acme", "widget", "TEAMS.yaml", "ghost: [alice]\n");
    let ctx = h.context(config_enabling("acme", TeamsSync::NAME));

    let err = TeamsSync::new()
        .handle(&push_event("main", &["TEAMS.yaml"]), &ctx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ghost"));
}
