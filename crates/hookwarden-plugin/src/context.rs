//! Per-request plugin context.

use hookwarden_common_config::HookwardenConfig;
use hookwarden_git::RepoCache;
use hookwarden_github::GitHubApi;
use std::sync::Arc;

/// Shared clients handed to every plugin invocation.
#[derive(Clone)]
pub struct Clients {
    /// GitHub API. Honors dry-run; commit status writes are retried.
    pub github: Arc<dyn GitHubApi>,
    /// Process-wide repository cache.
    pub repos: Arc<RepoCache>,
}

impl std::fmt::Debug for Clients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clients").field("repos", &self.repos).finish_non_exhaustive()
    }
}

/// Everything a plugin sees besides the event.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub clients: Clients,
    /// Configuration snapshot taken when the request arrived.
    pub config: Arc<HookwardenConfig>,
}

impl PluginContext {
    pub fn new(clients: Clients, config: Arc<HookwardenConfig>) -> Self {
        Self { clients, config }
    }

    /// Whether `plugin` is enabled for `owner/repo` in this snapshot.
    pub fn is_enabled(&self, owner: &str, repo: &str, plugin: &str) -> bool {
        self.config.is_enabled(owner, repo, plugin)
    }
}
