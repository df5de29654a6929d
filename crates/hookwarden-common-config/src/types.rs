//! Configuration document types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root of the plugin configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookwardenConfig {
    /// Enabled plugins keyed by `org` or `org/repo`.
    pub plugins: BTreeMap<String, Vec<String>>,
    /// Ticket checker settings.
    pub jira: JiraConfig,
    /// Team membership sync settings.
    pub teams: TeamsConfig,
    /// Retry policy for commit status updates.
    pub status_retry: StatusRetryConfig,
}

impl HookwardenConfig {
    /// Plugins enabled for a repository: the org entry plus the repo entry.
    pub fn enabled_plugins(&self, org: &str, repo: &str) -> Vec<&str> {
        let full_name = format!("{}/{}", org, repo);
        let mut enabled: Vec<&str> = self
            .plugins
            .iter()
            .filter(|(key, _)| {
                key.eq_ignore_ascii_case(org) || key.eq_ignore_ascii_case(&full_name)
            })
            .flat_map(|(_, names)| names.iter().map(String::as_str))
            .collect();
        enabled.sort_unstable();
        enabled.dedup();
        enabled
    }

    /// Whether `plugin` is enabled for `org/repo`.
    pub fn is_enabled(&self, org: &str, repo: &str, plugin: &str) -> bool {
        self.enabled_plugins(org, repo).contains(&plugin)
    }

    /// Every `org` / `org/repo` key that enables `plugin`.
    pub fn repos_enabling(&self, plugin: &str) -> Vec<&str> {
        self.plugins
            .iter()
            .filter(|(_, names)| names.iter().any(|n| n == plugin))
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Settings for the pull request ticket checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Regular expression a ticket key must match.
    pub ticket_pattern: String,
    /// Commit status context the checker reports under.
    pub status_context: String,
    /// Pull requests carrying any of these labels pass without a ticket.
    pub skip_labels: Vec<String>,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            ticket_pattern: "[A-Z][A-Z0-9]+-[0-9]+".to_string(),
            status_context: "jira-checker".to_string(),
            skip_labels: Vec::new(),
        }
    }
}

/// Settings for team membership sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    /// Repository file describing the desired teams.
    pub file: String,
    /// Remove members that are not listed in the file.
    pub allow_removal: bool,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            file: "TEAMS.yaml".to_string(),
            allow_removal: false,
        }
    }
}

/// Bounded exponential backoff for status updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay.
    pub max_backoff_ms: u64,
}

impl StatusRetryConfig {
    /// Delay before the first retry.
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Cap on a single delay.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for StatusRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
        }
    }
}
