//! Team membership sync.
//!
//! When a push to the default branch changes the teams file, the file is read
//! from the cached checkout and every listed team is brought in line with it.
//! The file maps team slugs to member logins:
//!
//! ```yaml
//! core: [alice, bob]
//! docs:
//!   - carol
//! ```

use crate::{EventKind, Outcome, Plugin, PluginContext, PluginHelp, PushEvent, WebhookEvent};
use anyhow::Context;
use async_trait::async_trait;
use hookwarden_common_config::HookwardenConfig;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Desired team membership, keyed by team slug.
pub type TeamsFile = BTreeMap<String, Vec<String>>;

/// Team membership sync plugin.
#[derive(Debug, Default)]
pub struct TeamsSync;

impl TeamsSync {
    pub const NAME: &'static str = "teams-sync";

    pub fn new() -> Self {
        Self
    }
}

/// Changes needed to bring one team in line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TeamDiff {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

/// Compare current and desired logins; GitHub logins are case-insensitive.
pub fn diff_members(current: &[String], desired: &[String]) -> TeamDiff {
    let current_set: BTreeSet<String> = current.iter().map(|l| l.to_ascii_lowercase()).collect();
    let desired_set: BTreeSet<String> = desired.iter().map(|l| l.to_ascii_lowercase()).collect();

    TeamDiff {
        add: desired_set.difference(&current_set).cloned().collect(),
        remove: current_set.difference(&desired_set).cloned().collect(),
    }
}

pub fn parse_teams_file(contents: &[u8]) -> anyhow::Result<TeamsFile> {
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(TeamsFile::new());
    }
    serde_yaml::from_slice(contents).context("teams file must map team slugs to lists of logins")
}

#[async_trait]
impl Plugin for TeamsSync {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self, config: &HookwardenConfig) -> PluginHelp {
        let removal = if config.teams.allow_removal {
            "members missing from the file are removed"
        } else {
            "members missing from the file are kept"
        };

        PluginHelp {
            description: "Syncs GitHub team membership from a file on the default branch.".to_string(),
            events: vec![EventKind::Push.to_string()],
            config: Some(format!("Reads `{}`; {}.", config.teams.file, removal)),
            enabled_for: config.repos_enabling(Self::NAME).into_iter().map(String::from).collect(),
        }
    }

    async fn handle(&self, event: &WebhookEvent, ctx: &PluginContext) -> anyhow::Result<Outcome> {
        if event.kind != EventKind::Push {
            return Ok(Outcome::ignored(format!("{} events are not synced", event.kind)));
        }

        let push: PushEvent = event.parse().context("invalid push payload")?;
        let owner = &push.repository.owner.login;
        let repo = &push.repository.name;

        if push.deleted {
            return Ok(Outcome::ignored("branch deleted"));
        }
        let default_branch = push.repository.default_branch.as_deref().unwrap_or("main");
        if push.branch() != Some(default_branch) {
            return Ok(Outcome::ignored(format!("{} is not the default branch", push.ref_name)));
        }
        if !ctx.is_enabled(owner, repo, Self::NAME) {
            return Ok(Outcome::ignored(format!("not enabled for {owner}/{repo}")));
        }

        let settings = &ctx.config.teams;
        if !push.touches(&settings.file) {
            return Ok(Outcome::ignored(format!("{} unchanged", settings.file)));
        }

        // Release the checkout before calling the API.
        let contents = {
            let checkout = ctx
                .clients
                .repos
                .checkout(owner, repo)
                .await
                .with_context(|| format!("checking out {owner}/{repo}"))?;
            checkout
                .read_file(&settings.file)
                .await
                .with_context(|| format!("reading {}", settings.file))?
        };

        let Some(contents) = contents else {
            return Ok(Outcome::ignored(format!("{} was removed", settings.file)));
        };
        let teams = parse_teams_file(&contents)?;

        let github = &ctx.clients.github;
        let mut failed = Vec::new();
        for (team, desired) in &teams {
            let current = match github.list_team_members(owner, team).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(org = %owner, team = %team, error = %e, "Cannot list team members");
                    failed.push(team.clone());
                    continue;
                }
            };

            let diff = diff_members(&current, desired);
            for login in &diff.add {
                if let Err(e) = github.add_team_membership(owner, team, login).await {
                    warn!(org = %owner, team = %team, login = %login, error = %e, "Cannot add team member");
                    failed.push(team.clone());
                }
            }
            if settings.allow_removal {
                for login in &diff.remove {
                    if let Err(e) = github.remove_team_membership(owner, team, login).await {
                        warn!(org = %owner, team = %team, login = %login, error = %e, "Cannot remove team member");
                        failed.push(team.clone());
                    }
                }
            }

            info!(
                org = %owner,
                team = %team,
                added = diff.add.len(),
                removed = if settings.allow_removal { diff.remove.len() } else { 0 },
                "Team synced"
            );
        }

        if !failed.is_empty() {
            failed.dedup();
            anyhow::bail!("sync incomplete for teams: {}", failed.join(", "));
        }
        Ok(Outcome::Handled)
    }
}
