//! Ticket key checker for pull requests.
//!
//! Reports a commit status on the pull request head: `success` when the
//! title or the head branch contains a ticket key, `failure` otherwise.

use crate::{EventKind, Outcome, Plugin, PluginContext, PluginHelp, PullRequestEvent, WebhookEvent};
use anyhow::Context;
use async_trait::async_trait;
use hookwarden_common_config::HookwardenConfig;
use hookwarden_github::{NewStatus, PullRequest, StatusState};
use regex::Regex;
use tracing::info;

const CHECKED_ACTIONS: &[&str] = &["opened", "edited", "reopened", "synchronize"];

/// Pull request ticket checker.
#[derive(Debug, Default)]
pub struct JiraChecker;

impl JiraChecker {
    pub const NAME: &'static str = "jira-checker";

    pub fn new() -> Self {
        Self
    }
}

/// Where a ticket key was found.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Skipped { label: String },
    Found { key: String },
    Missing,
}

fn evaluate(pr: &PullRequest, pattern: &Regex, skip_labels: &[String]) -> Verdict {
    if let Some(label) = skip_labels.iter().find(|l| pr.has_label(l)) {
        return Verdict::Skipped { label: label.clone() };
    }

    [pr.title.as_str(), pr.head.ref_name.as_str()]
        .into_iter()
        .find_map(|text| pattern.find(text))
        .map(|m| Verdict::Found {
            key: m.as_str().to_string(),
        })
        .unwrap_or(Verdict::Missing)
}

#[async_trait]
impl Plugin for JiraChecker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self, config: &HookwardenConfig) -> PluginHelp {
        let mut config_summary = format!(
            "Ticket keys match `{}`; status context `{}`.",
            config.jira.ticket_pattern, config.jira.status_context
        );
        if !config.jira.skip_labels.is_empty() {
            config_summary.push_str(&format!(" Skipped with labels: {}.", config.jira.skip_labels.join(", ")));
        }

        PluginHelp {
            description: "Requires a ticket key in the pull request title or head branch.".to_string(),
            events: vec![EventKind::PullRequest.to_string()],
            config: Some(config_summary),
            enabled_for: config.repos_enabling(Self::NAME).into_iter().map(String::from).collect(),
        }
    }

    async fn handle(&self, event: &WebhookEvent, ctx: &PluginContext) -> anyhow::Result<Outcome> {
        if event.kind != EventKind::PullRequest {
            return Ok(Outcome::ignored(format!("{} events are not checked", event.kind)));
        }

        let payload: PullRequestEvent = event.parse().context("invalid pull_request payload")?;
        if !CHECKED_ACTIONS.contains(&payload.action.as_str()) {
            return Ok(Outcome::ignored(format!("action {} is not checked", payload.action)));
        }

        let owner = &payload.repository.owner.login;
        let repo = &payload.repository.name;
        if !ctx.is_enabled(owner, repo, Self::NAME) {
            return Ok(Outcome::ignored(format!("not enabled for {owner}/{repo}")));
        }

        let settings = &ctx.config.jira;
        let pattern = Regex::new(&settings.ticket_pattern)
            .with_context(|| format!("invalid ticket pattern {}", settings.ticket_pattern))?;

        let pr = &payload.pull_request;
        let verdict = evaluate(pr, &pattern, &settings.skip_labels);
        let (state, description) = match &verdict {
            Verdict::Skipped { label } => (StatusState::Success, format!("Ticket check skipped ({label})")),
            Verdict::Found { key } => (StatusState::Success, format!("References {key}")),
            Verdict::Missing => (
                StatusState::Failure,
                "Add a ticket key to the title or branch name".to_string(),
            ),
        };

        let status = NewStatus::new(state, settings.status_context.clone()).with_description(description);
        ctx.clients
            .github
            .create_status(owner, repo, &pr.head.sha, &status)
            .await
            .with_context(|| format!("setting status on {owner}/{repo}@{}", pr.head.sha))?;

        info!(
            repo = %payload.repository.full_name(),
            number = payload.number,
            state = ?state,
            "Ticket status reported"
        );
        Ok(Outcome::Handled)
    }
}
