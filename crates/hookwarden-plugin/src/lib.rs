//! Webhook plugin contract for Hookwarden.
//!
//! A plugin is registered under one HTTP path. For every authenticated
//! delivery on that path the router calls [`Plugin::handle`] with the parsed
//! [`WebhookEvent`] and a [`PluginContext`] holding the shared clients and
//! the configuration snapshot current when the request arrived.
//!
//! ## Reference plugins
//!
//! - [`jira::JiraChecker`]: commit status on pull requests that mention a ticket key
//! - [`teams::TeamsSync`]: keeps GitHub teams in line with a file in the repository

pub mod context;
pub mod event;
pub mod jira;
pub mod teams;

pub use context::{Clients, PluginContext};
pub use event::{EventKind, PullRequestEvent, PushEvent, Repository, WebhookEvent};

use async_trait::async_trait;
use hookwarden_common_config::HookwardenConfig;
use serde::Serialize;

/// What a plugin did with a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The event was acted on.
    Handled,
    /// The event was not relevant.
    Ignored {
        /// Why, for logs and the response body.
        reason: String,
    },
}

impl Outcome {
    pub fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

/// Help entry shown on `/help`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginHelp {
    /// What the plugin does.
    pub description: String,
    /// Event kinds the plugin reacts to.
    pub events: Vec<String>,
    /// Human readable summary of the plugin's current settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    /// `org` and `org/repo` keys enabling the plugin.
    pub enabled_for: Vec<String>,
}

/// A webhook handler.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable name, used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Help entry for the given configuration.
    fn help(&self, config: &HookwardenConfig) -> PluginHelp;

    /// Handle one authenticated delivery.
    ///
    /// Errors are logged by the router and answered with a generic 500.
    async fn handle(&self, event: &WebhookEvent, ctx: &PluginContext) -> anyhow::Result<Outcome>;
}
