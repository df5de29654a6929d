//! Hookwarden Server Binary

use anyhow::{Context, Result};
use clap::Parser;
use hookwarden_common_config::ConfigAgent;
use hookwarden_common_log::LogConfig;
use hookwarden_common_secret::SecretAgent;
use hookwarden_github::Backoff;
use hookwarden_plugin::{jira::JiraChecker, teams::TeamsSync};
use hookwarden_server::shutdown::install_signal_handlers;
use hookwarden_server::{
    ClientFactory, GitHubOptions, Lifecycle, Options, PluginRouter, RouterState, ShutdownCoordinator, StartupError,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let options = Options::parse();

    hookwarden_common_log::init(LogConfig::from_env()).context("failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        dry_run = options.dry_run,
        "Starting Hookwarden"
    );

    // Secrets: the HMAC secret is required; the token only outside dry-run.
    let mut secret_paths = vec![options.hmac_secret_file.clone()];
    if !options.dry_run || options.github_token_path.exists() {
        secret_paths.push(options.github_token_path.clone());
    }
    let secrets = Arc::new(SecretAgent::start(secret_paths).map_err(StartupError::from)?);

    // Configuration: a broken document degrades to defaults and keeps being watched.
    let config = match ConfigAgent::start(&options.config_path) {
        Ok(agent) => agent,
        Err(e) => {
            warn!(
                path = %options.config_path.display(),
                error = %e,
                "Configuration unavailable, starting from defaults"
            );
            ConfigAgent::degraded(&options.config_path)
        }
    };
    let config = Arc::new(config);

    let backoff = Backoff::from(&config.config().status_retry);
    let factory = ClientFactory::new(
        &secrets,
        GitHubOptions {
            endpoint: options.github_endpoint.clone(),
            token_path: options.github_token_path.clone(),
            dry_run: options.dry_run,
            git_remote: options.git_remote.clone(),
            cache_dir: options.cache_dir(),
        },
        backoff,
    )?;

    let coordinator = ShutdownCoordinator::new(options.grace_period);
    let state = RouterState {
        hmac: secrets.token_generator(&options.hmac_secret_file),
        config: Arc::clone(&config),
        clients: factory.clients(),
        shutdown: coordinator.clone(),
    };

    let router = PluginRouter::new(state)
        .register("/jira-checker", JiraChecker::new())
        .register("/teams-sync", TeamsSync::new())
        .build()?;

    let addr = SocketAddr::new(options.bind, options.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    let lifecycle = Lifecycle::new(coordinator.clone(), factory.repo_cache())
        .with_background(secrets.spawn_refresh(options.secret_refresh()))
        .with_background(config.spawn_watch(options.config_refresh()))
        .with_background(install_signal_handlers(coordinator));

    let report = lifecycle.run(listener, router).await?;
    info!(drained = report.drained, cleaned = report.cleaned, "Server shutdown complete");
    Ok(())
}
