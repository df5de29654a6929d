//! Client construction from startup options and live secrets.

use hookwarden_common_secret::{SecretAgent, SecretError, TokenGenerator};
use hookwarden_common_config::ConfigError;
use hookwarden_git::{CacheError, RepoCache, RepoCacheConfig};
use hookwarden_github::{Backoff, GitHubApi, GitHubClient, GitHubConfig, GitHubError, RetryingClient};
use hookwarden_plugin::Clients;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that end the process before it starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no API token at {path} and dry-run is off")]
    MissingToken { path: PathBuf },

    #[error("secrets unavailable: {0}")]
    Secrets(#[from] SecretError),

    #[error("configuration unavailable: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot build GitHub client: {0}")]
    GitHub(#[from] GitHubError),

    #[error("cannot prepare repository cache: {0}")]
    Cache(#[from] CacheError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Options the clients are built from. Resolved once at startup.
#[derive(Debug, Clone)]
pub struct GitHubOptions {
    /// API base URL.
    pub endpoint: String,
    /// File holding the API token.
    pub token_path: PathBuf,
    /// Log mutations instead of performing them.
    pub dry_run: bool,
    /// Base URL repositories are cloned from.
    pub git_remote: String,
    /// Base directory the repository cache creates its own directory in.
    pub cache_dir: PathBuf,
}

/// Builds the API client and the repository cache once per process.
///
/// Both are shared by every request; the token is read through a
/// [`TokenGenerator`] on each call, so rotating the token file needs no
/// rebuild.
pub struct ClientFactory {
    options: GitHubOptions,
    github: Arc<dyn GitHubApi>,
    repos: Arc<RepoCache>,
}

impl ClientFactory {
    /// Build the clients.
    ///
    /// Without a token outside dry-run this fails with
    /// [`StartupError::MissingToken`]; in dry-run the client goes out
    /// anonymously.
    pub fn new(secrets: &SecretAgent, options: GitHubOptions, backoff: Backoff) -> Result<Self, StartupError> {
        let token = token_generator(secrets, &options)?;

        let config = GitHubConfig {
            endpoint: options.endpoint.clone(),
            dry_run: options.dry_run,
            ..Default::default()
        };
        let client = GitHubClient::new(config, token.clone())?;
        let github: Arc<dyn GitHubApi> = Arc::new(RetryingClient::new(client, backoff));

        let mut cache_config = RepoCacheConfig::new(&options.cache_dir, options.git_remote.clone());
        if let Some(token) = token {
            cache_config = cache_config.with_credentials(token);
        }
        let repos = Arc::new(RepoCache::new(cache_config)?);

        info!(
            endpoint = %options.endpoint,
            dry_run = options.dry_run,
            cache_dir = %options.cache_dir.display(),
            "Clients ready"
        );

        Ok(Self {
            options,
            github,
            repos,
        })
    }

    /// The shared API client.
    pub fn github_client(&self) -> Arc<dyn GitHubApi> {
        Arc::clone(&self.github)
    }

    /// The process-wide repository cache.
    pub fn repo_cache(&self) -> Arc<RepoCache> {
        Arc::clone(&self.repos)
    }

    /// Both clients, as handed to plugins.
    pub fn clients(&self) -> Clients {
        Clients {
            github: self.github_client(),
            repos: self.repo_cache(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    pub fn options(&self) -> &GitHubOptions {
        &self.options
    }
}

fn token_generator(secrets: &SecretAgent, options: &GitHubOptions) -> Result<Option<TokenGenerator>, StartupError> {
    if secrets.get_secret(&options.token_path).is_some() {
        return Ok(Some(secrets.token_generator(&options.token_path)));
    }

    if options.dry_run {
        warn!(
            path = %options.token_path.display(),
            "No API token loaded; dry-run client will make anonymous reads"
        );
        Ok(None)
    } else {
        Err(StartupError::MissingToken {
            path: options.token_path.clone(),
        })
    }
}
