//! Configuration file loading and parsing.

use crate::types::HookwardenConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Reads and validates the configuration document at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The file this loader reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, expand, parse and validate the file.
    pub fn load(&self) -> Result<HookwardenConfig, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound {
                path: self.path.clone(),
            });
        }

        let contents = std::fs::read_to_string(&self.path)?;
        parse(&contents)
    }
}

/// Parse and validate a configuration document.
pub fn parse(contents: &str) -> Result<HookwardenConfig, ConfigError> {
    let expanded = expand_env_vars(contents)?;

    // An empty document is a valid, all-defaults config.
    if expanded.trim().is_empty() {
        return Ok(HookwardenConfig::default());
    }

    let config: HookwardenConfig =
        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

    validate(&config)?;
    Ok(config)
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
    })
}

/// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();

    for cap in env_var_pattern().captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result = result.replace(full_match, &value);
    }

    Ok(result)
}

fn is_valid_plugin_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Validate configuration values.
pub fn validate(config: &HookwardenConfig) -> Result<(), ConfigError> {
    for (key, names) in &config.plugins {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() > 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::ValidationError {
                message: format!("plugins key '{}' must be 'org' or 'org/repo'", key),
            });
        }
        if let Some(bad) = names.iter().find(|n| !is_valid_plugin_name(n)) {
            return Err(ConfigError::ValidationError {
                message: format!("plugins.{}: invalid plugin name '{}'", key, bad),
            });
        }
    }

    if let Err(e) = Regex::new(&config.jira.ticket_pattern) {
        return Err(ConfigError::ValidationError {
            message: format!("jira.ticket_pattern does not compile: {}", e),
        });
    }

    if config.jira.status_context.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            message: "jira.status_context must not be empty".to_string(),
        });
    }

    if config.teams.file.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            message: "teams.file must not be empty".to_string(),
        });
    }

    if config.status_retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError {
            message: "status_retry.max_attempts must be greater than 0".to_string(),
        });
    }

    if config.status_retry.initial_backoff_ms > config.status_retry.max_backoff_ms {
        return Err(ConfigError::ValidationError {
            message: "status_retry.initial_backoff_ms must not exceed max_backoff_ms".to_string(),
        });
    }

    Ok(())
}
