//! Process options.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Hookwarden webhook server.
#[derive(Debug, Clone, Parser)]
#[command(name = "hookwarden", version, about)]
pub struct Options {
    /// Port to listen on.
    #[arg(long, env = "HOOKWARDEN_PORT", default_value_t = 8888)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "HOOKWARDEN_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Path to the plugin configuration document.
    #[arg(long, env = "HOOKWARDEN_CONFIG_PATH", default_value = "/etc/config/config.yaml")]
    pub config_path: PathBuf,

    /// Log GitHub mutations instead of performing them.
    #[arg(long, env = "HOOKWARDEN_DRY_RUN")]
    pub dry_run: bool,

    /// File holding the webhook HMAC secret.
    #[arg(long, env = "HOOKWARDEN_HMAC_SECRET_FILE", default_value = "/etc/webhook/hmac")]
    pub hmac_secret_file: PathBuf,

    /// File holding the GitHub API token.
    #[arg(long, env = "HOOKWARDEN_GITHUB_TOKEN_PATH", default_value = "/etc/github/oauth")]
    pub github_token_path: PathBuf,

    /// GitHub API base URL.
    #[arg(long, env = "HOOKWARDEN_GITHUB_ENDPOINT", default_value = "https://api.github.com")]
    pub github_endpoint: String,

    /// Base URL repositories are cloned from.
    #[arg(long, env = "HOOKWARDEN_GIT_REMOTE", default_value = "https://github.com")]
    pub git_remote: String,

    /// Base directory for the repository cache. Each process clones into its
    /// own subdirectory. Defaults to the system temp dir.
    #[arg(long, env = "HOOKWARDEN_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Time in-flight requests get to finish after a shutdown signal (e.g. 5s, 500ms, 1m).
    #[arg(long, env = "HOOKWARDEN_GRACE_PERIOD", default_value = "5s", value_parser = parse_duration)]
    pub grace_period: Duration,

    /// Seconds between secret file refreshes.
    #[arg(long, env = "HOOKWARDEN_SECRET_REFRESH_SECS", default_value_t = 60)]
    pub secret_refresh_secs: u64,

    /// Seconds between configuration polls (file events also trigger a reload).
    #[arg(long, env = "HOOKWARDEN_CONFIG_REFRESH_SECS", default_value_t = 30)]
    pub config_refresh_secs: u64,
}

impl Options {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn secret_refresh(&self) -> Duration {
        Duration::from_secs(self.secret_refresh_secs.max(1))
    }

    pub fn config_refresh(&self) -> Duration {
        Duration::from_secs(self.config_refresh_secs.max(1))
    }
}

/// Parse `500ms`, `5s`, `2m` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration {s:?}"))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        other => Err(format!("unknown duration unit {other:?} (use ms, s or m)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::parse_from(["hookwarden"]);
        assert_eq!(options.port, 8888);
        assert_eq!(options.config_path, PathBuf::from("/etc/config/config.yaml"));
        assert_eq!(options.hmac_secret_file, PathBuf::from("/etc/webhook/hmac"));
        assert_eq!(options.github_token_path, PathBuf::from("/etc/github/oauth"));
        assert_eq!(options.github_endpoint, "https://api.github.com");
        assert_eq!(options.grace_period, Duration::from_secs(5));
        assert!(!options.dry_run);
        assert_eq!(options.cache_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_flags() {
        let options = Options::parse_from([
            "hookwarden",
            "--port",
            "9000",
            "--dry-run",
            "--grace-period",
            "250ms",
            "--cache-dir",
            "/var/cache/hookwarden",
        ]);
        assert_eq!(options.port, 9000);
        assert!(options.dry_run);
        assert_eq!(options.grace_period, Duration::from_millis(250));
        assert_eq!(options.cache_dir(), PathBuf::from("/var/cache/hookwarden"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("5h").is_err());
    }
}
