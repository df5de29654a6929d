//! Configuration for Hookwarden.
//!
//! The plugin configuration document is a YAML file (usually mounted from a
//! ConfigMap) that says which plugins are enabled for which organisations and
//! repositories, plus per-plugin settings. [`ConfigAgent`] keeps the current
//! parsed document and swaps it wholesale whenever the file changes.

pub mod agent;
pub mod loader;
pub mod types;

pub use agent::ConfigAgent;
pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_sensible_values() {
        let config = HookwardenConfig::default();

        assert!(config.plugins.is_empty());
        assert_eq!(config.jira.ticket_pattern, "[A-Z][A-Z0-9]+-[0-9]+");
        assert_eq!(config.jira.status_context, "jira-checker");
        assert!(config.jira.skip_labels.is_empty());
        assert_eq!(config.teams.file, "TEAMS.yaml");
        assert!(!config.teams.allow_removal);
        assert_eq!(config.status_retry.max_attempts, 5);
        assert_eq!(config.status_retry.initial_backoff_ms, 200);
        assert_eq!(config.status_retry.max_backoff_ms, 5000);
    }

    #[test]
    fn test_partial_configs_merge_with_defaults() {
        let partial_yaml = r#"
plugins:
  acme: [jira-checker]
jira:
  skip_labels: [no-ticket]
"#;

        let config: HookwardenConfig = serde_yaml::from_str(partial_yaml).unwrap();

        assert_eq!(config.plugins["acme"], vec!["jira-checker".to_string()]);
        assert_eq!(config.jira.skip_labels, vec!["no-ticket".to_string()]);
        assert_eq!(config.jira.status_context, "jira-checker");
        assert_eq!(config.teams.file, "TEAMS.yaml");
        assert_eq!(config.status_retry.max_attempts, 5);
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let config = HookwardenConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();

        assert!(yaml.contains("plugins:"));
        assert!(yaml.contains("jira:"));
        assert!(yaml.contains("teams:"));
        assert!(yaml.contains("status_retry:"));
        assert!(yaml.contains("file: TEAMS.yaml"));
    }
}
