//! Hot-reloaded configuration snapshots.

use crate::loader::{ConfigError, ConfigLoader};
use crate::types::HookwardenConfig;
use notify::{RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Holds the current configuration snapshot and reloads it from disk.
///
/// The snapshot is an immutable `Arc<HookwardenConfig>` replaced wholesale on
/// every successful reload. A reload that fails to read, parse or validate
/// leaves the previous snapshot in place.
pub struct ConfigAgent {
    loader: ConfigLoader,
    sender: watch::Sender<Arc<HookwardenConfig>>,
    receiver: watch::Receiver<Arc<HookwardenConfig>>,
    reload_lock: Mutex<()>,
}

impl ConfigAgent {
    /// Load the initial snapshot from `path`.
    pub fn start(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new(path);
        let config = loader.load()?;
        info!(path = %loader.path().display(), "Config agent started");
        Ok(Self::with_snapshot(loader, config))
    }

    /// Start from defaults and keep watching `path`.
    ///
    /// Used when the initial load failed and the caller chose a degraded start:
    /// the first valid document written to `path` replaces the defaults.
    pub fn degraded(path: impl AsRef<Path>) -> Self {
        let loader = ConfigLoader::new(path);
        warn!(path = %loader.path().display(), "Config agent starting from defaults");
        Self::with_snapshot(loader, HookwardenConfig::default())
    }

    fn with_snapshot(loader: ConfigLoader, config: HookwardenConfig) -> Self {
        let (sender, receiver) = watch::channel(Arc::new(config));
        Self {
            loader,
            sender,
            receiver,
            reload_lock: Mutex::new(()),
        }
    }

    /// The current snapshot.
    pub fn config(&self) -> Arc<HookwardenConfig> {
        self.receiver.borrow().clone()
    }

    /// Receiver notified on every swap.
    pub fn subscribe(&self) -> watch::Receiver<Arc<HookwardenConfig>> {
        self.receiver.clone()
    }

    /// Path of the watched document.
    pub fn path(&self) -> &Path {
        self.loader.path()
    }

    /// Re-read the document. Returns whether the snapshot changed.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let _guard = self.reload_lock.lock();

        let next = self.loader.load()?;
        if *self.config() == next {
            return Ok(false);
        }

        self.sender.send_replace(Arc::new(next));
        info!(path = %self.loader.path().display(), "Configuration reloaded");
        Ok(true)
    }

    fn reload_logged(&self) {
        match self.reload() {
            Ok(true) => {}
            Ok(false) => debug!("Configuration unchanged"),
            Err(e) => error!(
                path = %self.loader.path().display(),
                error = %e,
                "Rejected configuration reload; keeping previous snapshot"
            ),
        }
    }

    /// Start the background reload task.
    ///
    /// Filesystem events in the document's directory trigger a reload, and
    /// `interval` polls as a fallback for filesystems without notifications.
    pub fn spawn_watch(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            // Capacity 1: a burst of events collapses into one pending reload.
            let (tx, mut rx) = mpsc::channel::<()>(1);

            let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                if res.is_ok() {
                    let _ = tx.try_send(());
                }
            })
            .and_then(|mut watcher| {
                let dir = agent
                    .loader
                    .path()
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf();
                watcher.watch(&dir, RecursiveMode::NonRecursive)?;
                Ok(watcher)
            });

            // Dropping the watcher stops notifications; keep it alive with the task.
            let _watcher = match watcher {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %e, "File watching unavailable; polling only");
                    None
                }
            };

            let mut timer = tokio::time::interval(interval);
            timer.tick().await;

            loop {
                tokio::select! {
                    Some(()) = rx.recv() => {}
                    _ = timer.tick() => {}
                }
                let agent = Arc::clone(&agent);
                if let Err(e) = tokio::task::spawn_blocking(move || agent.reload_logged()).await {
                    error!(error = %e, "Configuration reload task failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_start_fails_on_invalid_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "status_retry:\n  max_attempts: 0\n").unwrap();

        assert!(matches!(
            ConfigAgent::start(&path),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_degraded_start_uses_defaults_until_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let agent = ConfigAgent::degraded(&path);
        assert_eq!(*agent.config(), HookwardenConfig::default());

        fs::write(&path, "plugins:\n  acme: [jira-checker]\n").unwrap();
        assert!(agent.reload().unwrap());
        assert!(agent.config().is_enabled("acme", "any", "jira-checker"));
    }

    #[test]
    fn test_reload_unchanged_returns_false() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "plugins:\n  acme: [jira-checker]\n").unwrap();

        let agent = ConfigAgent::start(&path).unwrap();
        assert!(!agent.reload().unwrap());
    }
}
