//! Hot-refreshed secret files.

use crate::{signature, Secret, SecretError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Every loaded secret, keyed by the file it came from.
pub type SecretSnapshot = HashMap<PathBuf, Secret<Vec<u8>>>;

/// Loads secret files and keeps them current.
///
/// Readers go through a `watch` channel holding an `Arc` of the whole map, so
/// a reader sees either the previous snapshot or the next one, never a mix.
pub struct SecretAgent {
    paths: Vec<PathBuf>,
    sender: watch::Sender<Arc<SecretSnapshot>>,
    receiver: watch::Receiver<Arc<SecretSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl SecretAgent {
    /// Load every path. Fails on the first unreadable or empty file; the
    /// caller decides whether that is fatal.
    pub fn start<I, P>(paths: I) -> Result<Self, SecretError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();

        let mut snapshot = SecretSnapshot::with_capacity(paths.len());
        for path in &paths {
            snapshot.insert(path.clone(), load_secret(path)?);
        }

        info!(count = paths.len(), "Secret agent started");
        let (sender, receiver) = watch::channel(Arc::new(snapshot));

        Ok(Self {
            paths,
            sender,
            receiver,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Paths managed by this agent.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Current value of one secret.
    pub fn get_secret(&self, path: impl AsRef<Path>) -> Option<Secret<Vec<u8>>> {
        self.receiver.borrow().get(path.as_ref()).cloned()
    }

    /// The whole current snapshot.
    pub fn snapshot(&self) -> Arc<SecretSnapshot> {
        self.receiver.borrow().clone()
    }

    /// A generator bound to `path` that reads the live value on every call.
    pub fn token_generator(&self, path: impl Into<PathBuf>) -> TokenGenerator {
        TokenGenerator {
            path: path.into(),
            receiver: self.receiver.clone(),
        }
    }

    /// Re-read every file once. Returns whether anything changed.
    ///
    /// A file that cannot be read keeps its previous value.
    pub fn refresh(&self) -> bool {
        let _guard = self.refresh_lock.lock();

        let current = self.snapshot();
        let mut next = (*current).clone();
        let mut changed = false;

        for path in &self.paths {
            match load_secret(path) {
                Ok(value) => {
                    if next.get(path) != Some(&value) {
                        debug!(path = %path.display(), "Secret changed");
                        next.insert(path.clone(), value);
                        changed = true;
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Keeping previous secret value");
                }
            }
        }

        if changed {
            self.sender.send_replace(Arc::new(next));
            info!("Secrets reloaded");
        }

        changed
    }

    /// Start the background refresh task.
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            // The first tick completes immediately; the files were just read.
            timer.tick().await;
            loop {
                timer.tick().await;
                let agent = Arc::clone(&agent);
                if let Err(e) = tokio::task::spawn_blocking(move || agent.refresh()).await {
                    warn!(error = %e, "Secret refresh task failed");
                }
            }
        })
    }
}

/// Signs and verifies with the secret that is current at call time.
#[derive(Clone)]
pub struct TokenGenerator {
    path: PathBuf,
    receiver: watch::Receiver<Arc<SecretSnapshot>>,
}

impl TokenGenerator {
    /// A generator over a fixed value that never rotates.
    pub fn fixed(path: impl Into<PathBuf>, value: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        let mut snapshot = SecretSnapshot::new();
        snapshot.insert(path.clone(), Secret::new(value.into()));
        // The sender is dropped; the receiver keeps the last value.
        let (_, receiver) = watch::channel(Arc::new(snapshot));
        Self { path, receiver }
    }

    /// The secret file this generator reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current secret bytes.
    pub fn token(&self) -> Option<Secret<Vec<u8>>> {
        self.receiver.borrow().get(&self.path).cloned()
    }

    /// Signature header value for `body`, if a secret is loaded.
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        self.token()
            .filter(|token| !token.is_empty())
            .map(|token| signature::sign(token.expose(), body))
    }

    /// Check a signature header against `body` using the live secret.
    pub fn verify(&self, body: &[u8], signature_header: &str) -> bool {
        match self.token() {
            Some(token) if !token.is_empty() => {
                signature::verify(token.expose(), body, signature_header)
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn load_secret(path: &Path) -> Result<Secret<Vec<u8>>, SecretError> {
    let raw = std::fs::read(path).map_err(|source| SecretError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Err(SecretError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(Secret::new(trimmed.to_vec()))
}
