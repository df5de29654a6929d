//! Shared repository cache.
//!
//! Each cache owns a private directory created under the configured base
//! (`<base>/hookwarden-XXXXXX`), and nothing outside it is ever removed. One
//! working clone per `owner/repo` lives at `<root>/<owner>/<repo>`. Each
//! entry carries its own async read/write lock: cloning and fetching take it
//! exclusively, a [`RepoCheckout`] holds it shared for as long as the plugin
//! keeps the handle. The map of entries is only locked long enough to look an
//! entry up, so work on different repositories never serializes.

use crate::{CacheError, GitCredential, GitRepository};
use hookwarden_common_log::spans::{repo_span, Timer};
use hookwarden_common_secret::TokenGenerator;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info, warn, Instrument};

const REMOTE_NAME: &str = "origin";

/// Cache construction parameters.
#[derive(Debug, Clone)]
pub struct RepoCacheConfig {
    /// Base directory. Created if missing; the cache makes its own
    /// uniquely named directory inside it.
    pub base: PathBuf,
    /// Base the clone URL is built from: `<remote_base>/<owner>/<repo>.git`.
    pub remote_base: String,
    /// Source of the API token used as the HTTPS password.
    pub credentials: Option<TokenGenerator>,
}

impl RepoCacheConfig {
    /// Cache under `base` cloning from `remote_base`, no credentials.
    pub fn new(base: impl Into<PathBuf>, remote_base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            remote_base: remote_base.into(),
            credentials: None,
        }
    }

    /// Authenticate clone and fetch with the token behind `generator`.
    pub fn with_credentials(mut self, generator: TokenGenerator) -> Self {
        self.credentials = Some(generator);
        self
    }
}

/// Normalized `owner/repo` identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoKey {
    owner: String,
    repo: String,
}

impl RepoKey {
    /// Validate and normalize (GitHub names are case-insensitive).
    pub fn new(owner: &str, repo: &str) -> Result<Self, CacheError> {
        Ok(Self {
            owner: validate_name(owner)?,
            repo: validate_name(repo)?,
        })
    }

    /// Owner (organization or user) login.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `owner/repo`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

fn validate_name(name: &str) -> Result<String, CacheError> {
    let valid = !name.is_empty()
        && name.len() <= 100
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(name.to_ascii_lowercase())
    } else {
        Err(CacheError::InvalidName {
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    /// No usable clone on disk yet.
    Absent,
    /// Clone present and synced at least once.
    Ready,
    /// Evicted after a failure; waiters must look the entry up again.
    Removed,
}

struct Entry {
    dir: PathBuf,
    state: Arc<RwLock<EntryState>>,
}

/// Clone and fetch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Successful first clones.
    pub clones: u64,
    /// Successful refreshes of an existing clone.
    pub fetches: u64,
    /// Entries currently tracked.
    pub entries: usize,
}

/// Shared, per-repository-locked cache of working clones.
pub struct RepoCache {
    root: PathBuf,
    /// Owns `root`; taken by [`RepoCache::clean`]. Dropping it removes the tree.
    dir: Mutex<Option<TempDir>>,
    remote_base: String,
    credentials: Option<TokenGenerator>,
    entries: Mutex<HashMap<RepoKey, Arc<Entry>>>,
    closed: AtomicBool,
    clones: AtomicU64,
    fetches: AtomicU64,
}

impl RepoCache {
    /// Create the cache in a fresh directory under `config.base`.
    ///
    /// Two caches sharing a base never share a root.
    pub fn new(config: RepoCacheConfig) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&config.base)?;
        let dir = tempfile::Builder::new()
            .prefix("hookwarden-")
            .tempdir_in(&config.base)?;
        let root = dir.path().to_path_buf();
        info!(root = %root.display(), remote = %config.remote_base, "Repository cache ready");

        Ok(Self {
            root,
            dir: Mutex::new(Some(dir)),
            remote_base: config.remote_base.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            entries: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            clones: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        })
    }

    /// Directory owned by this cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether [`RepoCache::clean`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            clones: self.clones.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }

    /// URL a repository is cloned from.
    pub fn clone_url(&self, key: &RepoKey) -> String {
        format!("{}/{}/{}.git", self.remote_base, key.owner, key.repo)
    }

    /// Get an up-to-date working clone of `owner/repo`.
    ///
    /// The first caller clones; later callers fetch and hard-reset to the
    /// remote branch. The returned handle blocks refreshes of this repository
    /// until it is dropped; other repositories are unaffected. A failed clone
    /// or fetch evicts the entry so the next caller starts from scratch.
    pub async fn checkout(&self, owner: &str, repo: &str) -> Result<RepoCheckout, CacheError> {
        let key = RepoKey::new(owner, repo)?;
        let span = repo_span(&key.owner, &key.repo);
        self.checkout_key(key).instrument(span).await
    }

    async fn checkout_key(&self, key: RepoKey) -> Result<RepoCheckout, CacheError> {
        loop {
            if self.is_closed() {
                return Err(CacheError::Closed);
            }

            let entry = {
                let mut entries = self.entries.lock();
                Arc::clone(entries.entry(key.clone()).or_insert_with(|| {
                    Arc::new(Entry {
                        dir: self.root.join(&key.owner).join(&key.repo),
                        state: Arc::new(RwLock::new(EntryState::Absent)),
                    })
                }))
            };

            let mut state = Arc::clone(&entry.state).write_owned().await;
            if self.is_closed() {
                return Err(CacheError::Closed);
            }

            let result = match *state {
                EntryState::Removed => continue,
                EntryState::Absent => self.clone_into(&key, &entry.dir).await,
                EntryState::Ready => self.fetch_into(&key, &entry.dir).await,
            };

            if let Err(e) = result {
                *state = EntryState::Removed;
                self.evict(&key, &entry).await;
                warn!(repo = %key, error = %e, "Repository checkout failed, entry evicted");
                return Err(e);
            }

            *state = EntryState::Ready;
            return Ok(RepoCheckout {
                path: entry.dir.clone(),
                key,
                _guard: state.downgrade(),
            });
        }
    }

    async fn clone_into(&self, key: &RepoKey, dir: &Path) -> Result<(), CacheError> {
        let timer = Timer::start("repo_clone");
        let url = self.clone_url(key);
        let dir = dir.to_path_buf();
        let credential = GitCredential::from_generator(self.credentials.as_ref());

        tokio::task::spawn_blocking(move || {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
            if let Some(parent) = dir.parent() {
                std::fs::create_dir_all(parent)?;
            }
            GitRepository::clone_from(&url, &dir, &credential).map_err(|source| CacheError::Clone {
                repo: String::new(),
                source,
            })?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
        .map_err(|e| with_repo(e, key))?;

        self.clones.fetch_add(1, Ordering::Relaxed);
        timer.finish();
        info!(repo = %key, "Repository cloned");
        Ok(())
    }

    async fn fetch_into(&self, key: &RepoKey, dir: &Path) -> Result<(), CacheError> {
        let timer = Timer::start("repo_fetch");
        let dir = dir.to_path_buf();
        let credential = GitCredential::from_generator(self.credentials.as_ref());

        tokio::task::spawn_blocking(move || {
            GitRepository::open(&dir)
                .and_then(|repo| repo.sync_with_remote(REMOTE_NAME, &credential))
                .map_err(|source| CacheError::Fetch {
                    repo: String::new(),
                    source,
                })
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
        .map_err(|e| with_repo(e, key))?;

        self.fetches.fetch_add(1, Ordering::Relaxed);
        timer.finish();
        debug!(repo = %key, "Repository fetched");
        Ok(())
    }

    /// Caller holds the entry's write guard. The directory goes before the map
    /// entry: a newcomer can only create a fresh entry for the same path once
    /// nothing is left to delete.
    async fn evict(&self, key: &RepoKey, entry: &Arc<Entry>) {
        match tokio::fs::remove_dir_all(&entry.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %entry.dir.display(), error = %e, "Failed to remove evicted clone"),
        }

        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            entries.remove(key);
        }
    }

    /// Remove every working clone and the directory this cache created.
    ///
    /// The base directory and anything else in it are left alone. Later
    /// checkouts fail with [`CacheError::Closed`]. Calling this twice is
    /// harmless.
    pub async fn clean(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = {
            let mut entries = self.entries.lock();
            let count = entries.len();
            entries.clear();
            count
        };

        let Some(dir) = self.dir.lock().take() else {
            return Ok(());
        };

        match tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
        {
            Ok(()) => {
                info!(root = %self.root.display(), entries = dropped, "Repository cache cleaned");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for RepoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoCache")
            .field("root", &self.root)
            .field("remote_base", &self.remote_base)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn with_repo(error: CacheError, key: &RepoKey) -> CacheError {
    match error {
        CacheError::Clone { source, .. } => CacheError::Clone {
            repo: key.full_name(),
            source,
        },
        CacheError::Fetch { source, .. } => CacheError::Fetch {
            repo: key.full_name(),
            source,
        },
        other => other,
    }
}

/// A working clone held for reading.
///
/// While any handle for a repository is alive, that repository is not fetched
/// or reset underneath it.
pub struct RepoCheckout {
    key: RepoKey,
    path: PathBuf,
    _guard: OwnedRwLockReadGuard<EntryState>,
}

impl RepoCheckout {
    /// Repository identity.
    pub fn key(&self) -> &RepoKey {
        &self.key
    }

    /// Working tree root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a file relative to the working tree. `Ok(None)` if it does not exist.
    pub async fn read_file(&self, relative: impl AsRef<Path>) -> Result<Option<Vec<u8>>, CacheError> {
        let relative = relative.as_ref();
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(CacheError::InvalidPath {
                path: relative.to_path_buf(),
            });
        }

        match tokio::fs::read(self.path.join(relative)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit id checked out, `None` for an empty repository.
    pub async fn head_commit(&self) -> Result<Option<String>, CacheError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || GitRepository::open(&path).and_then(|repo| repo.head_commit()))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
            .map_err(|source| CacheError::Fetch {
                repo: self.key.full_name(),
                source,
            })
    }
}

impl std::fmt::Debug for RepoCheckout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoCheckout")
            .field("repo", &self.key.full_name())
            .field("path", &self.path)
            .finish()
    }
}
