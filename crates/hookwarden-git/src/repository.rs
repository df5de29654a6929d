//! Working clone wrapper.

use crate::{GitCredential, GitError, GitResult};
use git2::build::RepoBuilder;
use git2::{ErrorCode, Repository as Git2Repo, ResetType};
use std::path::Path;
use tracing::debug;

/// A working clone on local disk.
///
/// `git2::Repository` is `Send` but not `Sync`, so a `GitRepository` is meant
/// to be opened, used and dropped inside one blocking task.
pub struct GitRepository {
    inner: Git2Repo,
}

impl GitRepository {
    /// Open a repository at the given path.
    pub fn open(path: impl AsRef<Path>) -> GitResult<Self> {
        let path = path.as_ref();
        let inner = Git2Repo::open(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                GitError::RepoNotFound {
                    path: path.display().to_string(),
                }
            } else {
                GitError::Git2(e)
            }
        })?;

        Ok(Self { inner })
    }

    /// Clone `url` into `path`.
    pub fn clone_from(url: &str, path: impl AsRef<Path>, credential: &GitCredential) -> GitResult<Self> {
        let path = path.as_ref();
        debug!(url = %redact_url(url), path = %path.display(), "Cloning repository");

        let inner = RepoBuilder::new()
            .fetch_options(credential.fetch_options())
            .clone(url, path)
            .map_err(classify)?;

        Ok(Self { inner })
    }

    /// Name of the checked-out branch; `None` when detached or unborn.
    pub fn current_branch(&self) -> GitResult<Option<String>> {
        match self.inner.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(String::from)),
            Ok(_) => Ok(None),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit id of `HEAD`, `None` for an empty repository.
    pub fn head_commit(&self) -> GitResult<Option<String>> {
        match self.inner.head() {
            Ok(head) => Ok(head.target().map(|oid| oid.to_string())),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch `remote` and move the current branch and working tree to the
    /// remote-tracking commit.
    pub fn sync_with_remote(&self, remote_name: &str, credential: &GitCredential) -> GitResult<()> {
        let mut remote = self
            .inner
            .find_remote(remote_name)
            .map_err(|_| GitError::RemoteNotFound {
                name: remote_name.to_string(),
            })?;

        let mut options = credential.fetch_options();
        remote
            .fetch(&[] as &[&str], Some(&mut options), None)
            .map_err(classify)?;

        let Some(branch) = self.current_branch()? else {
            // Detached or still empty: nothing to fast-forward.
            return Ok(());
        };

        let tracking = format!("refs/remotes/{}/{}", remote_name, branch);
        let oid = self
            .inner
            .refname_to_id(&tracking)
            .map_err(|_| GitError::RefNotFound {
                name: tracking.clone(),
            })?;
        let target = self.inner.find_object(oid, None)?;
        self.inner.reset(&target, ResetType::Hard, None)?;

        debug!(branch = %branch, commit = %oid, "Working tree synced with remote");
        Ok(())
    }
}

fn classify(e: git2::Error) -> GitError {
    if e.code() == ErrorCode::Auth {
        GitError::AuthFailed {
            reason: e.message().to_string(),
        }
    } else {
        GitError::Git2(e)
    }
}

/// Strip userinfo from a URL before it reaches the logs.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.find('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
