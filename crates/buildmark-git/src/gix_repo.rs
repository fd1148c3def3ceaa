//! The gix-backed implementation of [`GitRepo`].

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{GitOid, IndexEntry, StatusEntry, TreeEntry};

/// A [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// Construct via [`GixRepo::discover`] (upward search from a project
/// directory).
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
    pub(crate) workdir: Option<PathBuf>,
}

impl std::fmt::Debug for GixRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GixRepo")
            .field("git_dir", &self.repo.git_dir())
            .field("workdir", &self.workdir)
            .finish()
    }
}

impl GixRepo {
    /// Find the repository enclosing `path`, searching upward through its
    /// parents.
    ///
    /// # Errors
    /// Returns [`GitError::NoRepository`] if no repository encloses `path`.
    pub fn discover(path: &Path) -> Result<Self, GitError> {
        let repo = gix::discover(path).map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "git discovery failed");
            GitError::NoRepository {
                path: path.to_path_buf(),
            }
        })?;
        Ok(Self::from_repo(repo))
    }

    fn from_repo(repo: gix::Repository) -> Self {
        let workdir = repo.workdir().map(Path::to_path_buf);
        Self { repo, workdir }
    }
}

impl GitRepo for GixRepo {
    fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    fn rev_parse_opt(&self, spec: &str) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::rev_parse_opt(self, spec)
    }

    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
        crate::objects_impl::read_tree(self, oid)
    }

    fn hash_worktree_file(&self, path: &str) -> Result<Option<GitOid>, GitError> {
        let Some(workdir) = self.workdir.as_deref() else {
            return Err(GitError::NoWorktree {
                path: self.repo.git_dir().to_path_buf(),
            });
        };
        crate::objects_impl::hash_worktree_file(self, &workdir.join(path))
    }

    fn read_index(&self) -> Result<Vec<IndexEntry>, GitError> {
        crate::index_impl::read_index(self)
    }

    fn status(&self) -> Result<Vec<StatusEntry>, GitError> {
        if self.workdir.is_none() {
            return Err(GitError::NoWorktree {
                path: self.repo.git_dir().to_path_buf(),
            });
        }
        crate::status_impl::status(self)
    }
}
