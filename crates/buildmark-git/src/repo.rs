//! The [`GitRepo`] trait: the abstraction boundary between buildmark and git.
//!
//! Buildmark only ever reads from git. The methods here are the minimum the
//! change detector and the commit resolver need:
//!
//! | Group       | Methods                           |
//! |-------------|-----------------------------------|
//! | Layout      | `workdir`                         |
//! | Rev-parse   | `rev_parse_opt`                   |
//! | Object read | `read_tree`, `hash_worktree_file` |
//! | Index       | `read_index`                      |
//! | Status      | `status`                          |

use std::path::Path;

use crate::error::GitError;
use crate::types::{GitOid, IndexEntry, StatusEntry, TreeEntry};

/// Read-only git access used by buildmark.
///
/// Implementations may be backed by gix ([`GixRepo`](crate::GixRepo)) or a
/// test double.
///
/// # Object safety
///
/// This trait is object-safe: callers may use `&dyn GitRepo`.
pub trait GitRepo {
    /// The root of the working tree, or `None` for a bare repository.
    fn workdir(&self) -> Option<&Path>;

    /// Resolve a revision specification to an OID, returning `None` when it
    /// cannot be resolved (missing ref, unborn `HEAD`, malformed spec).
    ///
    /// Replaces: `git rev-parse --verify -q <spec>`.
    fn rev_parse_opt(&self, spec: &str) -> Result<Option<GitOid>, GitError>;

    /// Read the entries of a tree object (one level deep, not recursive).
    ///
    /// Replaces: `git ls-tree <oid>`.
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Hash the working-tree file at `path` (slash-separated, relative to
    /// the repository root) as a blob, without writing it to the object
    /// database. Returns `None` if no file exists there.
    ///
    /// Content filters (`autocrlf`, `filter=`) are not applied.
    ///
    /// Replaces: `git hash-object --no-filters <path>`.
    fn hash_worktree_file(&self, path: &str) -> Result<Option<GitOid>, GitError>;

    /// Read the current index entries. A repository without an index file
    /// yields an empty list.
    ///
    /// Replaces: `git ls-files --stage`.
    fn read_index(&self) -> Result<Vec<IndexEntry>, GitError>;

    /// Return the index-vs-worktree differences, including untracked files.
    ///
    /// Replaces: `git status --porcelain` (worktree column).
    fn status(&self) -> Result<Vec<StatusEntry>, GitError>;
}
