//! The per-path status matrix.
//!
//! Combines three views of the repository into one row per path:
//!
//! - the HEAD tree, flattened recursively,
//! - the index entries,
//! - the index-vs-worktree differences from [`GitRepo::status`].
//!
//! A worktree file with no status entry is taken to match its index entry.
//! When the index differs from HEAD and the worktree differs from the index,
//! the worktree file is hashed: a change that was staged and then reverted
//! on disk reports `Unmodified`.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{
    EntryMode, FileStatus, GitOid, HeadState, StageState, StatusRow, WorkdirState,
};

/// Build the status matrix for every path known to HEAD, the index, or the
/// working tree. Rows are sorted by path.
///
/// An unborn `HEAD` is treated as an empty tree.
///
/// # Errors
/// Propagates any [`GitError`] from the underlying reads.
pub fn status_matrix(repo: &dyn GitRepo) -> Result<Vec<StatusRow>, GitError> {
    let head = head_entries(repo)?;
    let index: BTreeMap<String, GitOid> = repo
        .read_index()?
        .into_iter()
        .map(|e| (e.path, e.oid))
        .collect();
    let worktree: BTreeMap<String, FileStatus> = repo
        .status()?
        .into_iter()
        .map(|e| (e.path, e.status))
        .collect();

    let paths: BTreeSet<&String> = head.keys().chain(index.keys()).chain(worktree.keys()).collect();

    let mut rows = Vec::with_capacity(paths.len());
    for path in paths {
        let head_oid = head.get(path);
        let index_oid = index.get(path);
        let wt = worktree.get(path).copied();

        let workdir = match wt {
            Some(FileStatus::Deleted) => WorkdirState::Absent,
            Some(_) => match head_oid {
                Some(h) if index_oid != Some(h) && repo.hash_worktree_file(path)? == Some(*h) => {
                    WorkdirState::Unmodified
                }
                _ => WorkdirState::Modified,
            },
            None => match (index_oid, head_oid) {
                // Neither indexed nor reported by the walk: gone or ignored.
                (None, _) => WorkdirState::Absent,
                (Some(i), Some(h)) if i == h => WorkdirState::Unmodified,
                (Some(_), _) => WorkdirState::Modified,
            },
        };

        let stage = match index_oid {
            None => StageState::Absent,
            Some(i) if Some(i) == head_oid => StageState::SameAsHead,
            Some(_) if wt.is_none() => StageState::SameAsWorkdir,
            Some(_) => StageState::Differs,
        };

        rows.push(StatusRow {
            path: path.clone(),
            head: if head_oid.is_some() {
                HeadState::Present
            } else {
                HeadState::Absent
            },
            workdir,
            stage,
        });
    }

    Ok(rows)
}

/// Flatten the HEAD tree into `path -> oid`, skipping directories.
fn head_entries(repo: &dyn GitRepo) -> Result<BTreeMap<String, GitOid>, GitError> {
    let mut out = BTreeMap::new();
    let Some(root) = repo.rev_parse_opt("HEAD^{tree}")? else {
        return Ok(out);
    };

    let mut pending = vec![(String::new(), root)];
    while let Some((prefix, tree)) = pending.pop() {
        for entry in repo.read_tree(tree)? {
            let path = if prefix.is_empty() {
                entry.name
            } else {
                format!("{prefix}/{}", entry.name)
            };
            if entry.mode == EntryMode::Tree {
                pending.push((path, entry.oid));
            } else {
                out.insert(path, entry.oid);
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
