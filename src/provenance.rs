//! Commit provenance: the full `HEAD` hash of the enclosing repository.

use std::path::Path;

use buildmark_git::{GitRepo, GixRepo};

use crate::error::CommitUnavailable;

/// Resolve `HEAD` for the repository enclosing `root`.
///
/// # Errors
/// Returns [`CommitUnavailable`] when there is no repository or `HEAD` is
/// unborn.
pub fn resolve_commit(root: &Path) -> Result<String, CommitUnavailable> {
    let repo = GixRepo::discover(root).map_err(|_| CommitUnavailable::NoRepository {
        path: root.to_owned(),
    })?;
    head_commit(&repo)
}

/// Resolve `HEAD` through an already-open repository.
///
/// # Errors
/// Returns [`CommitUnavailable::UnbornHead`] if `HEAD` does not resolve.
pub fn head_commit(repo: &dyn GitRepo) -> Result<String, CommitUnavailable> {
    let oid = repo
        .rev_parse_opt("HEAD")?
        .ok_or(CommitUnavailable::UnbornHead)?;
    Ok(oid.to_string())
}
