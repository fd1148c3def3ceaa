//! gix-backed tree reads and blob hashing.

use std::path::Path;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::refs_impl::{from_gix_oid, to_gix_oid};
use crate::types::{EntryMode, GitOid, TreeEntry};

/// Convert a gix `EntryMode` to our `EntryMode`.
fn from_gix_entry_mode(mode: gix::objs::tree::EntryMode) -> EntryMode {
    match mode.kind() {
        gix::objs::tree::EntryKind::Tree => EntryMode::Tree,
        gix::objs::tree::EntryKind::Blob => EntryMode::Blob,
        gix::objs::tree::EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        gix::objs::tree::EntryKind::Link => EntryMode::Link,
        gix::objs::tree::EntryKind::Commit => EntryMode::Commit,
    }
}

pub fn read_tree(repo: &GixRepo, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("tree {oid}: {e}"),
        })?;

    let mut entries = Vec::new();
    for result in tree.iter() {
        let entry = result.map_err(|e| GitError::BackendError {
            message: format!("failed to decode tree entry: {e}"),
        })?;
        entries.push(TreeEntry {
            name: entry.inner.filename.to_string(),
            mode: from_gix_entry_mode(entry.inner.mode),
            oid: from_gix_oid(entry.inner.oid)?,
        });
    }
    Ok(entries)
}

/// Hash a file on disk the way git would store it. Symlinks hash their
/// target path, as git records them.
pub fn hash_worktree_file(repo: &GixRepo, file: &Path) -> Result<Option<GitOid>, GitError> {
    let meta = match std::fs::symlink_metadata(file) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GitError::backend(format!("stat {}: {e}", file.display()))),
    };
    let bytes = if meta.file_type().is_symlink() {
        std::fs::read_link(file)
            .map_err(|e| GitError::backend(format!("readlink {}: {e}", file.display())))?
            .into_os_string()
            .into_encoded_bytes()
    } else if meta.is_file() {
        std::fs::read(file)
            .map_err(|e| GitError::backend(format!("read {}: {e}", file.display())))?
    } else {
        return Ok(None);
    };

    let id = gix::objs::compute_hash(repo.repo.object_hash(), gix::objs::Kind::Blob, &bytes)
        .map_err(GitError::backend)?;
    from_gix_oid(&id).map(Some)
}
