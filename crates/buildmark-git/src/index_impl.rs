//! Index (staging area) reads for [`GixRepo`].

use gix::bstr::ByteSlice;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::refs_impl::from_gix_oid;
use crate::types::{EntryMode, IndexEntry};

pub fn read_index(repo: &GixRepo) -> Result<Vec<IndexEntry>, GitError> {
    // A fresh `git init` has no index file until the first `git add`.
    if !repo.repo.index_path().exists() {
        return Ok(Vec::new());
    }

    let index = repo
        .repo
        .open_index()
        .map_err(|e| GitError::BackendError {
            message: format!("failed to open index: {e}"),
        })?;

    let mut entries = Vec::with_capacity(index.entries().len());
    for entry in index.entries() {
        let Ok(path) = entry.path(&index).to_str() else {
            tracing::debug!("skipping index entry with non-UTF-8 path");
            continue;
        };
        let Some(mode) = gix_mode_to_entry_mode(entry.mode) else {
            continue;
        };
        entries.push(IndexEntry {
            path: path.to_owned(),
            mode,
            oid: from_gix_oid(&entry.id)?,
        });
    }
    Ok(entries)
}

fn gix_mode_to_entry_mode(mode: gix::index::entry::Mode) -> Option<EntryMode> {
    Some(match mode {
        gix::index::entry::Mode::FILE => EntryMode::Blob,
        gix::index::entry::Mode::FILE_EXECUTABLE => EntryMode::BlobExecutable,
        gix::index::entry::Mode::SYMLINK => EntryMode::Link,
        gix::index::entry::Mode::DIR => EntryMode::Tree,
        gix::index::entry::Mode::COMMIT => EntryMode::Commit,
        _ => return None,
    })
}
