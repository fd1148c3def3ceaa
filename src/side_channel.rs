//! The status-hash side-channel (`.status_hash` at the project root).
//!
//! Holds the workspace fingerprint recorded at the last bump, outside
//! `version.json` so the published record never carries it. A missing file
//! means the workspace was clean at that bump.

use std::path::{Path, PathBuf};

use crate::error::StampError;
use crate::fingerprint::Fingerprint;
use crate::record::write_atomic;

/// File name of the side-channel, relative to the project root.
pub const STATUS_HASH_FILE: &str = ".status_hash";

/// Path of the side-channel for a project.
#[must_use]
pub fn path(root: &Path) -> PathBuf {
    root.join(STATUS_HASH_FILE)
}

/// Read the stored fingerprint.
///
/// # Errors
/// Returns the I/O error for anything other than a missing file.
pub fn load(path: &Path) -> std::io::Result<Fingerprint> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Fingerprint::from_persisted(Some(&contents))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Fingerprint::Clean),
        Err(e) => Err(e),
    }
}

/// Store `fingerprint`. A clean fingerprint removes the file.
///
/// # Errors
/// Returns [`StampError::PersistWriteFailure`] if the write or removal fails.
pub fn save(path: &Path, fingerprint: &Fingerprint) -> Result<(), StampError> {
    match fingerprint {
        Fingerprint::Dirty(hash) => write_atomic(path, hash.as_bytes()),
        Fingerprint::Clean => match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StampError::PersistWriteFailure {
                path: path.to_owned(),
                reason: format!("remove: {e}"),
            }),
        },
    }
}
