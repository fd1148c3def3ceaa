//! Writing the decided record to its destinations.

use std::path::{Path, PathBuf};

use crate::config::StampConfig;
use crate::error::StampError;
use crate::record::{self, AppVersion, VERSION_FILE};

/// The canonical `version.json` for a project: `<root>/<destination>/version.json`.
#[must_use]
pub fn canonical_path(root: &Path, config: &StampConfig) -> PathBuf {
    resolve_destination(root, &config.destination).join(VERSION_FILE)
}

/// Resolve a destination directory against the project root.
///
/// Absolute destinations under the root are re-expressed relative to it;
/// absolute destinations elsewhere are used as given.
#[must_use]
pub fn resolve_destination(root: &Path, destination: &Path) -> PathBuf {
    if destination.is_absolute() {
        match destination.strip_prefix(root) {
            Ok(rel) => root.join(rel),
            Err(_) => destination.to_path_buf(),
        }
    } else {
        root.join(destination)
    }
}

/// Write `record` to the canonical path. Returns the file written.
///
/// # Errors
/// Returns [`StampError::PersistWriteFailure`] if the write fails.
pub fn publish(
    root: &Path,
    config: &StampConfig,
    record: &AppVersion,
) -> Result<PathBuf, StampError> {
    let path = canonical_path(root, config);
    record::save(&path, record)?;
    tracing::debug!(path = %path.display(), "published build identity");
    Ok(path)
}

/// Copy the canonical file, byte for byte, to `<destination>/version.json`.
/// Returns the target path; nothing is written when it is the canonical file.
///
/// # Errors
/// Returns [`StampError::PersistWriteFailure`] if the canonical file cannot
/// be read or the copy cannot be written.
pub fn mirror(
    root: &Path,
    config: &StampConfig,
    destination: &Path,
) -> Result<PathBuf, StampError> {
    let source = canonical_path(root, config);
    let target = resolve_destination(root, destination).join(VERSION_FILE);
    if target == source {
        return Ok(target);
    }
    let bytes = std::fs::read(&source).map_err(|e| StampError::PersistWriteFailure {
        path: source.clone(),
        reason: format!("read canonical record: {e}"),
    })?;
    record::write_atomic(&target, &bytes)?;
    tracing::debug!(path = %target.display(), "mirrored build identity");
    Ok(target)
}
