//! Project metadata: the authoritative version string.

use std::path::Path;

use serde::Deserialize;

use crate::error::StampError;

#[derive(Deserialize)]
struct PackageManifest {
    version: Option<serde_json::Value>,
}

/// Read the `version` field of the manifest at `root/<manifest>`.
///
/// The string is returned verbatim; buildmark never normalizes or guesses a
/// version.
///
/// # Errors
/// Returns [`StampError::ManifestUnreadable`] if the file is missing, is not
/// JSON, or has no non-empty string `version`.
pub fn read_version(root: &Path, manifest: &Path) -> Result<String, StampError> {
    let path = root.join(manifest);
    let unreadable = |reason: String| StampError::ManifestUnreadable {
        path: path.clone(),
        reason,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| unreadable(e.to_string()))?;
    let parsed: PackageManifest =
        serde_json::from_str(&contents).map_err(|e| unreadable(format!("invalid JSON: {e}")))?;

    match parsed.version {
        Some(serde_json::Value::String(v)) if !v.trim().is_empty() => Ok(v),
        Some(serde_json::Value::String(_)) => Err(unreadable("`version` is empty".to_owned())),
        Some(other) => Err(unreadable(format!("`version` is not a string: {other}"))),
        None => Err(unreadable("no `version` field".to_owned())),
    }
}
