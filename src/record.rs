//! The persisted build identity (`version.json`).
//!
//! Writes are atomic on POSIX: serialize, write to a temp file in the target
//! directory, fsync, rename over the target. Serialization is deterministic:
//! fixed field order, pretty JSON, trailing newline. Skipped builds do not
//! save at all; see [`crate::publish::mirror`].
//!
//! There is no cross-process locking. Two builds racing on the same file
//! resolve as last-writer-wins.

use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StampError;

/// File name of the build identity record.
pub const VERSION_FILE: &str = "version.json";

// ---------------------------------------------------------------------------
// AppVersion
// ---------------------------------------------------------------------------

/// The build identity stamped into each build.
///
/// The zero value (`version: ""`, counters `0`) stands for "no build has ever
/// completed".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    /// Project version as of the most recent bump.
    pub version: String,

    /// Build number within `version`; restarts at 1 on a version change.
    pub build_id: u64,

    /// Number of bumps over the record's lifetime. Never resets.
    pub total_build: u64,

    /// `HEAD` revision at bump time, when commit tracking is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,

    /// Workspace fingerprint at bump time (legacy embedded storage only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_hash: Option<String>,
}

impl AppVersion {
    /// Serialize to pretty JSON with a trailing newline.
    ///
    /// # Errors
    /// Returns the `serde_json` error; in practice this cannot fail for this
    /// type.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} build {} (total {})",
            self.version, self.build_id, self.total_build
        )?;
        if let Some(hash) = &self.commit_hash {
            write!(f, " @ {}", hash.get(..12).unwrap_or(hash.as_str()))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Result of reading a persisted record.
///
/// `Absent` and `Corrupt` both hydrate to [`AppVersion::default`], but they
/// are kept apart so a damaged file is reported instead of silently treated
/// as a first build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Loaded {
    /// The file exists and parsed.
    Present(AppVersion),
    /// No file at the path.
    Absent,
    /// The file exists but could not be read or parsed.
    Corrupt(String),
}

impl Loaded {
    /// The record to hydrate from: the parsed record or the zero value.
    #[must_use]
    pub fn into_record(self) -> AppVersion {
        match self {
            Self::Present(record) => record,
            Self::Absent | Self::Corrupt(_) => AppVersion::default(),
        }
    }

    /// Returns `true` for [`Loaded::Present`].
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Read the record at `path`. Never fails: see [`Loaded`].
#[must_use]
pub fn load(path: &Path) -> Loaded {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Loaded::Absent,
        Err(e) => return Loaded::Corrupt(format!("read {}: {e}", path.display())),
    };
    match serde_json::from_str(&contents) {
        Ok(record) => Loaded::Present(record),
        Err(e) => Loaded::Corrupt(format!("parse {}: {e}", path.display())),
    }
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

/// Write `record` to `path` atomically, creating parent directories.
///
/// # Errors
/// Returns [`StampError::PersistWriteFailure`] on any I/O failure.
pub fn save(path: &Path, record: &AppVersion) -> Result<(), StampError> {
    let json = record.to_json().map_err(|e| StampError::PersistWriteFailure {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    write_atomic(path, json.as_bytes())
}

/// Write `bytes` to `path` via temp file + fsync + rename in the same
/// directory.
///
/// # Errors
/// Returns [`StampError::PersistWriteFailure`] on any I/O failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StampError> {
    let fail = |what: &str, e: &dyn fmt::Display| StampError::PersistWriteFailure {
        path: path.to_owned(),
        reason: format!("{what}: {e}"),
    };

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| fail("create directory", &e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".buildmark-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| fail("create temp file", &e))?;
    tmp.write_all(bytes).map_err(|e| fail("write", &e))?;
    tmp.as_file().sync_all().map_err(|e| fail("fsync", &e))?;
    tmp.persist(path).map_err(|e| fail("rename", &e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
