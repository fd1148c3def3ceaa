//! Core types for the buildmark git abstraction layer.
//!
//! These types form the vocabulary shared between the [`GitRepo`](crate::GitRepo)
//! trait and the change detector. They contain no gix types; the backend is
//! an implementation detail.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Displays as 40 lowercase hex characters, which is also the form stamped
/// into `commit_hash`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Create a `GitOid` from a byte slice, rejecting anything but 20 bytes.
    ///
    /// # Errors
    /// Returns [`OidParseError`] if `bytes` is not exactly 20 bytes long
    /// (for example a SHA-256 repository).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, OidParseError> {
        let raw: [u8; 20] = bytes.try_into().map_err(|_| OidParseError {
            value: format!("<{} bytes>", bytes.len()),
            reason: "expected a 20-byte SHA-1 object id".to_owned(),
        })?;
        Ok(Self(raw))
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({self})")
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(OidParseError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let digit = |b: u8| {
                hex_digit(b).ok_or_else(|| OidParseError {
                    value: s.to_owned(),
                    reason: format!("invalid hex digit '{}'", b as char),
                })
            };
            bytes[i] = (digit(chunk[0])? << 4) | digit(chunk[1])?;
        }
        Ok(Self(bytes))
    }
}

/// Error from parsing a [`GitOid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid OID {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for OidParseError {}

impl From<OidParseError> for crate::GitError {
    fn from(e: OidParseError) -> Self {
        Self::InvalidOid {
            value: e.value,
            reason: e.reason,
        }
    }
}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tree and index types
// ---------------------------------------------------------------------------

/// The file mode of a tree or index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Subdirectory (`040000`).
    Tree,
    /// Symbolic link (`120000`).
    Link,
    /// Gitlink / submodule (`160000`).
    Commit,
}

/// A single entry in a git tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// File or directory name (just the basename, not a full path).
    pub name: String,
    /// The entry mode.
    pub mode: EntryMode,
    /// The OID of the blob, tree, or commit this entry points to.
    pub oid: GitOid,
}

/// A single entry in the git index (staging area).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// The file mode.
    pub mode: EntryMode,
    /// OID of the staged blob.
    pub oid: GitOid,
}

// ---------------------------------------------------------------------------
// Index-vs-worktree status
// ---------------------------------------------------------------------------

/// How a working-tree file differs from its index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Content or mode differs from the index.
    Modified,
    /// Tracked in the index (intent-to-add or copy) but new relative to it.
    Added,
    /// In the index but missing from the working tree.
    Deleted,
    /// Present in the working tree, not in the index, not ignored.
    Untracked,
    /// Detected as a rename of an indexed file.
    Renamed,
}

/// One index-vs-worktree difference, as reported by `git status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEntry {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// The status of the file.
    pub status: FileStatus,
}

// ---------------------------------------------------------------------------
// Status matrix
// ---------------------------------------------------------------------------

/// Whether a path exists in the HEAD commit's tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeadState {
    /// Not in HEAD (or HEAD is unborn).
    Absent,
    /// Present in HEAD.
    Present,
}

/// The working-tree file compared against HEAD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkdirState {
    /// No file on disk.
    Absent,
    /// On disk with the same content as HEAD.
    Unmodified,
    /// On disk and different from HEAD (or not in HEAD at all).
    Modified,
}

/// The index entry compared against HEAD and the working tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageState {
    /// No index entry.
    Absent,
    /// Staged content equals HEAD.
    SameAsHead,
    /// Staged content equals the working tree but not HEAD.
    SameAsWorkdir,
    /// Staged content differs from both HEAD and the working tree.
    Differs,
}

/// One row of the status matrix: a path with its HEAD, working-tree, and
/// staged state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusRow {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// HEAD state.
    pub head: HeadState,
    /// Working-tree state relative to HEAD.
    pub workdir: WorkdirState,
    /// Index state relative to HEAD and the working tree.
    pub stage: StageState,
}

impl StatusRow {
    /// Returns `true` if the working tree no longer matches HEAD for this path.
    #[must_use]
    pub const fn workdir_differs_from_head(&self) -> bool {
        match (self.head, self.workdir) {
            (HeadState::Absent, WorkdirState::Absent)
            | (HeadState::Present, WorkdirState::Unmodified) => false,
            _ => true,
        }
    }

    /// Returns `true` if the path is known to neither HEAD nor the index.
    #[must_use]
    pub const fn is_untracked(&self) -> bool {
        matches!(
            (self.head, self.stage),
            (HeadState::Absent, StageState::Absent)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
