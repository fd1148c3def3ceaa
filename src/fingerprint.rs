//! Workspace change detection.
//!
//! A fingerprint summarizes "which tracked files are modified, and when were
//! they last touched". Two builds over the same dirty-file set (same paths,
//! same mtimes) agree on the fingerprint regardless of enumeration order.
//!
//! # Algorithm
//!
//! 1. Build the status matrix for the enclosing repository.
//! 2. Keep rows whose working tree differs from HEAD, dropping paths unknown
//!    to both HEAD and the index (untracked files) and the stamp's own output
//!    files, which would otherwise change the fingerprint on every build.
//! 3. Pair each path with its mtime in nanoseconds since the Unix epoch, or a
//!    deletion marker when the file is gone from disk.
//! 4. Sort and SHA-256 the pairs. No surviving paths gives
//!    [`Fingerprint::Clean`] rather than the hash of nothing.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use buildmark_git::{GitRepo, WorkdirState, status_matrix};
use sha2::{Digest, Sha256};

use crate::error::ChangeDetectionError;

/// The workspace fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// No tracked modifications.
    Clean,
    /// Hex SHA-256 over the sorted `(path, mtime)` pairs.
    Dirty(String),
}

impl Fingerprint {
    /// Build from the raw persisted form, where an empty string means clean.
    #[must_use]
    pub fn from_persisted(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Clean,
            Some(hash) => Self::Dirty(hash.to_owned()),
        }
    }

    /// The persisted form: `None` for clean.
    #[must_use]
    pub fn as_persisted(&self) -> Option<&str> {
        match self {
            Self::Clean => None,
            Self::Dirty(hash) => Some(hash),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Dirty(hash) => f.write_str(hash),
        }
    }
}

/// A modified path and its modification time. `None` marks a deletion.
pub type ChangedFile = (String, Option<u128>);

/// Hash a set of changed files, independent of their order.
#[must_use]
pub fn digest(changed: &[ChangedFile]) -> Fingerprint {
    if changed.is_empty() {
        return Fingerprint::Clean;
    }

    let mut sorted: Vec<&ChangedFile> = changed.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    for (path, mtime) in sorted {
        hasher.update(path.as_bytes());
        hasher.update([0]);
        match mtime {
            Some(ns) => hasher.update(ns.to_string().as_bytes()),
            None => hasher.update(b"deleted"),
        }
        hasher.update(b"\n");
    }
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    Fingerprint::Dirty(hex)
}

/// Compute the current fingerprint of the working tree.
///
/// `excluded` lists absolute paths (typically the canonical `version.json`
/// and the status-hash side-channel) that never contribute.
///
/// # Errors
/// Returns [`ChangeDetectionError`] when the repository has no working tree,
/// git status fails, or a modified file cannot be stat'ed.
pub fn compute(repo: &dyn GitRepo, excluded: &[PathBuf]) -> Result<Fingerprint, ChangeDetectionError> {
    let changed = changed_files(repo, excluded)?;
    tracing::debug!(changed = changed.len(), "workspace modifications");
    Ok(digest(&changed))
}

/// List the changed files that feed the fingerprint.
///
/// # Errors
/// See [`compute`].
pub fn changed_files(
    repo: &dyn GitRepo,
    excluded: &[PathBuf],
) -> Result<Vec<ChangedFile>, ChangeDetectionError> {
    let workdir = repo.workdir().ok_or(ChangeDetectionError::NoWorktree)?;
    let workdir_canon = canonical_or_self(workdir);
    let excluded: Vec<String> = excluded
        .iter()
        .filter_map(|p| repo_relative(&workdir_canon, p))
        .collect();

    let mut changed = Vec::new();
    for row in status_matrix(repo)? {
        if !row.workdir_differs_from_head()
            || row.is_untracked()
            || excluded.iter().any(|ex| *ex == row.path)
        {
            continue;
        }

        let mtime = if row.workdir == WorkdirState::Absent {
            None
        } else {
            let abs = workdir.join(&row.path);
            let modified = std::fs::metadata(&abs)
                .and_then(|m| m.modified())
                .map_err(|source| ChangeDetectionError::ChangeDetectionFailed {
                    path: abs.clone(),
                    source,
                })?;
            Some(modified.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_nanos()))
        };
        changed.push((row.path, mtime));
    }
    Ok(changed)
}

/// Express `path` relative to `workdir` with `/` separators, or `None` when
/// it lies outside the working tree.
///
/// The file itself need not exist; its deepest existing ancestor is
/// canonicalized so symlinked temp dirs still match.
fn repo_relative(workdir: &Path, path: &Path) -> Option<String> {
    let mut existing = path;
    let mut tail = Vec::new();
    while !existing.exists() {
        tail.push(existing.file_name()?);
        existing = existing.parent()?;
    }
    let mut full = canonical_or_self(existing);
    for part in tail.into_iter().rev() {
        full.push(part);
    }

    let rel = full.strip_prefix(workdir).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use buildmark_git::{
        EntryMode, FileStatus, GitError, GitOid, IndexEntry, StatusEntry, TreeEntry,
    };

    use super::*;

    #[test]
    fn empty_set_is_clean_not_hash_of_nothing() {
        assert_eq!(digest(&[]), Fingerprint::Clean);
    }

    #[test]
    fn digest_is_hex_sha256() {
        let Fingerprint::Dirty(hex) = digest(&[("a.txt".to_owned(), Some(1))]) else {
            panic!("expected dirty fingerprint");
        };
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn digest_sensitive_to_mtime_and_deletion() {
        let a = digest(&[("a.txt".to_owned(), Some(1))]);
        let b = digest(&[("a.txt".to_owned(), Some(2))]);
        let gone = digest(&[("a.txt".to_owned(), None)]);
        assert_ne!(a, b);
        assert_ne!(a, gone);
    }

    #[test]
    fn path_boundaries_are_unambiguous() {
        let one = digest(&[("ab".to_owned(), Some(1)), ("c".to_owned(), Some(2))]);
        let two = digest(&[("a".to_owned(), Some(1)), ("bc".to_owned(), Some(2))]);
        assert_ne!(one, two);
    }

    #[test]
    fn persisted_form_roundtrip() {
        assert_eq!(Fingerprint::from_persisted(None), Fingerprint::Clean);
        assert_eq!(Fingerprint::from_persisted(Some("")), Fingerprint::Clean);
        let dirty = Fingerprint::from_persisted(Some("h1\n"));
        assert_eq!(dirty, Fingerprint::Dirty("h1".to_owned()));
        assert_eq!(dirty.as_persisted(), Some("h1"));
        assert_eq!(Fingerprint::Clean.as_persisted(), None);
    }

    // -- compute() over an in-memory repo rooted in a temp dir --

    struct FakeRepo {
        root: PathBuf,
        head: Vec<(String, u8)>,
        status: Vec<StatusEntry>,
        index_extra: Vec<(String, u8)>,
    }

    fn oid(n: u8) -> GitOid {
        GitOid::from_bytes([n; 20])
    }

    impl GitRepo for FakeRepo {
        fn workdir(&self) -> Option<&Path> {
            Some(&self.root)
        }

        fn rev_parse_opt(&self, _spec: &str) -> Result<Option<GitOid>, GitError> {
            Ok(Some(oid(200)))
        }

        fn read_tree(&self, _oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
            Ok(self
                .head
                .iter()
                .map(|(name, n)| TreeEntry {
                    name: name.clone(),
                    mode: EntryMode::Blob,
                    oid: oid(*n),
                })
                .collect())
        }

        fn hash_worktree_file(&self, _path: &str) -> Result<Option<GitOid>, GitError> {
            Ok(None)
        }

        fn read_index(&self) -> Result<Vec<IndexEntry>, GitError> {
            let mut merged: BTreeMap<String, u8> = self.head.iter().cloned().collect();
            merged.extend(self.index_extra.iter().cloned());
            Ok(merged
                .into_iter()
                .map(|(path, n)| IndexEntry {
                    path,
                    mode: EntryMode::Blob,
                    oid: oid(n),
                })
                .collect())
        }

        fn status(&self) -> Result<Vec<StatusEntry>, GitError> {
            Ok(self.status.clone())
        }
    }

    fn modified(path: &str) -> StatusEntry {
        StatusEntry {
            path: path.to_owned(),
            status: FileStatus::Modified,
        }
    }

    fn fake(dir: &Path, status: Vec<StatusEntry>) -> FakeRepo {
        for name in ["a.txt", "version.json", ".status_hash"] {
            std::fs::write(dir.join(name), name).unwrap();
        }
        FakeRepo {
            root: dir.to_path_buf(),
            head: vec![
                ("a.txt".to_owned(), 1),
                ("version.json".to_owned(), 2),
                (".status_hash".to_owned(), 3),
            ],
            status,
            index_extra: Vec::new(),
        }
    }

    #[test]
    fn clean_worktree_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake(dir.path(), Vec::new());
        assert_eq!(compute(&repo, &[]).unwrap(), Fingerprint::Clean);
    }

    #[test]
    fn own_output_files_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake(dir.path(), vec![modified("version.json"), modified(".status_hash")]);
        let excluded = vec![dir.path().join("version.json"), dir.path().join(".status_hash")];
        assert_eq!(compute(&repo, &excluded).unwrap(), Fingerprint::Clean);
        assert_ne!(compute(&repo, &[]).unwrap(), Fingerprint::Clean);
    }

    #[test]
    fn modified_file_makes_dirty_and_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake(dir.path(), vec![modified("a.txt")]);
        let first = compute(&repo, &[]).unwrap();
        assert!(matches!(first, Fingerprint::Dirty(_)));
        assert_eq!(compute(&repo, &[]).unwrap(), first);
    }

    #[test]
    fn touching_a_modified_file_changes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake(dir.path(), vec![modified("a.txt")]);
        let before = compute(&repo, &[]).unwrap();
        filetime::set_file_mtime(
            dir.path().join("a.txt"),
            filetime::FileTime::from_unix_time(1_000_000, 0),
        )
        .unwrap();
        assert_ne!(compute(&repo, &[]).unwrap(), before);
    }

    #[test]
    fn untracked_files_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scratch.txt"), "x").unwrap();
        let repo = fake(
            dir.path(),
            vec![StatusEntry {
                path: "scratch.txt".to_owned(),
                status: FileStatus::Untracked,
            }],
        );
        assert_eq!(compute(&repo, &[]).unwrap(), Fingerprint::Clean);
    }

    #[test]
    fn deleted_file_uses_marker_instead_of_stat() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake(
            dir.path(),
            vec![StatusEntry {
                path: "a.txt".to_owned(),
                status: FileStatus::Deleted,
            }],
        );
        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        let changed = changed_files(&repo, &[]).unwrap();
        assert_eq!(changed, vec![("a.txt".to_owned(), None)]);
    }

    #[test]
    fn unstattable_modified_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = fake(dir.path(), Vec::new());
        // Staged in the index, reported clean by the walk, missing on disk.
        repo.index_extra = vec![("ghost.txt".to_owned(), 9)];
        repo.head.push(("ghost.txt".to_owned(), 8));
        let err = compute(&repo, &[]).unwrap_err();
        assert!(matches!(err, ChangeDetectionError::ChangeDetectionFailed { .. }), "{err}");
    }

    #[test]
    fn repo_relative_handles_missing_files_and_outside_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let rel = repo_relative(&root, &dir.path().join("src/version.json"));
        assert_eq!(rel.as_deref(), Some("src/version.json"));
        assert_eq!(repo_relative(&root.join("sub"), &dir.path().join("x")), None);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::super::*;

        fn arb_changed() -> impl Strategy<Value = Vec<ChangedFile>> {
            prop::collection::vec(
                ("[a-z]{1,6}(/[a-z]{1,6}){0,2}", prop::option::of(any::<u64>().prop_map(u128::from))),
                0..16,
            )
        }

        proptest! {
            #[test]
            fn prop_order_independent(
                (original, shuffled) in arb_changed()
                    .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
            ) {
                prop_assert_eq!(digest(&original), digest(&shuffled));
            }

            #[test]
            fn prop_clean_iff_empty(changed in arb_changed()) {
                prop_assert_eq!(digest(&changed) == Fingerprint::Clean, changed.is_empty());
            }
        }
    }
}
