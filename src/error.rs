//! Error types for build stamping.
//!
//! Failures split into two groups:
//!
//! - **Fatal** ([`StampError`]): the build cannot produce a trustworthy
//!   identity. These propagate to the host and abort the build.
//! - **Degradations** ([`ChangeDetectionError`], [`CommitUnavailable`]): an
//!   optional capability is off for this run. Callers log one warning and
//!   carry on with reduced functionality.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::reconcile::Phase;

/// Fatal errors surfaced to the host build pipeline.
#[derive(Debug, Error)]
pub enum StampError {
    /// The project manifest is missing, unparseable, or has no usable version.
    #[error("cannot read project version from {}: {reason}", path.display())]
    ManifestUnreadable {
        /// Path to the manifest.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Writing `version.json` (or the status-hash side-channel) failed.
    #[error("failed to write {}: {reason}", path.display())]
    PersistWriteFailure {
        /// The destination that could not be written.
        path: PathBuf,
        /// Underlying I/O or serialization error.
        reason: String,
    },

    /// A lifecycle step was invoked out of order.
    #[error("cannot {action} while the reconciler is {from}")]
    InvalidTransition {
        /// The phase the reconciler was in.
        from: Phase,
        /// What the caller tried to do.
        action: &'static str,
    },

    /// `buildmark.toml` could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why workspace change detection is off for this build.
#[derive(Debug, Error)]
pub enum ChangeDetectionError {
    /// No git repository encloses the project root.
    #[error("no git repository encloses {}", path.display())]
    NoRepository {
        /// The project root.
        path: PathBuf,
    },

    /// The repository is bare.
    #[error("repository has no working tree")]
    NoWorktree,

    /// Reading the status matrix failed.
    #[error("git status failed: {0}")]
    Git(#[from] buildmark_git::GitError),

    /// A changed path could not be stat'ed.
    #[error("cannot stat {}: {source}", path.display())]
    ChangeDetectionFailed {
        /// Absolute path of the file.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Why the commit hash could not be resolved for this build.
#[derive(Debug, Error)]
pub enum CommitUnavailable {
    /// No git repository encloses the project root.
    #[error("no git repository encloses {}", path.display())]
    NoRepository {
        /// The project root.
        path: PathBuf,
    },

    /// `HEAD` does not resolve (empty repository, broken ref).
    #[error("HEAD does not resolve to a commit")]
    UnbornHead,

    /// The backend failed while resolving `HEAD`.
    #[error("git error: {0}")]
    Git(#[from] buildmark_git::GitError),
}
