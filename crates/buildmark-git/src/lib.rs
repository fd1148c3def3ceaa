//! Git abstraction layer for buildmark.
//!
//! This crate defines the [`GitRepo`] trait, the single interface through
//! which buildmark reads source-control state. No other buildmark crate
//! imports gix directly.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`],
//!   [`TreeEntry`], [`IndexEntry`], [`StatusEntry`], [`StatusRow`]).
//! - [`matrix`]: derives the per-path HEAD/workdir/stage status matrix from
//!   any [`GitRepo`].
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod matrix;
pub mod repo;
pub mod types;

// gix-backed implementation modules
mod gix_repo;
mod index_impl;
mod objects_impl;
mod refs_impl;
mod status_impl;

pub use gix_repo::GixRepo;

// Re-export the main trait and commonly used types at the crate root:
// `use buildmark_git::{GitRepo, GitOid, GitError};`
pub use error::GitError;
pub use matrix::status_matrix;
pub use repo::GitRepo;
pub use types::{
    EntryMode, FileStatus, GitOid, HeadState, IndexEntry, OidParseError, StageState, StatusEntry,
    StatusRow, TreeEntry, WorkdirState,
};
