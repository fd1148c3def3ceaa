//! The stamping lifecycle, driven by a build host.
//!
//! A host calls into a [`StampSession`] at two points:
//!
//! 1. [`StampSession::configure`] once the build configuration is resolved
//!    (project root and mode known). This gathers every input: manifest
//!    version, prior record, fingerprints, commit hash, override.
//! 2. [`StampSession::bundle_written`] after each output directory is
//!    written. The first call decides and, unless the build is skipped,
//!    publishes the canonical record; every call copies the canonical file
//!    into the output directory.
//!
//! [`StampSession::finish`] closes the session and reports the final
//! identity. In serve mode the session is read-only: nothing is decided and
//! nothing is written.
//!
//! Optional capabilities degrade rather than fail. Each degradation logs one
//! warning and is listed in the [`StampReport`].

use std::fmt;
use std::path::{Path, PathBuf};

use buildmark_git::GixRepo;

use crate::config::{StampConfig, StatusHashStorage};
use crate::error::{ChangeDetectionError, StampError};
use crate::fingerprint::{self, Fingerprint};
use crate::reconcile::{Decision, Inputs, Outcome, Phase, Reconciler};
use crate::record::{self, AppVersion, Loaded};
use crate::{manifest, provenance, publish, side_channel};

/// How the host is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BuildMode {
    /// Production build: the identity is decided and written.
    #[default]
    Build,
    /// Development server: read-only.
    Serve,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Serve => write!(f, "serve"),
        }
    }
}

/// An optional capability that was off for this build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Degradation {
    /// `version.json` existed but could not be read; treated as a first build.
    CorruptState(String),
    /// The stored fingerprint could not be read; the skip check is off.
    PreviousFingerprint(String),
    /// Change detection is unavailable; every build bumps.
    ChangeDetection(String),
    /// `HEAD` did not resolve; `commit_hash` is omitted.
    Commit(String),
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptState(r) => write!(f, "persisted state ignored: {r}"),
            Self::PreviousFingerprint(r) => write!(f, "stored fingerprint unreadable: {r}"),
            Self::ChangeDetection(r) => write!(f, "change detection unavailable: {r}"),
            Self::Commit(r) => write!(f, "commit hash unavailable: {r}"),
        }
    }
}

/// Summary of a finished session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StampReport {
    /// The identity of this build.
    pub record: AppVersion,
    /// What the reconciler did; `None` when nothing was decided (serve mode,
    /// or no bundle was written).
    pub outcome: Option<Outcome>,
    /// Every file written, canonical first. A skipped build writes only the
    /// output copies.
    pub written: Vec<PathBuf>,
    /// Capabilities that were off.
    pub degraded: Vec<Degradation>,
}

/// The session state threaded between host hooks.
#[derive(Debug)]
pub struct StampSession {
    config: StampConfig,
    root: PathBuf,
    mode: BuildMode,
    reconciler: Reconciler,
    prior: AppVersion,
    written: Vec<PathBuf>,
    degraded: Vec<Degradation>,
}

impl StampSession {
    /// A session that will stamp according to `config`.
    #[must_use]
    pub fn new(config: StampConfig) -> Self {
        Self {
            config,
            root: PathBuf::new(),
            mode: BuildMode::default(),
            reconciler: Reconciler::new(),
            prior: AppVersion::default(),
            written: Vec::new(),
            degraded: Vec::new(),
        }
    }

    /// The reconciler's current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.reconciler.phase()
    }

    /// The "configuration resolved" hook, reading the override from the
    /// process environment.
    ///
    /// # Errors
    /// See [`StampSession::configure_with`].
    pub fn configure(&mut self, root: &Path, mode: BuildMode) -> Result<(), StampError> {
        self.configure_with(root, mode, |name| std::env::var(name).ok())
    }

    /// The "configuration resolved" hook with an explicit environment.
    ///
    /// # Errors
    /// - [`StampError::InvalidTransition`] if already configured.
    /// - [`StampError::ManifestUnreadable`] if the project version is unknown.
    /// - With `prepare` in build mode, any error from publishing.
    pub fn configure_with(
        &mut self,
        root: &Path,
        mode: BuildMode,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), StampError> {
        if self.phase() != Phase::Uninitialized {
            return Err(StampError::InvalidTransition {
                from: self.phase(),
                action: "configure",
            });
        }
        tracing::debug!(root = %root.display(), %mode, "configuring build stamp");
        self.root = root.to_path_buf();
        self.mode = mode;

        let version = manifest::read_version(root, &self.config.manifest)?;
        let canonical = publish::canonical_path(root, &self.config);

        let loaded = record::load(&canonical);
        if let Loaded::Corrupt(reason) = &loaded {
            self.degrade(Degradation::CorruptState(reason.clone()));
        }
        let present = loaded.is_present();
        let prior = loaded.into_record();

        let skip = self.config.skip_if_unchanged();
        let previous = if skip && present {
            self.previous_fingerprint(&prior)
        } else {
            None
        };
        let current = if skip && mode == BuildMode::Build {
            self.current_fingerprint(&canonical)
        } else {
            None
        };
        let commit = if self.config.enable_commit_hash && mode == BuildMode::Build {
            match provenance::resolve_commit(root) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    self.degrade(Degradation::Commit(e.to_string()));
                    None
                }
            }
        } else {
            None
        };

        self.prior = prior.clone();
        self.reconciler.hydrate(Inputs {
            prior,
            version,
            previous,
            current,
            commit,
            build_id_override: self.config.build_id_override(env),
            skip_if_unchanged: skip,
            embed_fingerprint: self.config.status_hash_storage == StatusHashStorage::Embedded,
        })?;

        if self.config.prepare && mode == BuildMode::Build {
            self.persist()?;
        }
        Ok(())
    }

    /// Decide and write the canonical record, once. A skipped build leaves
    /// the canonical file untouched. Later calls return the same decision
    /// without writing again.
    ///
    /// # Errors
    /// - [`StampError::InvalidTransition`] before `configure` or in serve mode.
    /// - [`StampError::PersistWriteFailure`] if a write fails.
    pub fn persist(&mut self) -> Result<&Decision, StampError> {
        if self.mode == BuildMode::Serve || self.phase() == Phase::Uninitialized {
            return Err(StampError::InvalidTransition {
                from: self.phase(),
                action: "persist",
            });
        }

        if self.phase() == Phase::Hydrated {
            let decision = self.reconciler.decide()?.clone();
            if decision.outcome.is_mutation() {
                let canonical = publish::publish(&self.root, &self.config, &decision.record)?;
                self.written.push(canonical);

                if self.config.status_hash_storage == StatusHashStorage::SideChannel
                    && let Some(fp) = &decision.fingerprint
                {
                    side_channel::save(&side_channel::path(&self.root), fp)?;
                }
            } else {
                tracing::debug!("workspace unchanged; canonical record left as is");
            }
            self.reconciler.mark_persisted()?;
        }

        self.reconciler.decision().ok_or(StampError::InvalidTransition {
            from: self.reconciler.phase(),
            action: "persist",
        })
    }

    /// The "bundle written" hook: copy the canonical file into `out_dir`.
    ///
    /// A no-op in serve mode.
    ///
    /// # Errors
    /// - [`StampError::InvalidTransition`] before `configure`.
    /// - [`StampError::PersistWriteFailure`] if a write fails.
    pub fn bundle_written(&mut self, out_dir: &Path) -> Result<(), StampError> {
        if self.phase() == Phase::Uninitialized {
            return Err(StampError::InvalidTransition {
                from: self.phase(),
                action: "publish bundle",
            });
        }
        if self.mode == BuildMode::Serve {
            tracing::debug!("serve mode; nothing written");
            return Ok(());
        }

        self.persist()?;
        let path = publish::mirror(&self.root, &self.config, out_dir)?;
        if !self.written.contains(&path) {
            self.written.push(path);
        }
        Ok(())
    }

    /// Close the session and log the final identity.
    ///
    /// # Errors
    /// [`StampError::InvalidTransition`] if the session was never configured.
    pub fn finish(self) -> Result<StampReport, StampError> {
        if self.phase() == Phase::Uninitialized {
            return Err(StampError::InvalidTransition {
                from: self.phase(),
                action: "finish",
            });
        }

        let (record, outcome) = match self.reconciler.decision() {
            Some(d) => (d.record.clone(), Some(d.outcome)),
            None => (self.prior.clone(), None),
        };
        match outcome {
            Some(outcome) => tracing::info!(
                %outcome,
                version = %record.version,
                build_id = record.build_id,
                total_build = record.total_build,
                commit = record.commit_hash.as_deref().unwrap_or("-"),
                "build identity: {record}"
            ),
            None => tracing::info!(mode = %self.mode, "build identity unchanged: {record}"),
        }

        Ok(StampReport {
            record,
            outcome,
            written: self.written,
            degraded: self.degraded,
        })
    }

    fn previous_fingerprint(&mut self, prior: &AppVersion) -> Option<Fingerprint> {
        match self.config.status_hash_storage {
            StatusHashStorage::Embedded => {
                Some(Fingerprint::from_persisted(prior.status_hash.as_deref()))
            }
            StatusHashStorage::SideChannel => {
                let path = side_channel::path(&self.root);
                match side_channel::load(&path) {
                    Ok(fp) => Some(fp),
                    Err(e) => {
                        self.degrade(Degradation::PreviousFingerprint(format!(
                            "{}: {e}",
                            path.display()
                        )));
                        None
                    }
                }
            }
        }
    }

    fn current_fingerprint(&mut self, canonical: &Path) -> Option<Fingerprint> {
        let result = GixRepo::discover(&self.root)
            .map_err(|_| ChangeDetectionError::NoRepository {
                path: self.root.clone(),
            })
            .and_then(|repo| {
                let excluded = [canonical.to_path_buf(), side_channel::path(&self.root)];
                fingerprint::compute(&repo, &excluded)
            });
        match result {
            Ok(fp) => Some(fp),
            Err(e) => {
                self.degrade(Degradation::ChangeDetection(e.to_string()));
                None
            }
        }
    }

    fn degrade(&mut self, d: Degradation) {
        tracing::warn!("{d}");
        self.degraded.push(d);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
