//! The build identity reconciler.
//!
//! Turns the prior record plus this build's observations into the record to
//! publish. The reconciler is an explicit state machine:
//!
//! ```text
//! Uninitialized ──hydrate──▶ Hydrated ──decide──▶ Decided ──mark_persisted──▶ Persisted
//! ```
//!
//! Each step is legal exactly once and only from its source phase; anything
//! else returns [`StampError::InvalidTransition`]. The decision itself is the
//! pure function [`reconcile`].
//!
//! # Precedence
//!
//! 1. An external override sets `build_id` verbatim and always bumps.
//! 2. A changed project version always bumps, restarting `build_id` at 1.
//! 3. An unchanged workspace fingerprint skips the bump, when enabled.
//! 4. Otherwise `build_id` increments.

use std::fmt;

use crate::error::StampError;
use crate::fingerprint::Fingerprint;
use crate::record::AppVersion;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the reconciler is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing loaded yet.
    Uninitialized,
    /// Inputs gathered; no decision yet.
    Hydrated,
    /// The next record is fixed but not yet written.
    Decided,
    /// The record has been written to its canonical location.
    Persisted,
}

impl Phase {
    /// The single phase reachable from this one.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::Hydrated),
            Self::Hydrated => Some(Self::Decided),
            Self::Decided => Some(Self::Persisted),
            Self::Persisted => None,
        }
    }

    /// Check whether transitioning to `next` is valid.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next() == Some(next)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Hydrated => write!(f, "hydrated"),
            Self::Decided => write!(f, "decided"),
            Self::Persisted => write!(f, "persisted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs / Decision
// ---------------------------------------------------------------------------

/// Everything the decision depends on, gathered before it is made.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inputs {
    /// The persisted record, or the zero value.
    pub prior: AppVersion,
    /// The project version declared by the manifest right now.
    pub version: String,
    /// Fingerprint stored at the last bump. `None` when unknown.
    pub previous: Option<Fingerprint>,
    /// Fingerprint of the workspace now. `None` when change detection is off.
    pub current: Option<Fingerprint>,
    /// `HEAD` hash, when commit tracking is enabled and it resolved.
    pub commit: Option<String>,
    /// Externally supplied `build_id`.
    pub build_id_override: Option<u64>,
    /// Skip the bump when the fingerprint is unchanged.
    pub skip_if_unchanged: bool,
    /// Keep the fingerprint in the record's `status_hash` field.
    pub embed_fingerprint: bool,
}

/// What the reconciler did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Nothing changed since the last bump; the prior record stands.
    Skipped,
    /// `build_id` and `total_build` advanced.
    Bumped,
    /// `build_id` came from the external override.
    Overridden,
}

impl Outcome {
    /// Returns `true` if the record changed.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Bumped => write!(f, "bumped"),
            Self::Overridden => write!(f, "overridden"),
        }
    }
}

/// The result of a decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// The record every destination receives.
    pub record: AppVersion,
    /// What happened.
    pub outcome: Outcome,
    /// Fingerprint to store as the next "previous" value outside the record.
    /// `None` means leave the store alone.
    pub fingerprint: Option<Fingerprint>,
}

/// Decide the next record.
#[must_use]
pub fn reconcile(inputs: &Inputs) -> Decision {
    let prior = &inputs.prior;
    let version_changed = prior.version != inputs.version;

    let unchanged = inputs.skip_if_unchanged
        && !version_changed
        && matches!((&inputs.previous, &inputs.current), (Some(p), Some(c)) if p == c);

    let (build_id, outcome) = if let Some(n) = inputs.build_id_override {
        (n, Outcome::Overridden)
    } else if unchanged {
        tracing::debug!(version = %prior.version, "workspace unchanged since last bump");
        return Decision {
            record: prior.clone(),
            outcome: Outcome::Skipped,
            fingerprint: None,
        };
    } else if version_changed {
        (1, Outcome::Bumped)
    } else {
        (prior.build_id.saturating_add(1), Outcome::Bumped)
    };

    let track = inputs.skip_if_unchanged.then(|| inputs.current.clone()).flatten();
    let status_hash = if inputs.embed_fingerprint {
        track
            .as_ref()
            .and_then(|fp| fp.as_persisted().map(str::to_owned))
    } else {
        None
    };

    let record = AppVersion {
        version: inputs.version.clone(),
        build_id,
        total_build: prior.total_build.saturating_add(1),
        commit_hash: inputs.commit.clone(),
        status_hash,
    };
    tracing::debug!(
        %outcome,
        from = %prior,
        to = %record,
        version_changed,
        "build identity decided"
    );

    Decision {
        record,
        outcome,
        fingerprint: if inputs.embed_fingerprint { None } else { track },
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
enum State {
    #[default]
    Uninitialized,
    Hydrated(Inputs),
    Decided(Decision),
    Persisted(Decision),
}

/// The reconciler state machine. See the module docs.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    state: State,
}

impl Reconciler {
    /// A fresh reconciler in [`Phase::Uninitialized`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self.state {
            State::Uninitialized => Phase::Uninitialized,
            State::Hydrated(_) => Phase::Hydrated,
            State::Decided(_) => Phase::Decided,
            State::Persisted(_) => Phase::Persisted,
        }
    }

    /// The decision, once made.
    #[must_use]
    pub const fn decision(&self) -> Option<&Decision> {
        match &self.state {
            State::Decided(d) | State::Persisted(d) => Some(d),
            _ => None,
        }
    }

    /// Load this build's inputs.
    ///
    /// # Errors
    /// [`StampError::InvalidTransition`] unless uninitialized.
    pub fn hydrate(&mut self, inputs: Inputs) -> Result<(), StampError> {
        self.check(Phase::Hydrated, "hydrate")?;
        self.state = State::Hydrated(inputs);
        Ok(())
    }

    /// Make the decision.
    ///
    /// # Errors
    /// [`StampError::InvalidTransition`] unless hydrated.
    pub fn decide(&mut self) -> Result<&Decision, StampError> {
        self.check(Phase::Decided, "decide")?;
        let State::Hydrated(inputs) = std::mem::take(&mut self.state) else {
            return Err(self.invalid("decide"));
        };
        self.state = State::Decided(reconcile(&inputs));
        self.decision().ok_or_else(|| self.invalid("decide"))
    }

    /// Record that the canonical copy has been written.
    ///
    /// # Errors
    /// [`StampError::InvalidTransition`] unless decided.
    pub fn mark_persisted(&mut self) -> Result<(), StampError> {
        self.check(Phase::Persisted, "mark persisted")?;
        if let State::Decided(d) = std::mem::take(&mut self.state) {
            self.state = State::Persisted(d);
        }
        Ok(())
    }

    fn check(&self, next: Phase, action: &'static str) -> Result<(), StampError> {
        if self.phase().can_transition_to(next) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    const fn invalid(&self, action: &'static str) -> StampError {
        StampError::InvalidTransition {
            from: self.phase(),
            action,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: &str, build_id: u64, total_build: u64) -> AppVersion {
        AppVersion {
            version: version.to_owned(),
            build_id,
            total_build,
            commit_hash: None,
            status_hash: None,
        }
    }

    fn inputs(prior: AppVersion, version: &str) -> Inputs {
        Inputs {
            prior,
            version: version.to_owned(),
            skip_if_unchanged: true,
            ..Inputs::default()
        }
    }

    fn dirty(h: &str) -> Option<Fingerprint> {
        Some(Fingerprint::Dirty(h.to_owned()))
    }

    // -- Phase --

    #[test]
    fn phases_only_move_forward_one_step() {
        assert!(Phase::Uninitialized.can_transition_to(Phase::Hydrated));
        assert!(Phase::Hydrated.can_transition_to(Phase::Decided));
        assert!(Phase::Decided.can_transition_to(Phase::Persisted));
        assert!(!Phase::Uninitialized.can_transition_to(Phase::Decided));
        assert!(!Phase::Decided.can_transition_to(Phase::Hydrated));
        assert_eq!(Phase::Persisted.next(), None);
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Uninitialized.to_string(), "uninitialized");
        assert_eq!(Phase::Persisted.to_string(), "persisted");
    }

    // -- decision scenarios --

    #[test]
    fn first_run() {
        let d = reconcile(&inputs(AppVersion::default(), "1.0.0"));
        assert_eq!(d.outcome, Outcome::Bumped);
        assert_eq!(d.record, record("1.0.0", 1, 1));
    }

    #[test]
    fn version_change_restarts_build_id() {
        let d = reconcile(&inputs(record("1.0.0", 5, 12), "1.1.0"));
        assert_eq!(d.record, record("1.1.0", 1, 13));
    }

    #[test]
    fn same_version_rebuild_increments() {
        let d = reconcile(&inputs(record("1.0.0", 3, 8), "1.0.0"));
        assert_eq!(d.record, record("1.0.0", 4, 9));
    }

    #[test]
    fn matching_fingerprint_skips() {
        let prior = record("1.0.0", 3, 8);
        let d = reconcile(&Inputs {
            previous: dirty("h1"),
            current: dirty("h1"),
            ..inputs(prior.clone(), "1.0.0")
        });
        assert_eq!(d.outcome, Outcome::Skipped);
        assert_eq!(d.record, prior);
        assert_eq!(d.fingerprint, None);
    }

    #[test]
    fn clean_to_clean_skips() {
        let d = reconcile(&Inputs {
            previous: Some(Fingerprint::Clean),
            current: Some(Fingerprint::Clean),
            ..inputs(record("1.0.0", 3, 8), "1.0.0")
        });
        assert_eq!(d.outcome, Outcome::Skipped);
    }

    #[test]
    fn version_change_beats_matching_fingerprint() {
        let d = reconcile(&Inputs {
            previous: dirty("h1"),
            current: dirty("h1"),
            ..inputs(record("1.0.0", 3, 8), "2.0.0")
        });
        assert_eq!(d.outcome, Outcome::Bumped);
        assert_eq!(d.record, record("2.0.0", 1, 9));
    }

    #[test]
    fn skipping_disabled_always_bumps() {
        let d = reconcile(&Inputs {
            previous: dirty("h1"),
            current: dirty("h1"),
            skip_if_unchanged: false,
            ..inputs(record("1.0.0", 3, 8), "1.0.0")
        });
        assert_eq!(d.record, record("1.0.0", 4, 9));
        assert_eq!(d.fingerprint, None);
    }

    #[test]
    fn unknown_fingerprint_never_skips() {
        for (previous, current) in [
            (None, dirty("h1")),
            (dirty("h1"), None),
            (None, None),
        ] {
            let d = reconcile(&Inputs {
                previous,
                current,
                ..inputs(record("1.0.0", 3, 8), "1.0.0")
            });
            assert_eq!(d.outcome, Outcome::Bumped);
        }
    }

    #[test]
    fn differing_fingerprint_bumps_and_records_current() {
        let d = reconcile(&Inputs {
            previous: dirty("h1"),
            current: dirty("h2"),
            ..inputs(record("1.0.0", 3, 8), "1.0.0")
        });
        assert_eq!(d.outcome, Outcome::Bumped);
        assert_eq!(d.fingerprint, dirty("h2"));
        assert_eq!(d.record.status_hash, None);
    }

    #[test]
    fn override_is_verbatim_and_bypasses_skip() {
        let d = reconcile(&Inputs {
            previous: dirty("h1"),
            current: dirty("h1"),
            build_id_override: Some(42),
            ..inputs(record("1.0.0", 3, 8), "1.0.0")
        });
        assert_eq!(d.outcome, Outcome::Overridden);
        assert_eq!(d.record, record("1.0.0", 42, 9));
    }

    #[test]
    fn override_on_version_change_still_verbatim() {
        let d = reconcile(&Inputs {
            build_id_override: Some(7),
            ..inputs(record("1.0.0", 3, 8), "1.1.0")
        });
        assert_eq!(d.record, record("1.1.0", 7, 9));
    }

    #[test]
    fn commit_hash_attached_on_bump_only() {
        let hash = "c".repeat(40);
        let bumped = reconcile(&Inputs {
            commit: Some(hash.clone()),
            ..inputs(record("1.0.0", 1, 1), "1.0.0")
        });
        assert_eq!(bumped.record.commit_hash.as_deref(), Some(hash.as_str()));

        let mut prior = record("1.0.0", 1, 1);
        prior.commit_hash = Some("0".repeat(40));
        let skipped = reconcile(&Inputs {
            commit: Some(hash),
            previous: Some(Fingerprint::Clean),
            current: Some(Fingerprint::Clean),
            ..inputs(prior.clone(), "1.0.0")
        });
        assert_eq!(skipped.record, prior);
    }

    #[test]
    fn untracked_commit_drops_stale_hash() {
        let mut prior = record("1.0.0", 1, 1);
        prior.commit_hash = Some("0".repeat(40));
        let d = reconcile(&inputs(prior, "1.0.0"));
        assert_eq!(d.record.commit_hash, None);
    }

    #[test]
    fn embedded_fingerprint_goes_into_record() {
        let d = reconcile(&Inputs {
            current: dirty("h2"),
            embed_fingerprint: true,
            ..inputs(record("1.0.0", 3, 8), "1.0.0")
        });
        assert_eq!(d.record.status_hash.as_deref(), Some("h2"));
        assert_eq!(d.fingerprint, None);

        let clean = reconcile(&Inputs {
            current: Some(Fingerprint::Clean),
            embed_fingerprint: true,
            ..inputs(record("1.0.0", 3, 8), "1.0.0")
        });
        assert_eq!(clean.record.status_hash, None);
    }

    #[test]
    fn counters_saturate() {
        let d = reconcile(&inputs(record("1.0.0", u64::MAX, u64::MAX), "1.0.0"));
        assert_eq!(d.record.build_id, u64::MAX);
        assert_eq!(d.record.total_build, u64::MAX);
    }

    // -- state machine --

    #[test]
    fn lifecycle_in_order() {
        let mut r = Reconciler::new();
        assert_eq!(r.phase(), Phase::Uninitialized);
        r.hydrate(inputs(AppVersion::default(), "1.0.0")).unwrap();
        assert_eq!(r.phase(), Phase::Hydrated);
        assert_eq!(r.decision(), None);
        let d = r.decide().unwrap().clone();
        assert_eq!(r.phase(), Phase::Decided);
        r.mark_persisted().unwrap();
        assert_eq!(r.phase(), Phase::Persisted);
        assert_eq!(r.decision(), Some(&d));
    }

    #[test]
    fn decide_before_hydrate_is_invalid() {
        let mut r = Reconciler::new();
        let err = r.decide().unwrap_err();
        assert!(matches!(
            err,
            StampError::InvalidTransition {
                from: Phase::Uninitialized,
                action: "decide"
            }
        ));
        assert_eq!(r.phase(), Phase::Uninitialized);
    }

    #[test]
    fn double_decide_and_rehydrate_are_invalid() {
        let mut r = Reconciler::new();
        r.hydrate(inputs(AppVersion::default(), "1.0.0")).unwrap();
        r.decide().unwrap();
        assert!(r.decide().is_err());
        assert!(r.hydrate(Inputs::default()).is_err());
        assert_eq!(r.phase(), Phase::Decided);
    }

    #[test]
    fn persist_requires_decision() {
        let mut r = Reconciler::new();
        r.hydrate(Inputs::default()).unwrap();
        let err = r.mark_persisted().unwrap_err();
        assert_eq!(err.to_string(), "cannot mark persisted while the reconciler is hydrated");
    }

    mod proptests {
        use proptest::prelude::*;

        use super::super::*;

        fn arb_fp() -> impl Strategy<Value = Option<Fingerprint>> {
            prop_oneof![
                Just(None),
                Just(Some(Fingerprint::Clean)),
                "h[12]".prop_map(|h| Some(Fingerprint::Dirty(h))),
            ]
        }

        fn arb_inputs() -> impl Strategy<Value = Inputs> {
            (
                "1\\.[0-2]\\.0",
                0..1000_u64,
                0..1000_u64,
                "1\\.[0-2]\\.0",
                arb_fp(),
                arb_fp(),
                prop::option::of(1..500_u64),
                any::<bool>(),
                any::<bool>(),
            )
                .prop_map(
                    |(pv, bid, extra, v, previous, current, ov, skip, embed)| Inputs {
                        prior: AppVersion {
                            version: pv,
                            build_id: bid,
                            total_build: bid + extra,
                            commit_hash: None,
                            status_hash: None,
                        },
                        version: v,
                        previous,
                        current,
                        commit: None,
                        build_id_override: ov,
                        skip_if_unchanged: skip,
                        embed_fingerprint: embed,
                    },
                )
        }

        proptest! {
            #[test]
            fn prop_mutation_adds_exactly_one_total(i in arb_inputs()) {
                let d = reconcile(&i);
                if d.outcome.is_mutation() {
                    prop_assert_eq!(d.record.total_build, i.prior.total_build + 1);
                    prop_assert_eq!(&d.record.version, &i.version);
                } else {
                    prop_assert_eq!(&d.record, &i.prior);
                }
            }

            #[test]
            fn prop_version_change_restarts_or_overrides(i in arb_inputs()) {
                let d = reconcile(&i);
                if i.prior.version != i.version {
                    prop_assert!(d.outcome.is_mutation());
                    let expected = i.build_id_override.unwrap_or(1);
                    prop_assert_eq!(d.record.build_id, expected);
                }
            }

            #[test]
            fn prop_override_precedence(i in arb_inputs()) {
                let d = reconcile(&i);
                if let Some(n) = i.build_id_override {
                    prop_assert_eq!(d.outcome, Outcome::Overridden);
                    prop_assert_eq!(d.record.build_id, n);
                }
            }
        }
    }
}
