//! buildmark: build identity stamping.
//!
//! Every production build of a project gets a `version.json` recording the
//! project version, a per-version `build_id`, a lifetime `total_build`
//! counter, and optionally the `HEAD` commit. Rebuilding an unchanged
//! workspace can be told to leave the identity alone.
//!
//! The `buildmark` binary drives a [`session::StampSession`] from the command
//! line; build tools can embed the session directly and call its hooks.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod provenance;
pub mod publish;
pub mod reconcile;
pub mod record;
pub mod session;
pub mod side_channel;
pub mod telemetry;

pub use config::StampConfig;
pub use error::StampError;
pub use record::AppVersion;
pub use session::{BuildMode, StampReport, StampSession};
