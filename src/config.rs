//! Stamping configuration (`buildmark.toml`).
//!
//! Every option has an explicit default, so a missing file is the same as an
//! empty one. Unknown keys are rejected. Keys may be written in snake_case or
//! in the camelCase spelling used by JavaScript build configs
//! (`enableCommitHash`, `disableBumpSameStatus`, `buildIdEnv`).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// File name of the configuration file, looked up at the project root.
pub const CONFIG_FILE: &str = "buildmark.toml";

// ---------------------------------------------------------------------------
// StampConfig
// ---------------------------------------------------------------------------

/// Top-level stamping configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StampConfig {
    /// Directory (relative to the project root) that holds the canonical
    /// `version.json`. Default: `src`.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Record the `HEAD` commit hash in `commit_hash`.
    #[serde(default, alias = "enableCommitHash")]
    pub enable_commit_hash: bool,

    /// Skip the bump when the workspace fingerprint is unchanged since the
    /// last bump. The name is historical: `true` *enables* skipping.
    #[serde(default = "default_disable_bump_same_status", alias = "disableBumpSameStatus")]
    pub disable_bump_same_status: bool,

    /// Environment variable whose integer value replaces the computed
    /// `build_id` (for CI-provided build numbers).
    #[serde(default, alias = "buildIdEnv")]
    pub build_id_env: Option<String>,

    /// Bump and publish the canonical file when the build is configured,
    /// instead of after the bundle is written.
    #[serde(default)]
    pub prepare: bool,

    /// Where the previous workspace fingerprint is kept between builds.
    #[serde(default, alias = "statusHashStorage")]
    pub status_hash_storage: StatusHashStorage,

    /// Manifest holding the project version, relative to the project root.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            enable_commit_hash: false,
            disable_bump_same_status: default_disable_bump_same_status(),
            build_id_env: None,
            prepare: false,
            status_hash_storage: StatusHashStorage::default(),
            manifest: default_manifest(),
        }
    }
}

fn default_destination() -> PathBuf {
    PathBuf::from("src")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("package.json")
}

const fn default_disable_bump_same_status() -> bool {
    true
}

/// Storage for the previous workspace fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusHashStorage {
    /// A separate `.status_hash` file next to the project root.
    #[default]
    SideChannel,
    /// The `status_hash` field inside `version.json` (legacy layout).
    Embedded,
}

impl fmt::Display for StatusHashStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SideChannel => write!(f, "side-channel"),
            Self::Embedded => write!(f, "embedded"),
        }
    }
}

impl StampConfig {
    /// Whether a matching fingerprint suppresses the bump.
    #[must_use]
    pub const fn skip_if_unchanged(&self) -> bool {
        self.disable_bump_same_status
    }

    /// Read the external `build_id` override, if one is configured and set.
    ///
    /// `lookup` resolves an environment variable name. A value that is not a
    /// positive integer is ignored with a warning rather than failing the
    /// build.
    pub fn build_id_override(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<u64> {
        let name = self.build_id_env.as_deref()?;
        let raw = lookup(name)?;
        match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 => Some(n),
            _ => {
                tracing::warn!(
                    var = name,
                    value = %raw,
                    "build id override is not a positive integer; ignoring it for this build"
                );
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading or parsing `buildmark.toml`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl StampConfig {
    /// Load `buildmark.toml` from the project root.
    ///
    /// # Errors
    /// See [`StampConfig::load`].
    pub fn load_from_root(root: &Path) -> Result<Self, ConfigError> {
        Self::load(&root.join(CONFIG_FILE))
    }

    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
