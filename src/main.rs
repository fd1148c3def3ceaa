use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use buildmark_git::GixRepo;
use clap::{Args, Parser, Subcommand};

use buildmark::config::StampConfig;
use buildmark::fingerprint;
use buildmark::record::{self, Loaded};
use buildmark::{BuildMode, StampSession, publish, side_channel, telemetry};

/// Build identity stamper
///
/// Writes `version.json` (version, build number, lifetime build count and
/// optionally the git commit) into the project source tree and into every
/// output directory of a build.
///
/// Settings come from `buildmark.toml` at the project root; flags override
/// them for one run.
///
/// LOGGING:
///
///   BUILDMARK_LOG=debug          filter (EnvFilter syntax, default info)
///   BUILDMARK_LOG_FORMAT=json    JSON events on stderr
#[derive(Parser)]
#[command(name = "buildmark")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'buildmark <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stamp lifecycle for one build
    ///
    /// Decides the build identity, writes the canonical `version.json`, and
    /// mirrors it into each `--out` directory. In serve mode nothing is
    /// written.
    Stamp(StampArgs),

    /// Print the persisted build identity
    Show(ShowArgs),

    /// Print the current workspace fingerprint
    ///
    /// Prints `clean` when no tracked file is modified, or the reason change
    /// detection is unavailable.
    Fingerprint(RootArg),
}

#[derive(Args)]
struct RootArg {
    /// Project root (directory containing the manifest)
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Args)]
struct StampArgs {
    #[command(flatten)]
    root: RootArg,

    /// Build host mode
    #[arg(long, value_enum, default_value_t = BuildMode::Build)]
    mode: BuildMode,

    /// Output directory to mirror `version.json` into (repeatable)
    #[arg(long = "out", value_name = "DIR")]
    outs: Vec<PathBuf>,

    /// Canonical destination directory, relative to the root
    #[arg(long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// Record the HEAD commit hash
    #[arg(long)]
    commit_hash: bool,

    /// Always bump, even when the workspace is unchanged
    #[arg(long)]
    always_bump: bool,

    /// Environment variable whose value overrides `build_id`
    #[arg(long, value_name = "VAR")]
    build_id_env: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ShowArgs {
    #[command(flatten)]
    root: RootArg,

    /// Print the raw `version.json`
    #[arg(long)]
    json: bool,
}

impl StampArgs {
    fn apply(&self, config: &mut StampConfig) {
        if let Some(dest) = &self.destination {
            config.destination.clone_from(dest);
        }
        if self.commit_hash {
            config.enable_commit_hash = true;
        }
        if self.always_bump {
            config.disable_bump_same_status = false;
        }
        if let Some(var) = &self.build_id_env {
            config.build_id_env = Some(var.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init();

    match cli.command {
        Commands::Stamp(ref args) => stamp(args),
        Commands::Show(ref args) => show(args),
        Commands::Fingerprint(ref args) => print_fingerprint(&args.root),
    }
}

fn load_config(root: &Path) -> Result<StampConfig> {
    StampConfig::load_from_root(root)
        .with_context(|| format!("loading configuration for {}", root.display()))
}

fn stamp(args: &StampArgs) -> Result<()> {
    let root = &args.root.root;
    let mut config = load_config(root)?;
    args.apply(&mut config);

    let mut session = StampSession::new(config);
    session.configure(root, args.mode)?;
    if args.mode == BuildMode::Build {
        if args.outs.is_empty() {
            session.persist()?;
        }
        for out in &args.outs {
            session.bundle_written(out)?;
        }
    }
    let report = session.finish()?;

    if args.json {
        let value = serde_json::json!({
            "record": report.record,
            "outcome": report.outcome.map(|o| o.to_string()),
            "written": report.written,
            "degraded": report.degraded.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", report.record);
    }
    Ok(())
}

fn show(args: &ShowArgs) -> Result<()> {
    let root = &args.root.root;
    let config = load_config(root)?;
    let path = publish::canonical_path(root, &config);

    match record::load(&path) {
        Loaded::Present(record) if args.json => print!("{}", record.to_json()?),
        Loaded::Present(record) => println!("{record}"),
        Loaded::Absent => println!("no build recorded ({} not found)", path.display()),
        Loaded::Corrupt(reason) => anyhow::bail!("{reason}"),
    }
    Ok(())
}

fn print_fingerprint(root: &Path) -> Result<()> {
    let config = load_config(root)?;
    let excluded = [
        publish::canonical_path(root, &config),
        side_channel::path(root),
    ];
    let repo = match GixRepo::discover(root) {
        Ok(repo) => repo,
        Err(e) => {
            println!("unavailable: {e}");
            return Ok(());
        }
    };
    match fingerprint::compute(&repo, &excluded) {
        Ok(fp) => println!("{fp}"),
        Err(e) => println!("unavailable: {e}"),
    }
    Ok(())
}
