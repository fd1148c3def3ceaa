//! Shared test helpers for buildmark integration tests.
//!
//! All tests use temp directories: no side effects on the real repo.
//! Each test gets its own project via `setup_project()` (plain directory) or
//! `setup_git_project()` (git repository with one commit).

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Write a `package.json` declaring `version`.
pub fn write_manifest(dir: &Path, version: &str) {
    std::fs::write(
        dir.join("package.json"),
        format!("{{\n  \"name\": \"web\",\n  \"version\": \"{version}\"\n}}\n"),
    )
    .unwrap();
}

/// Create a project directory with a manifest and one source file, outside
/// any git repository.
pub fn setup_project(version: &str) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    write_manifest(dir.path(), version);
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/app.js"), "export default 1;\n").unwrap();
    dir
}

/// Create a project inside a fresh git repository with everything committed.
pub fn setup_git_project(version: &str) -> TempDir {
    let dir = setup_project(version);
    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["config", "user.email", "test@test.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-q", "-m", "initial commit"]);
    dir
}

/// True when no git repository encloses `dir`; tests about non-git projects
/// only assert under this condition.
pub fn outside_git(dir: &Path) -> bool {
    !Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(dir)
        .output()
        .is_ok_and(|o| o.status.success())
}

/// Run a git command in the given directory. Panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {}: {e}", args.join(" ")));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "git {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.trim().to_string()
}

/// Rewrite a tracked file and pin its mtime, so fingerprints are predictable.
pub fn edit(dir: &Path, rel_path: &str, content: &str, mtime_secs: i64) {
    let path = dir.join(rel_path);
    std::fs::write(&path, content).unwrap();
    filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(mtime_secs, 0)).unwrap();
}

/// Parse a `version.json`.
pub fn read_record(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap()
}

/// Run buildmark with the given args in the given directory.
pub fn buildmark_in(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_buildmark"));
    cmd.args(args)
        .current_dir(dir)
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .env_remove("BUILDMARK_LOG_FORMAT")
        .env("BUILDMARK_LOG", "info");
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.output().expect("failed to execute buildmark")
}

/// Run buildmark and assert it succeeds. Returns (stdout, stderr).
pub fn buildmark_ok(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> (String, String) {
    let out = buildmark_in(dir, args, env);
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    assert!(
        out.status.success(),
        "buildmark {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    (stdout, stderr)
}

/// Run buildmark and assert it fails. Returns stderr as string.
pub fn buildmark_fails(dir: &Path, args: &[&str]) -> String {
    let out = buildmark_in(dir, args, &[]);
    assert!(
        !out.status.success(),
        "Expected buildmark {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}
