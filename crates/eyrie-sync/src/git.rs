//! Thin wrappers around the `git` binary.
//!
//! Every command runs with system and global config disabled and terminal
//! prompts off, so behaviour does not depend on the host's git setup.

use std::path::Path;
use std::process::{Command, Output};

use crate::error::{SyncError, SyncResult};

/// Author and committer identity for sync commits, passed to git via
/// `-c user.name=` / `-c user.email=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl GitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A git command with a clean environment.
pub(crate) fn git_command(workdir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

/// A git command that may create commits.
pub(crate) fn git_commit_command(workdir: &Path, identity: &GitIdentity) -> Command {
    let mut cmd = git_command(workdir);
    cmd.arg("-c").arg(format!("user.name={}", identity.name));
    cmd.arg("-c").arg(format!("user.email={}", identity.email));
    cmd
}

/// Run a prepared command; non-zero exit becomes [`SyncError::CommandFailed`].
pub(crate) fn run(mut cmd: Command, args: &[&str]) -> SyncResult<Output> {
    let output = cmd.args(args).output()?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(command_failed(args, &output))
    }
}

/// Run a git command in `workdir`.
pub fn run_git(workdir: &Path, args: &[&str]) -> SyncResult<Output> {
    run(git_command(workdir), args)
}

/// Run a git command and return trimmed stdout.
pub fn run_git_stdout(workdir: &Path, args: &[&str]) -> SyncResult<String> {
    let output = run_git(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// `HEAD`'s commit id, or `None` in a repository without commits.
pub fn head(workdir: &Path) -> SyncResult<Option<String>> {
    let output = git_command(workdir)
        .args(["rev-parse", "--verify", "--quiet", "HEAD"])
        .output()?;
    // --quiet makes a missing HEAD exit 1 with no output.
    match output.status.code() {
        Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string())),
        Some(1) => Ok(None),
        _ => Err(command_failed(&["rev-parse", "--verify", "--quiet", "HEAD"], &output)),
    }
}

/// Returns `true` if the index differs from `HEAD`.
pub fn has_staged_changes(workdir: &Path) -> SyncResult<bool> {
    let output = git_command(workdir)
        .args(["diff", "--cached", "--quiet"])
        .output()?;
    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(command_failed(&["diff", "--cached", "--quiet"], &output)),
    }
}

fn command_failed(args: &[&str], output: &Output) -> SyncError {
    let mut text = String::from_utf8_lossy(&output.stderr).to_string();
    if text.trim().is_empty() {
        text = String::from_utf8_lossy(&output.stdout).to_string();
    }
    SyncError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        output: text.trim_end().to_string(),
    }
}
