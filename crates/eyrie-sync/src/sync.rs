use std::path::{Path, PathBuf};
use std::sync::Mutex;

use eyrie_store::{PersistError, Persister};
use tracing::{debug, info};

use crate::error::SyncResult;
use crate::git::{self, GitIdentity};

/// Subject line of a commit that folds several distinct messages together.
pub const SYNC_SUBJECT: &str = "Synchronization";

/// Remote and branch that [`GitSync::sync`] pulls from and pushes to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Upstream {
    remote: String,
    branch: String,
}

/// Stages store writes in a git working tree and commits them in batches.
///
/// One mutex guards the pending message list and the git subprocess sequence,
/// so `persist` and `sync` never interleave on the same instance.
#[derive(Debug)]
pub struct GitSync {
    workdir: PathBuf,
    identity: GitIdentity,
    upstream: Option<Upstream>,
    pending: Mutex<Vec<String>>,
}

impl GitSync {
    /// Sync engine for the working tree at `workdir`, without a remote.
    pub fn new(workdir: impl Into<PathBuf>, identity: GitIdentity) -> Self {
        Self {
            workdir: workdir.into(),
            identity,
            upstream: None,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Pull from and push to `remote`/`branch` during [`sync`](Self::sync).
    pub fn with_remote(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.upstream = Some(Upstream {
            remote: remote.into(),
            branch: branch.into(),
        });
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Messages recorded since the last successful commit.
    pub fn pending_messages(&self) -> Vec<String> {
        self.pending.lock().expect("sync mutex poisoned").clone()
    }

    /// Stage `files` and remember `message` for the next commit.
    pub fn stage(&self, message: &str, files: &[PathBuf]) -> SyncResult<()> {
        let mut pending = self.pending.lock().expect("sync mutex poisoned");
        if !files.is_empty() {
            let names: Vec<String> = files
                .iter()
                .map(|f| f.to_string_lossy().into_owned())
                .collect();
            let mut args: Vec<&str> = vec!["add", "--all", "--"];
            args.extend(names.iter().map(String::as_str));
            git::run_git(&self.workdir, &args)?;
        }
        pending.push(message.to_string());
        debug!(message, files = files.len(), "staged");
        Ok(())
    }

    /// Commit pending work, pull, push, and return the files the pull changed.
    ///
    /// An empty commit is skipped silently. Pull and push failures carry git's
    /// own output; a failed push leaves the local commit in place for a later
    /// retry.
    pub fn sync(&self) -> SyncResult<Vec<PathBuf>> {
        let mut pending = self.pending.lock().expect("sync mutex poisoned");

        if !pending.is_empty() {
            if git::has_staged_changes(&self.workdir)? {
                let message = commit_message(&pending);
                git::run(
                    git::git_commit_command(&self.workdir, &self.identity),
                    &["commit", "--quiet", "-m", &message],
                )?;
                info!(messages = pending.len(), "committed pending changes");
            } else {
                debug!("nothing staged; skipping commit");
            }
            pending.clear();
        }

        let Some(upstream) = &self.upstream else {
            return Ok(Vec::new());
        };

        let before = git::head(&self.workdir)?;
        git::run(
            git::git_commit_command(&self.workdir, &self.identity),
            &[
                "pull",
                "--quiet",
                "--no-edit",
                "--no-rebase",
                &upstream.remote,
                &upstream.branch,
            ],
        )?;
        let after = git::head(&self.workdir)?;

        let refspec = format!("HEAD:{}", upstream.branch);
        git::run_git(
            &self.workdir,
            &["push", "--quiet", &upstream.remote, &refspec],
        )?;

        let changed = match (before, after) {
            (_, None) => Vec::new(),
            (Some(b), Some(a)) if b == a => Vec::new(),
            (Some(b), Some(a)) => {
                git::run_git_stdout(&self.workdir, &["diff", "--name-only", &b, &a])?
                    .lines()
                    .map(PathBuf::from)
                    .collect()
            }
            (None, Some(a)) => {
                git::run_git_stdout(&self.workdir, &["ls-tree", "-r", "--name-only", &a])?
                    .lines()
                    .map(PathBuf::from)
                    .collect()
            }
        };
        info!(changed = changed.len(), remote = %upstream.remote, "synchronized");
        Ok(changed)
    }
}

impl Persister for GitSync {
    fn persist(&self, message: &str, files: &[PathBuf]) -> Result<(), PersistError> {
        self.stage(message, files).map_err(Into::into)
    }
}

/// One message as-is; several distinct ones under [`SYNC_SUBJECT`].
fn commit_message(messages: &[String]) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for m in messages {
        if !unique.contains(&m.as_str()) {
            unique.push(m);
        }
    }
    match unique.as_slice() {
        [single] => single.to_string(),
        many => {
            let mut text = format!("{SYNC_SUBJECT}\n\n");
            for m in many {
                text.push_str("- ");
                text.push_str(m);
                text.push('\n');
            }
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::git::run_git;
    use eyrie_entry::{Entry, SiteLayout};
    use eyrie_store::ContentStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn git_available() -> bool {
        std::process::Command::new("git").arg("--version").output().is_ok()
    }

    fn identity() -> GitIdentity {
        GitIdentity::new("Test", "test@test.com")
    }

    /// A bare remote holding one commit on `main`.
    fn create_remote(temp: &TempDir) -> PathBuf {
        let remote = temp.path().join("remote.git");
        std::fs::create_dir_all(&remote).unwrap();
        run_git(&remote, &["init", "--bare"]).unwrap();

        let seed = temp.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        run_git(&seed, &["init"]).unwrap();
        std::fs::write(seed.join("README.md"), "# Site").unwrap();
        run_git(&seed, &["add", "."]).unwrap();
        git::run(
            git::git_commit_command(&seed, &identity()),
            &["commit", "-m", "Initial commit"],
        )
        .unwrap();
        run_git(&seed, &["push", remote.to_str().unwrap(), "HEAD:main"]).unwrap();
        run_git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]).unwrap();
        remote
    }

    fn clone(temp: &TempDir, remote: &Path, name: &str) -> GitSync {
        run_git(
            temp.path(),
            &["clone", "--quiet", remote.to_str().unwrap(), name],
        )
        .unwrap();
        GitSync::new(temp.path().join(name), identity()).with_remote("origin", "main")
    }

    fn last_message(dir: &Path) -> String {
        git::run_git_stdout(dir, &["log", "-1", "--format=%B"]).unwrap()
    }

    #[test]
    fn commit_message_dedups_and_combines() {
        assert_eq!(commit_message(&["a".into(), "a".into()]), "a");
        assert_eq!(
            commit_message(&["a".into(), "b".into(), "a".into()]),
            "Synchronization\n\n- a\n- b\n"
        );
    }

    #[test]
    fn persist_stages_without_committing() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let remote = create_remote(&temp);
        let sync = clone(&temp, &remote, "a");
        let head_before = git::head(sync.workdir()).unwrap();

        std::fs::write(sync.workdir().join("x.txt"), "x").unwrap();
        sync.persist("add x", &[PathBuf::from("x.txt")]).unwrap();

        assert_eq!(git::head(sync.workdir()).unwrap(), head_before);
        assert!(git::has_staged_changes(sync.workdir()).unwrap());
        assert_eq!(sync.pending_messages(), vec!["add x".to_string()]);
    }

    #[test]
    fn sync_round_trips_between_clones() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let remote = create_remote(&temp);
        let a = Arc::new(clone(&temp, &remote, "a"));
        let b = clone(&temp, &remote, "b");

        let store = ContentStore::open(a.workdir(), SiteLayout::default(), a.clone()).unwrap();
        store.save(&Entry::new("/notes/one/", "first")).unwrap();
        store.save(&Entry::new("/notes/one/", "first, edited")).unwrap();
        store.save(&Entry::new("/notes/two/", "second")).unwrap();

        assert!(a.sync().unwrap().is_empty());
        assert!(a.pending_messages().is_empty());
        assert_eq!(
            last_message(a.workdir()),
            "Synchronization\n\n- update /notes/one/\n- update /notes/two/"
        );

        let mut changed = b.sync().unwrap();
        changed.sort();
        assert_eq!(
            changed,
            vec![
                PathBuf::from("content/notes/one/index.md"),
                PathBuf::from("content/notes/two/index.md"),
            ]
        );
        assert!(b.workdir().join("content/notes/two/index.md").is_file());
    }

    #[test]
    fn sync_with_nothing_staged_is_ok() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let remote = create_remote(&temp);
        let sync = clone(&temp, &remote, "a");
        let head_before = git::head(sync.workdir()).unwrap();

        // A message without a content change must not produce an empty commit.
        sync.persist("touch nothing", &[]).unwrap();
        assert!(sync.sync().unwrap().is_empty());
        assert_eq!(git::head(sync.workdir()).unwrap(), head_before);
    }

    #[test]
    fn pull_failure_is_verbatim() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let remote = create_remote(&temp);
        let sync = GitSync {
            upstream: Some(Upstream {
                remote: temp.path().join("missing.git").to_string_lossy().into_owned(),
                branch: "main".into(),
            }),
            ..clone(&temp, &remote, "a")
        };

        match sync.sync().unwrap_err() {
            SyncError::CommandFailed { command, output } => {
                assert!(command.starts_with("git pull"), "{command}");
                assert!(!output.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
