use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use eyrie_entry::Entry;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{BuildError, BuildResult};
use crate::generator::SiteGenerator;
use crate::snapshot::{self, SnapshotId};

/// Where sources live, where snapshots go, and how they are addressed.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub base_url: Url,
    /// Delete the previous snapshot after switching to a new one.
    pub prune_previous: bool,
}

/// Called with the live snapshot directory whenever it changes.
pub type ChangeHook = Box<dyn Fn(&Path) + Send + Sync>;

#[derive(Default)]
struct State {
    current: Option<SnapshotId>,
    asked: bool,
    /// The on-disk pointer has been read into `current`.
    loaded: bool,
}

/// Owns the rendered snapshots and the pointer to the live one.
///
/// `state` guards `current`; `build_lock` serializes generator runs so that
/// readers only wait for the pointer switch, not for rendering.
pub struct Builder {
    config: BuildConfig,
    generator: Arc<dyn SiteGenerator>,
    on_change: Option<ChangeHook>,
    state: Mutex<State>,
    build_lock: Mutex<()>,
}

impl Builder {
    pub fn new(config: BuildConfig, generator: Arc<dyn SiteGenerator>) -> Self {
        Self {
            config,
            generator,
            on_change: None,
            state: Mutex::new(State::default()),
            build_lock: Mutex::new(()),
        }
    }

    /// Register the hook fired when the live snapshot changes.
    pub fn with_change_hook(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Directory of the live snapshot, if any.
    pub fn current_dir(&self) -> Option<PathBuf> {
        let state = self.state.lock().expect("build state mutex poisoned");
        state.current.as_ref().map(|id| id.dir(&self.config.output_dir))
    }

    /// Returns `true` exactly once per process: on the first call, when no
    /// snapshot pointer exists on disk.
    ///
    /// The first call also adopts an existing snapshot as `current` and fires
    /// the change hook for it.
    pub fn should_build(&self) -> BuildResult<bool> {
        let adopted = {
            let mut state = self.state.lock().expect("build state mutex poisoned");
            if state.asked {
                return Ok(false);
            }
            state.asked = true;
            self.load_pointer(&mut state)?;
            match &state.current {
                Some(id) => id.dir(&self.config.output_dir),
                None => return Ok(true),
            }
        };
        self.fire(&adopted);
        Ok(false)
    }

    /// Adopt the snapshot named by the pointer file, once per process.
    fn load_pointer(&self, state: &mut State) -> BuildResult<()> {
        if state.loaded {
            return Ok(());
        }
        if let Some(id) = snapshot::read_pointer(&self.config.output_dir)? {
            info!(snapshot = %id, "adopting existing snapshot");
            state.current = Some(id);
        }
        state.loaded = true;
        Ok(())
    }

    /// Render a snapshot and make it live.
    ///
    /// With `force_clean` false and a live snapshot, that directory is
    /// re-rendered in place. Otherwise a fresh directory is used. On failure
    /// `current` is left as it was.
    pub fn build(&self, force_clean: bool) -> BuildResult<PathBuf> {
        let _guard = self.build_lock.lock().expect("build mutex poisoned");

        let previous = {
            let mut state = self.state.lock().expect("build state mutex poisoned");
            self.load_pointer(&mut state)?;
            state.current.clone()
        };

        let target = match (&previous, force_clean) {
            (Some(id), false) => id.clone(),
            _ => SnapshotId::from_time(Utc::now()),
        };
        let dest = target.dir(&self.config.output_dir);
        fs::create_dir_all(&dest)?;

        info!(snapshot = %target, in_place = previous.as_ref() == Some(&target), "building site");
        if let Err(e) = self
            .generator
            .render(&self.config.source_dir, &dest, &self.config.base_url)
        {
            warn!(snapshot = %target, error = %e, "build failed");
            if previous.as_ref() != Some(&target) {
                if let Err(cleanup) = fs::remove_dir_all(&dest) {
                    warn!(snapshot = %target, error = %cleanup, "could not remove failed snapshot");
                }
            }
            return Err(e);
        }

        snapshot::write_pointer(&self.config.output_dir, &target)?;
        self.state.lock().expect("build state mutex poisoned").current = Some(target.clone());

        if let Some(old) = previous.filter(|old| *old != target) {
            if self.config.prune_previous {
                let old_dir = old.dir(&self.config.output_dir);
                match fs::remove_dir_all(&old_dir) {
                    Ok(()) => debug!(snapshot = %old, "pruned previous snapshot"),
                    Err(e) => warn!(snapshot = %old, error = %e, "could not prune snapshot"),
                }
            }
        }

        self.fire(&dest);
        Ok(dest)
    }

    /// Returns `true` if `permalink` resolves to a file in the live snapshot.
    pub fn is_link_valid(&self, permalink: &Url) -> bool {
        let Some(rel) = self.relative_path(permalink) else {
            return false;
        };
        let state = self.state.lock().expect("build state mutex poisoned");
        let Some(id) = &state.current else {
            return false;
        };
        let path = id.dir(&self.config.output_dir).join(&rel);
        path.is_file() || path.join("index.html").is_file()
    }

    /// Rendered HTML of `entry` from the live snapshot.
    pub fn entry_html(&self, entry: &Entry) -> BuildResult<String> {
        let permalink = entry.permalink(&self.config.base_url)?;
        let rel = self.relative_path(&permalink).unwrap_or_default();
        let state = self.state.lock().expect("build state mutex poisoned");
        let id = state.current.as_ref().ok_or(BuildError::NoSnapshot)?;
        let file = id.dir(&self.config.output_dir).join(rel).join("index.html");
        Ok(fs::read_to_string(file)?)
    }

    /// Path of `url` below the base URL, or `None` if it lies elsewhere.
    fn relative_path(&self, url: &Url) -> Option<PathBuf> {
        let base = &self.config.base_url;
        if url.origin() != base.origin() {
            return None;
        }
        let base_path = base.path().trim_end_matches('/');
        let rest = url.path().strip_prefix(base_path)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        let mut rel = PathBuf::new();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return None;
            }
            rel.push(segment);
        }
        Some(rel)
    }

    fn fire(&self, dir: &Path) {
        if let Some(hook) = &self.on_change {
            hook(dir);
        }
    }
}
