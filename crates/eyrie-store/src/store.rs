use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use eyrie_entry::{codec, Entry, EntryId, SiteLayout};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::atomic::atomic_write;
use crate::error::{StoreError, StoreResult};
use crate::traits::Persister;

/// Directory (relative to the root) holding entry directories.
pub const CONTENT_DIR: &str = "content";
/// Filename of a regular entry inside its directory.
pub const INDEX_FILE: &str = "index.md";
/// Filename of a list (section/taxonomy) entry inside its directory.
pub const LIST_INDEX_FILE: &str = "_index.md";

/// File-backed store of entries and auxiliary data files.
pub struct ContentStore {
    root: PathBuf,
    layout: SiteLayout,
    persister: Arc<dyn Persister>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("root", &self.root)
            .field("layout", &self.layout)
            .finish()
    }
}

/// What listing found at an entry path.
enum Listed {
    Entry(Entry),
    /// The entry exists but is never rendered; callers never see this.
    Ignored,
}

impl ContentStore {
    /// Open a store rooted at `root`. The directory is created if missing.
    pub fn open(
        root: impl Into<PathBuf>,
        layout: SiteLayout,
        persister: Arc<dyn Persister>,
    ) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(CONTENT_DIR))?;
        Ok(Self {
            root,
            layout,
            persister,
        })
    }

    /// The store root on disk.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The list-detection rules in effect.
    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    // ---------------------------------------------------------------
    // Raw files
    // ---------------------------------------------------------------

    /// Read a file relative to the root.
    pub fn read_file(&self, path: impl AsRef<Path>) -> StoreResult<Vec<u8>> {
        let rel = validate_relative(path.as_ref())?;
        fs::read(self.root.join(&rel)).map_err(|e| not_found_or_io(e, &rel))
    }

    /// Returns `true` if a file exists at `path` relative to the root.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        validate_relative(path.as_ref())
            .map(|rel| self.root.join(rel).is_file())
            .unwrap_or(false)
    }

    /// Atomically write one file and hand it to the persister.
    pub fn write_file(
        &self,
        path: impl AsRef<Path>,
        data: &[u8],
        message: &str,
    ) -> StoreResult<()> {
        let rel = validate_relative(path.as_ref())?;
        atomic_write(&self.root.join(&rel), data)?;
        debug!(path = %rel.display(), bytes = data.len(), "wrote file");
        self.persist(message, vec![rel])
    }

    /// Write several files, then hand the whole set to the persister as one
    /// change.
    ///
    /// If any write fails the call returns that error and nothing is handed
    /// to the persister. Files written before the failure stay on disk.
    pub fn write_files(
        &self,
        files: &BTreeMap<PathBuf, Vec<u8>>,
        message: &str,
    ) -> StoreResult<()> {
        let rels = files
            .keys()
            .map(|p| validate_relative(p))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut written: Vec<PathBuf> = Vec::with_capacity(rels.len());
        for (rel, data) in rels.iter().zip(files.values()) {
            if let Err(e) = atomic_write(&self.root.join(rel), data) {
                warn!(
                    failed = %rel.display(),
                    already_written = written.len(),
                    error = %e,
                    "batch write aborted; earlier files are left in place"
                );
                return Err(e.into());
            }
            written.push(rel.clone());
        }

        debug!(count = written.len(), "wrote file batch");
        self.persist(message, written)
    }

    /// Delete a file and hand the removal to the persister.
    ///
    /// Returns `Ok(false)` when there was nothing to delete.
    pub fn remove_file(&self, path: impl AsRef<Path>, message: &str) -> StoreResult<bool> {
        let rel = validate_relative(path.as_ref())?;
        match fs::remove_file(self.root.join(&rel)) {
            Ok(()) => {
                debug!(path = %rel.display(), "removed file");
                self.persist(message, vec![rel])?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and deserialize a JSON file.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StoreResult<T> {
        let rel = validate_relative(path.as_ref())?;
        let data = self.read_file(&rel)?;
        serde_json::from_slice(&data).map_err(|e| StoreError::Json {
            path: rel,
            reason: e.to_string(),
        })
    }

    /// Serialize a value as pretty JSON and write it.
    pub fn write_json<T: Serialize>(
        &self,
        path: impl AsRef<Path>,
        value: &T,
        message: &str,
    ) -> StoreResult<()> {
        let rel = validate_relative(path.as_ref())?;
        let mut data = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Json {
            path: rel.clone(),
            reason: e.to_string(),
        })?;
        data.push(b'\n');
        self.write_file(rel, &data, message)
    }

    // ---------------------------------------------------------------
    // Entries
    // ---------------------------------------------------------------

    /// Directory of an entry, relative to the root.
    pub fn entry_dir(&self, id: &EntryId) -> PathBuf {
        let dir = Path::new(CONTENT_DIR);
        if id.is_root() {
            dir.to_path_buf()
        } else {
            dir.join(id.relative_path())
        }
    }

    /// File an entry is saved to, relative to the root.
    pub fn entry_path(&self, id: &EntryId) -> PathBuf {
        let name = if self.layout.is_list(id) {
            LIST_INDEX_FILE
        } else {
            INDEX_FILE
        };
        self.entry_dir(id).join(name)
    }

    /// Load one entry by ID.
    ///
    /// Both filenames are tried, the one the layout prefers first.
    pub fn get(&self, id: &EntryId) -> StoreResult<Entry> {
        let preferred = self.entry_path(id);
        let other = self.entry_dir(id).join(
            if preferred.ends_with(LIST_INDEX_FILE) {
                INDEX_FILE
            } else {
                LIST_INDEX_FILE
            },
        );

        for candidate in [&preferred, &other] {
            match fs::read_to_string(self.root.join(candidate)) {
                Ok(text) => return Ok(codec::decode(id.clone(), &text)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::NotFound(preferred))
    }

    /// Load every entry under the content directory, sorted by ID.
    ///
    /// Entries marked as never rendered are left out. With `include_lists`
    /// false, `_index.md` files and IDs the layout treats as lists are left
    /// out as well.
    pub fn get_all(&self, include_lists: bool) -> StoreResult<Vec<Entry>> {
        let content_root = self.root.join(CONTENT_DIR);
        let mut entries = Vec::new();

        for item in WalkDir::new(&content_root).follow_links(false) {
            let item = item.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk loop detected"))
            })?;
            if !item.file_type().is_file() {
                continue;
            }

            let name = item.file_name().to_string_lossy();
            let is_list_file = match name.as_ref() {
                INDEX_FILE => false,
                LIST_INDEX_FILE => true,
                _ => continue,
            };

            let id = id_from_entry_file(&content_root, item.path());
            if !include_lists && (is_list_file || self.layout.is_list(&id)) {
                continue;
            }

            match self.load_listed(&id, item.path())? {
                Listed::Entry(entry) => entries.push(entry),
                Listed::Ignored => debug!(id = %id, "skipping never-rendered entry"),
            }
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// Encode and write an entry, then hand its file to the persister.
    ///
    /// Returns the path written, relative to the root.
    pub fn save(&self, entry: &Entry) -> StoreResult<PathBuf> {
        let path = self.entry_path(&entry.id);
        let text = codec::encode(entry)?;
        self.write_file(&path, text.as_bytes(), &format!("update {}", entry.id))?;
        Ok(path)
    }

    fn load_listed(&self, id: &EntryId, path: &Path) -> StoreResult<Listed> {
        let text = fs::read_to_string(path)?;
        let entry = codec::decode(id.clone(), &text)?;
        if entry.front_matter.is_never_rendered() {
            return Ok(Listed::Ignored);
        }
        Ok(Listed::Entry(entry))
    }

    fn persist(&self, message: &str, files: Vec<PathBuf>) -> StoreResult<()> {
        self.persister
            .persist(message, &files)
            .map_err(StoreError::Persist)
    }
}

/// Derive an entry ID from the path of its index file.
fn id_from_entry_file(content_root: &Path, file: &Path) -> EntryId {
    let dir = file.parent().unwrap_or(content_root);
    let rel = dir.strip_prefix(content_root).unwrap_or(Path::new(""));
    let joined: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    EntryId::new(joined.join("/"))
}

/// Reject absolute paths and any `..` component.
fn validate_relative(path: &Path) -> StoreResult<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return Err(StoreError::InvalidPath(path.display().to_string())),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(StoreError::InvalidPath(path.display().to_string()));
    }
    Ok(clean)
}

fn not_found_or_io(e: std::io::Error, rel: &Path) -> StoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(rel.to_path_buf())
    } else {
        StoreError::Io(e)
    }
}
