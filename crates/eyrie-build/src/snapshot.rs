//! Snapshot identifiers and the `last` pointer file.
//!
//! Each build renders into `<output_root>/<snapshot id>/`. The id of the live
//! snapshot is kept as raw bytes in `<output_root>/last`, replaced atomically.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

/// Name of the pointer file inside the output root.
pub const POINTER_FILE: &str = "last";

const SNAPSHOT_DOMAIN: &str = "eyrie-snapshot-v1";

/// Identifier of one rendered snapshot; also its directory name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Derive an id from a timestamp (domain-separated BLAKE3, hex).
    pub fn from_time(at: DateTime<Utc>) -> Self {
        let nanos = at.timestamp_nanos_opt().unwrap_or_else(|| at.timestamp_micros() * 1000);
        let mut hasher = blake3::Hasher::new();
        hasher.update(SNAPSHOT_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(&nanos.to_be_bytes());
        Self(hex::encode(&hasher.finalize().as_bytes()[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory of this snapshot under `output_root`.
    pub fn dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.0)
    }
}

/// Read the pointer file. A missing or empty file means no snapshot.
pub fn read_pointer(output_root: &Path) -> std::io::Result<Option<SnapshotId>> {
    match fs::read(output_root.join(POINTER_FILE)) {
        Ok(bytes) => {
            let id = String::from_utf8_lossy(&bytes).trim().to_string();
            Ok((!id.is_empty()).then_some(SnapshotId(id)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Atomically point `last` at `id`.
pub fn write_pointer(output_root: &Path, id: &SnapshotId) -> std::io::Result<()> {
    fs::create_dir_all(output_root)?;
    let mut tmp = NamedTempFile::new_in(output_root)?;
    tmp.write_all(id.as_str().as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(output_root.join(POINTER_FILE))
        .map_err(|e| e.error)?;
    Ok(())
}
