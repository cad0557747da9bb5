//! In-memory persisters for tests and for running without version control.
//!
//! [`NoopPersister`] drops every notification. [`RecordingPersister`] keeps
//! them in a `Vec` behind a `Mutex` so tests can assert what the store handed
//! off, in order.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::traits::{PersistError, Persister};

/// Persister that accepts and forgets everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPersister;

impl Persister for NoopPersister {
    fn persist(&self, _message: &str, _files: &[PathBuf]) -> Result<(), PersistError> {
        Ok(())
    }
}

/// One recorded call to [`Persister::persist`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistCall {
    pub message: String,
    pub files: Vec<PathBuf>,
}

/// Persister that records every call.
#[derive(Debug, Default)]
pub struct RecordingPersister {
    calls: Mutex<Vec<PersistCall>>,
}

impl RecordingPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<PersistCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Every file handed off so far, in call order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .flat_map(|call| call.files)
            .collect()
    }
}

impl Persister for RecordingPersister {
    fn persist(&self, message: &str, files: &[PathBuf]) -> Result<(), PersistError> {
        self.calls.lock().expect("lock poisoned").push(PersistCall {
            message: message.to_string(),
            files: files.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_order() {
        let p = RecordingPersister::new();
        p.persist("one", &[PathBuf::from("a")]).unwrap();
        p.persist("two", &[PathBuf::from("b"), PathBuf::from("c")]).unwrap();

        let calls = p.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].message, "one");
        assert_eq!(p.files(), vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]);
    }

    #[test]
    fn noop_accepts_everything() {
        assert!(NoopPersister.persist("x", &[]).is_ok());
    }
}
