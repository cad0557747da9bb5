//! Git-backed durability for the Eyrie content store.
//!
//! [`GitSync`] is the store's [`eyrie_store::Persister`]: every write is
//! staged right away, and the commit messages pile up until [`GitSync::sync`]
//! folds them into one commit, pulls, pushes, and reports which files the
//! pull brought in.

pub mod error;
pub mod git;
pub mod sync;

pub use error::{SyncError, SyncResult};
pub use git::GitIdentity;
pub use sync::{GitSync, SYNC_SUBJECT};
