//! Snapshot builds for Eyrie.
//!
//! The [`Builder`] runs a [`SiteGenerator`] into a fresh directory under the
//! output root and, only once rendering succeeds, flips the `last` pointer to
//! it. Link checks and HTML reads always resolve against the live snapshot.

pub mod builder;
pub mod error;
pub mod generator;
pub mod snapshot;

pub use builder::{BuildConfig, Builder, ChangeHook};
pub use error::{BuildError, BuildResult};
pub use generator::{HugoGenerator, SiteGenerator};
pub use snapshot::{SnapshotId, POINTER_FILE};
