//! Webmentions for Eyrie.
//!
//! - [`SidecarStore`]: the per-entry `sidecar.json` holding replies and
//!   interactions, mutated only through `update_sidecar`.
//! - [`WebmentionEngine::send_webmentions`]: discovers endpoints for links in
//!   an entry's rendered content and delivers to them, refusing internal
//!   addresses both before discovery and after.
//! - [`WebmentionEngine::receive`]: applies notifications from a receiving
//!   service.

pub mod client;
pub mod engine;
pub mod error;
pub mod html;
pub mod inbound;
pub mod mention;
pub mod sidecar;
pub mod ssrf;

pub use client::{HttpWebmentionClient, WebmentionClient};
pub use engine::{LogNotifier, Notifier, WebmentionConfig, WebmentionEngine};
pub use error::{WebmentionError, WebmentionResult};
pub use inbound::{InboundPayload, Jf2Post};
pub use mention::{Author, Mention, MentionType};
pub use sidecar::{Sidecar, SidecarStore, SIDECAR_FILE};
pub use ssrf::{Resolver, SystemResolver};
