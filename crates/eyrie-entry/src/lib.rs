//! Entry model for Eyrie.
//!
//! Every other Eyrie crate depends on `eyrie-entry`. It defines what a post
//! is in memory and how it is laid out as text on disk.
//!
//! # Key Types
//!
//! - [`EntryId`] -- Canonical slash-delimited entry path (`/posts/hello/`)
//! - [`FrontMatter`] -- Typed metadata block with a lossless extension map
//! - [`Value`] -- Closed tagged value used for unrecognized front-matter keys
//! - [`Entry`] -- Front matter plus markdown body
//! - [`SiteLayout`] -- Taxonomy rules deciding which IDs are list pages
//!
//! # Codec
//!
//! [`codec::decode`] and [`codec::encode`] convert between an [`Entry`] and
//! its textual form:
//!
//! ```text
//! ---
//! title: Hello
//! ---
//!
//! Body text.
//! ```

pub mod codec;
pub mod entry;
pub mod error;
pub mod frontmatter;
pub mod id;
pub mod value;

pub use codec::{decode, encode};
pub use entry::{Entry, SiteLayout};
pub use error::{EntryError, EntryResult};
pub use frontmatter::FrontMatter;
pub use id::{clean_id, EntryId};
pub use value::Value;
