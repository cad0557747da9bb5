//! Per-entry sidecar files.
//!
//! `content/<id>/sidecar.json` holds the social context gathered for an
//! entry. All changes go through [`SidecarStore::update_sidecar`], which keeps
//! both lists sorted newest first and deletes the file once it is empty.

use std::path::PathBuf;
use std::sync::Arc;

use eyrie_entry::EntryId;
use eyrie_store::ContentStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WebmentionResult;
use crate::mention::Mention;

pub const SIDECAR_FILE: &str = "sidecar.json";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    /// Context about what the entry itself responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub replies: Vec<Mention>,
    #[serde(default)]
    pub interactions: Vec<Mention>,
}

impl Sidecar {
    pub fn is_empty(&self) -> bool {
        self.context.is_none() && self.replies.is_empty() && self.interactions.is_empty()
    }

    /// Stable sort of both lists by `published`, newest first. Undated
    /// mentions go last.
    fn sort(&mut self) {
        for list in [&mut self.replies, &mut self.interactions] {
            list.sort_by(|a, b| b.published.cmp(&a.published));
        }
    }
}

/// Reads and rewrites sidecars through the content store.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    store: Arc<ContentStore>,
}

impl SidecarStore {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    pub fn content_store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    fn path(&self, id: &EntryId) -> PathBuf {
        self.store.entry_dir(id).join(SIDECAR_FILE)
    }

    /// Load a sidecar; a missing file is an empty sidecar.
    pub fn load(&self, id: &EntryId) -> WebmentionResult<Sidecar> {
        match self.store.read_json(self.path(id)) {
            Ok(sidecar) => Ok(sidecar),
            Err(e) if e.is_not_found() => Ok(Sidecar::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load, apply `transform`, sort, and write back (or delete when empty).
    pub fn update_sidecar<F>(&self, id: &EntryId, transform: F) -> WebmentionResult<Sidecar>
    where
        F: FnOnce(&mut Sidecar),
    {
        let mut sidecar = self.load(id)?;
        transform(&mut sidecar);
        sidecar.sort();

        let path = self.path(id);
        let message = format!("update sidecar for {id}");
        if sidecar.is_empty() {
            if self.store.remove_file(&path, &message)? {
                debug!(id = %id, "removed empty sidecar");
            }
        } else {
            self.store.write_json(&path, &sidecar, &message)?;
        }
        Ok(sidecar)
    }

    /// Insert `mention`, replacing any record with the same URL or source.
    ///
    /// `source_or_url` is the URL the notification came from. A matching
    /// record in the other list (the mention changed kind) is dropped.
    pub fn add_or_update_webmention(
        &self,
        id: &EntryId,
        mut mention: Mention,
        source_or_url: &str,
    ) -> WebmentionResult<Sidecar> {
        if mention.source.is_empty() && source_or_url != mention.url {
            mention.source = source_or_url.to_string();
        }
        let url = mention.url.clone();

        self.update_sidecar(id, move |sidecar| {
            let keys = [url.as_str(), source_or_url];
            let (target, other) = if mention.kind.is_interaction() {
                (&mut sidecar.interactions, &mut sidecar.replies)
            } else {
                (&mut sidecar.replies, &mut sidecar.interactions)
            };
            other.retain(|m| !m.matches_any(&keys));

            match target.iter().position(|m| m.matches_any(&keys)) {
                Some(i) => {
                    target[i] = mention;
                    target.retain({
                        let mut seen = false;
                        move |m| {
                            if m.matches_any(&keys) {
                                let keep = !seen;
                                seen = true;
                                keep
                            } else {
                                true
                            }
                        }
                    });
                }
                None => target.push(mention),
            }
        })
    }

    /// Remove every record whose URL or source is `source_or_url`.
    pub fn delete_webmention(
        &self,
        id: &EntryId,
        source_or_url: &str,
    ) -> WebmentionResult<Sidecar> {
        self.update_sidecar(id, |sidecar| {
            let keys = [source_or_url];
            sidecar.replies.retain(|m| !m.matches_any(&keys));
            sidecar.interactions.retain(|m| !m.matches_any(&keys));
        })
    }
}
