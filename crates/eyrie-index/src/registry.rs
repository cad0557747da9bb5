use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::memory::MemoryIndex;
use crate::sqlite::SqliteIndex;
use crate::traits::IndexBackend;

/// Which backend to build, and where it keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub kind: String,
    pub path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: "memory".into(),
            path: None,
        }
    }
}

pub type BackendConstructor = fn(&IndexConfig) -> IndexResult<Arc<dyn IndexBackend>>;

/// Backend kinds available to this process, keyed by tag.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `memory` and `sqlite` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", |_| {
            let backend: Arc<dyn IndexBackend> = Arc::new(MemoryIndex::new());
            Ok(backend)
        });
        registry.register("sqlite", |config| {
            let backend: Arc<dyn IndexBackend> = match &config.path {
                Some(path) => Arc::new(SqliteIndex::open(path)?),
                None => Arc::new(SqliteIndex::open_in_memory()?),
            };
            Ok(backend)
        });
        registry
    }

    /// Add or replace the constructor for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, constructor: BackendConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(&self, config: &IndexConfig) -> IndexResult<Arc<dyn IndexBackend>> {
        let constructor = self
            .constructors
            .get(&config.kind)
            .ok_or_else(|| IndexError::UnknownBackend(config.kind.clone()))?;
        constructor(config)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::QueryOptions;

    #[test]
    fn defaults_build_both_backends() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.kinds().collect::<Vec<_>>(), ["memory", "sqlite"]);

        for kind in ["memory", "sqlite"] {
            let backend = registry
                .build(&IndexConfig {
                    kind: kind.into(),
                    path: None,
                })
                .unwrap();
            assert_eq!(backend.count(&QueryOptions::default()).unwrap(), 0);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = BackendRegistry::with_defaults()
            .build(&IndexConfig {
                kind: "elastic".into(),
                path: None,
            })
            .err()
            .unwrap();
        assert!(matches!(err, IndexError::UnknownBackend(k) if k == "elastic"));
    }

    #[test]
    fn custom_registration() {
        let mut registry = BackendRegistry::new();
        registry.register("scratch", |_| {
            let backend: Arc<dyn IndexBackend> = Arc::new(MemoryIndex::new());
            Ok(backend)
        });
        assert!(registry.build(&IndexConfig { kind: "scratch".into(), path: None }).is_ok());
        assert!(registry.build(&IndexConfig::default()).is_err());
    }
}
