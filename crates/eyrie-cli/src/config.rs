use std::path::{Path, PathBuf};

use anyhow::Context;
use eyrie_index::IndexConfig;
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "eyrie.toml";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub git: GitConfig,
    pub build: BuildSection,
    pub webmentions: WebmentionsConfig,
    pub index: IndexConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Read `path`, or `eyrie.toml` if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Store root; also the generator's source directory and git work tree.
    pub source_dir: PathBuf,
    pub taxonomies: Vec<String>,
    pub sections: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1313/".into(),
            source_dir: PathBuf::from("."),
            taxonomies: vec!["tags".into()],
            sections: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub enabled: bool,
    pub name: String,
    pub email: String,
    pub remote: Option<String>,
    pub branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "Eyrie".into(),
            email: "eyrie@localhost".into(),
            remote: None,
            branch: "main".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub generator: String,
    pub output_dir: PathBuf,
    pub extra_args: Vec<String>,
    pub prune_previous: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            generator: "hugo".into(),
            output_dir: PathBuf::from("public"),
            extra_args: Vec::new(),
            prune_previous: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebmentionsConfig {
    pub secret: String,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for WebmentionsConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            timeout_secs: 10,
            user_agent: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub path: PathBuf,
    pub poll_interval_ms: u64,
    /// Deliveries give up after this many attempts.
    pub max_attempts: u32,
    /// How long a worker holds a claimed item before others may retry it.
    pub lease_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("eyrie-queue.db"),
            poll_interval_ms: 1000,
            max_attempts: 8,
            lease_secs: 300,
        }
    }
}
