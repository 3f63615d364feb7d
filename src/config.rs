//! Configuration module for the library assistant index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LIBDESK_` and use double underscores
//! to separate nested levels:
//! - `LIBDESK_CHUNKING__CHUNK_SIZE=600` sets `chunking.chunk_size`
//! - `LIBDESK_EMBEDDING__MODEL=BGESmallENV15` sets `embedding.model`
//! - `LIBDESK_INDEX__LOCK_STALE_AFTER_SECS=60` sets `index.lock_stale_after_secs`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::documents::{ChunkingConfig, DocumentKind, FeedConfig};

/// Directory holding the settings file, searched from the current directory upward.
pub const CONFIG_DIR: &str = ".libdesk";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid chunking configuration: {0}")]
    Chunking(String),

    #[error("Unknown embedding model '{0}'")]
    UnknownModel(String),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .libdesk is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// JSON feeds written by the crawler
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the index artifacts and manifest
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Age after which a leftover build lock is treated as orphaned
    #[serde(default = "default_lock_stale_after_secs")]
    pub lock_stale_after_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Upper bound for a single embedding call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Where downloaded model files are cached
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks returned when the caller does not ask for a count
    #[serde(default = "default_k")]
    pub default_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `cache = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".libdesk/index")
}
fn default_lock_stale_after_secs() -> u64 {
    600
}
fn default_embedding_model() -> String {
    "MultilingualE5Small".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_model_cache_dir() -> PathBuf {
    PathBuf::from(".libdesk/models")
}
fn default_true() -> bool {
    true
}
fn default_k() -> usize {
    5
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new("database/notices.json", DocumentKind::Notice),
        FeedConfig::new("database/detail_data.json", DocumentKind::Detail),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            feeds: default_feeds(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            lock_stale_after_secs: default_lock_stale_after_secs(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
            cache_dir: default_model_cache_dir(),
            show_download_progress: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let current = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_for(&current)
    }

    /// Load configuration, searching for `.libdesk/settings.toml` from `start` upward.
    pub fn load_for(start: &Path) -> Result<Self, Box<figment::Error>> {
        let root = Self::find_workspace_root(start);
        let config_path = root
            .as_ref()
            .map(|r| r.join(CONFIG_DIR).join(SETTINGS_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = root;
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref())
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    // <root>/.libdesk/settings.toml
                    settings.workspace_root = path
                        .as_ref()
                        .parent()
                        .and_then(Path::parent)
                        .map(Path::to_path_buf);
                }
                settings
            })
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Double underscore (__) separates nested levels, single underscore stays
            .merge(
                Env::prefixed("LIBDESK_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
    }

    /// Find the workspace root by looking for a .libdesk directory
    /// from `start` up to the filesystem root.
    fn find_workspace_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "embedding.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.retrieval.default_k == 0 {
            return Err(ConfigError::Invalid {
                key: "retrieval.default_k",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Directory that relative paths in the settings are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.index.path)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let current = std::env::current_dir()?;
        Self::init_config_file_in(&current, force)
    }

    /// Create a default settings file under `root/.libdesk/`
    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        // workspace_root is detected on load, never written
        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
