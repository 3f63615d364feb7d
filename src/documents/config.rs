//! Configuration types for chunking and source feeds.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::DocumentKind;
use crate::config::ConfigError;

/// Configuration for document chunking.
///
/// Every field is part of the corpus fingerprint, so changing any of them
/// invalidates the persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Chunking strategy to use.
    #[serde(default)]
    pub strategy: ChunkingStrategy,

    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between adjacent chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            chunk_size,
            chunk_overlap,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Chunking(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Chunking(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }
}

/// Strategy for splitting documents into chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Recursive character splitting: paragraphs, then lines, then words,
    /// then characters, merged up to the target size with overlap.
    #[default]
    Recursive,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategy::Recursive => "recursive",
        }
    }
}

/// One JSON feed written by the crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub path: PathBuf,

    /// Shape of the records in this feed.
    pub kind: DocumentKind,
}

impl FeedConfig {
    pub fn new(path: impl Into<PathBuf>, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_config_defaults() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.strategy, ChunkingStrategy::Recursive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunking_config_validation() {
        assert!(ChunkingConfig::new(0, 0).validate().is_err());
        assert!(ChunkingConfig::new(100, 100).validate().is_err());
        assert!(ChunkingConfig::new(100, 150).validate().is_err());
        assert!(ChunkingConfig::new(100, 99).validate().is_ok());
        assert!(ChunkingConfig::new(1, 0).validate().is_ok());
    }

    #[test]
    fn test_feed_config_from_toml() {
        let feed: FeedConfig = toml::from_str(
            r#"
path = "database/notices.json"
kind = "notice"
"#,
        )
        .unwrap();
        assert_eq!(feed.kind, DocumentKind::Notice);
        assert_eq!(feed.path, PathBuf::from("database/notices.json"));
    }
}
