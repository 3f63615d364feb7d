//! Command implementations for the CLI.

pub mod index;
pub mod init;
pub mod query;
pub mod status;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::indexing::IndexCache;
use crate::semantic::{EmbeddingProvider, FastEmbedProvider, TimeoutEmbedder};

/// Load the configured model behind the timeout wrapper.
pub fn embedder_from_settings(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let cache_dir = settings.resolve(&settings.embedding.cache_dir);
    let model = &settings.embedding.model;
    let provider = FastEmbedProvider::from_config(&settings.embedding, cache_dir)
        .with_context(|| format!("Failed to load embedding model {model}"))?;

    Ok(Arc::new(TimeoutEmbedder::new(
        Arc::new(provider),
        Duration::from_secs(settings.embedding.timeout_secs),
    )))
}

/// Build the index cache the commands share.
pub fn cache_from_settings(settings: &Settings) -> Result<IndexCache> {
    let embedder = embedder_from_settings(settings)?;
    IndexCache::from_settings(settings, embedder).context("Invalid index configuration")
}
