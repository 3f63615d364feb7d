//! fastembed-backed embedding provider.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::path::PathBuf;

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::{ConfigError, EmbeddingConfig};

/// Model names accepted in `embedding.model`.
const SUPPORTED_MODELS: &[(&str, EmbeddingModel)] = &[
    ("AllMiniLML6V2", EmbeddingModel::AllMiniLML6V2),
    ("BGESmallENV15", EmbeddingModel::BGESmallENV15),
    ("MultilingualE5Small", EmbeddingModel::MultilingualE5Small),
    ("MultilingualE5Base", EmbeddingModel::MultilingualE5Base),
    ("ParaphraseMLMiniLML12V2", EmbeddingModel::ParaphraseMLMiniLML12V2),
];

/// Parse a configured model name (case-insensitive).
pub fn parse_model(name: &str) -> Result<(&'static str, EmbeddingModel), ConfigError> {
    SUPPORTED_MODELS
        .iter()
        .find(|(canonical, _)| canonical.eq_ignore_ascii_case(name.trim()))
        .map(|(canonical, model)| (*canonical, model.clone()))
        .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
}

pub struct FastEmbedProvider {
    /// The embedding model (fastembed needs `&mut` to run a batch)
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Load the named model, downloading it into `cache_dir` on first use.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, EmbeddingError> {
        let (canonical, model) = parse_model(model_name)?;

        tracing::info!(
            target: "semantic",
            "loading embedding model {canonical} (cache: {})",
            cache_dir.display()
        );

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

        // Get dimensions by generating a test embedding
        let sample = text_model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;
        let dimension = sample
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::ModelInit("model returned no sample vector".into()))?;

        tracing::debug!(target: "semantic", "{canonical} produces {dimension}-dimensional vectors");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: canonical.to_string(),
            dimension,
        })
    }

    /// Create from settings; `cache_dir` is the already-resolved model directory.
    pub fn from_config(
        config: &EmbeddingConfig,
        cache_dir: PathBuf,
    ) -> Result<Self, EmbeddingError> {
        Self::new(&config.model, cache_dir, config.show_download_progress)
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self
            .model
            .lock()
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Provider("model returned no vector".to_string()))
    }
}
