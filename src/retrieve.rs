//! Top-k retrieval over a loaded index.
//!
//! Pure read path: embeds the query with the index's provider and ranks
//! chunks by cosine similarity. Works the same against a degraded handle.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::documents::{DocumentKind, DocumentMeta};
use crate::indexing::IndexHandle;
use crate::semantic::{EmbeddingError, EmbeddingProvider};

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("k must be greater than zero")]
    InvalidK,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Index was built with model {index}, query provider is {provider}")]
    ModelMismatch { index: String, provider: String },

    #[error("Query vector has dimension {actual}, index has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// One retrieved chunk with its citation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub chunk_id: u32,
    pub source_id: String,
    pub kind: DocumentKind,
    /// Order of the chunk within its document.
    pub position: u32,
    pub content: String,
    pub meta: DocumentMeta,
    pub score: f32,
}

pub struct RetrievalService {
    handle: IndexHandle,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalService {
    /// `embedder` must be the provider the index was built with.
    pub fn new(handle: IndexHandle, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { handle, embedder }
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Return at most `k` chunks, best first.
    ///
    /// Ties keep insertion order; NaN scores rank last.
    pub fn query(&self, text: &str, k: usize) -> RetrievalResult<Vec<RetrievalHit>> {
        if k == 0 {
            return Err(RetrievalError::InvalidK);
        }
        if text.trim().is_empty() {
            tracing::debug!(target: "retrieve", "empty query, nothing to retrieve");
            return Ok(Vec::new());
        }

        let index = self.handle.index();
        if self.embedder.model_name() != index.model_name() {
            return Err(RetrievalError::ModelMismatch {
                index: index.model_name().to_string(),
                provider: self.embedder.model_name().to_string(),
            });
        }

        let query = self.embedder.embed(text)?;
        if query.len() != index.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: index.dimension(),
                actual: query.len(),
            });
        }

        let hits: Vec<RetrievalHit> = index
            .nearest(&query, k)
            .into_iter()
            .filter_map(|(position, score)| {
                index.chunk(position).map(|chunk| RetrievalHit {
                    chunk_id: chunk.id.get(),
                    source_id: chunk.source_id.clone(),
                    kind: chunk.kind(),
                    position: chunk.position,
                    content: chunk.content.clone(),
                    meta: chunk.meta.clone(),
                    score,
                })
            })
            .collect();

        tracing::debug!(
            target: "retrieve",
            "query '{}' -> {} hits (k={k}, {} chunks scanned)",
            crate::utils::preview(text, 40),
            hits.len(),
            index.len()
        );
        Ok(hits)
    }
}
