//! Turns raw records into a persisted search index.
//!
//! A build runs in two phases, following the order artifacts may be touched:
//! 1. Normalize, chunk and embed everything in memory
//! 2. Invalidate the manifest, write both artifacts, save the new manifest
//!
//! Any failure in phase 1 leaves the location exactly as it was.

use std::sync::Arc;

use crate::config::ConfigError;
use crate::documents::{
    ChunkId, Chunker, ChunkingConfig, Document, DocumentChunk, DocumentSource, RawRecord,
    chunker_for,
};
use crate::semantic::{EmbeddingProvider, embed_checked};
use crate::storage::{
    Fingerprint, IndexError, IndexLocation, IndexResult, Manifest, ManifestStore, SearchIndex,
};

/// Progress events emitted while building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProgress {
    /// All records normalized and split.
    Chunked { documents: usize, chunks: usize },
    /// `current` of `total` chunks embedded.
    Embedding { current: usize, total: usize },
}

/// Report progress every this many embedded chunks.
const PROGRESS_INTERVAL: usize = 32;

pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    chunker: Box<dyn Chunker>,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
    ) -> Result<Self, ConfigError> {
        chunking.validate()?;
        let chunker = chunker_for(chunking.strategy);
        Ok(Self {
            embedder,
            chunking,
            chunker,
        })
    }

    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Normalize and split records into chunks with sequential ids.
    pub fn chunk_records(&self, records: Vec<RawRecord>) -> IndexResult<Vec<DocumentChunk>> {
        let mut chunks = Vec::new();
        let mut next_id: u32 = 1;

        for record in records {
            let document = Document::from_raw(record);
            let pieces = self.chunker.chunk(&document.text, &self.chunking);
            if pieces.is_empty() {
                tracing::debug!(
                    target: "builder",
                    "{} produced no chunks",
                    document.source_id
                );
                continue;
            }

            for (position, piece) in pieces.into_iter().enumerate() {
                let id = ChunkId::from_u32(next_id)
                    .ok_or_else(|| IndexError::corrupt("<memory>", "chunk id overflow"))?;
                next_id = next_id
                    .checked_add(1)
                    .ok_or_else(|| IndexError::corrupt("<memory>", "chunk id overflow"))?;

                chunks.push(DocumentChunk {
                    id,
                    source_id: document.source_id.clone(),
                    position: position as u32,
                    content: piece.content,
                    meta: document.meta.clone(),
                });
            }
        }

        Ok(chunks)
    }

    /// Build an in-memory index. Touches no files.
    pub fn build(&self, records: Vec<RawRecord>) -> IndexResult<SearchIndex> {
        self.build_with_progress(records, |_| {})
    }

    /// Build an in-memory index, reporting progress.
    ///
    /// The embedder is called once per chunk; the first failure aborts.
    pub fn build_with_progress<F>(
        &self,
        records: Vec<RawRecord>,
        mut on_progress: F,
    ) -> IndexResult<SearchIndex>
    where
        F: FnMut(BuildProgress),
    {
        let documents = records.len();
        let chunks = self.chunk_records(records)?;
        let total = chunks.len();
        on_progress(BuildProgress::Chunked {
            documents,
            chunks: total,
        });

        let mut vectors = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let vector = embed_checked(self.embedder.as_ref(), &chunk.content).map_err(|e| {
                tracing::warn!(
                    target: "builder",
                    "embedding chunk {} of {} failed: {e}",
                    chunk.position,
                    chunk.source_id
                );
                e
            })?;
            vectors.push(vector);

            let current = i + 1;
            if current % PROGRESS_INTERVAL == 0 || current == total {
                on_progress(BuildProgress::Embedding { current, total });
            }
        }

        let index = SearchIndex::new(
            self.embedder.model_name(),
            self.embedder.dimension(),
            chunks,
            vectors,
        )?;

        tracing::info!(
            target: "builder",
            "built {} chunks from {documents} documents with {}",
            index.len(),
            self.embedder.model_name()
        );
        Ok(index)
    }

    /// Build from `source` and persist at `location`, recording `fingerprint`.
    ///
    /// The manifest is removed before the first artifact is replaced and
    /// written only after both artifacts are durable.
    pub fn build_at(
        &self,
        source: &dyn DocumentSource,
        location: &IndexLocation,
        fingerprint: Fingerprint,
    ) -> IndexResult<SearchIndex> {
        self.build_at_with_progress(source, location, fingerprint, |_| {})
    }

    pub fn build_at_with_progress<F>(
        &self,
        source: &dyn DocumentSource,
        location: &IndexLocation,
        fingerprint: Fingerprint,
        on_progress: F,
    ) -> IndexResult<SearchIndex>
    where
        F: FnMut(BuildProgress),
    {
        let records = source.records()?;
        let index = self.build_with_progress(records, on_progress)?;

        let manifests = ManifestStore::new(location);
        manifests.invalidate()?;
        index.persist(location)?;
        manifests.save(&Manifest::new(fingerprint, index.build_id()))?;

        tracing::info!(
            target: "builder",
            "index {} written to {}",
            index.build_id(),
            location.root().display()
        );
        Ok(index)
    }
}
