//! The persisted search index: a vectors artifact and a chunk metadata artifact.
//!
//! `vectors.bin` layout (little-endian):
//!
//! ```text
//! magic "LDXV" | version u32 | dimension u32 | count u32 | build id (16 bytes)
//! count * dimension f32 values, row-major
//! ```
//!
//! `chunks.json` repeats the build id, dimension and count so a loader can
//! detect a pair of artifacts written by different builds.

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

use super::atomic::{write_atomic, write_atomic_with};
use super::error::{IndexError, IndexResult};
use super::location::IndexLocation;
use crate::documents::DocumentChunk;
use crate::semantic::{EmbeddingError, cosine_similarity};

const VECTORS_MAGIC: &[u8; 4] = b"LDXV";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 32;

#[derive(Serialize, Deserialize)]
struct ChunksFile {
    version: u32,
    build_id: Uuid,
    dimension: usize,
    model_name: String,
    chunks: Vec<DocumentChunk>,
}

enum VectorData {
    /// Freshly built, still in memory.
    Owned(Vec<f32>),
    /// Loaded from disk; values start at `HEADER_LEN`.
    Mapped(Mmap),
}

/// Chunks plus their embeddings, queryable by cosine similarity.
///
/// Immutable once built. A rebuild produces a new value with a new build id.
pub struct SearchIndex {
    build_id: Uuid,
    model_name: String,
    dimension: usize,
    chunks: Vec<DocumentChunk>,
    vectors: VectorData,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("build_id", &self.build_id)
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("chunks", &self.chunks.len())
            .field("mapped", &matches!(self.vectors, VectorData::Mapped(_)))
            .finish()
    }
}

impl SearchIndex {
    /// Assemble an index from chunks and one vector per chunk.
    pub fn new(
        model_name: impl Into<String>,
        dimension: usize,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> IndexResult<Self> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::corrupt(
                "<memory>",
                format!("{} chunks but {} vectors", chunks.len(), vectors.len()),
            ));
        }

        let mut flat = Vec::with_capacity(dimension * vectors.len());
        for vector in vectors {
            if vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                }
                .into());
            }
            flat.extend(vector);
        }

        Ok(Self {
            build_id: Uuid::new_v4(),
            model_name: model_name.into(),
            dimension,
            chunks,
            vectors: VectorData::Owned(flat),
        })
    }

    pub fn build_id(&self) -> String {
        self.build_id.to_string()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    pub fn chunk(&self, position: usize) -> Option<&DocumentChunk> {
        self.chunks.get(position)
    }

    /// Is this index served from the memory-mapped artifact?
    pub fn is_mapped(&self) -> bool {
        matches!(self.vectors, VectorData::Mapped(_))
    }

    /// Embedding of the chunk at `position`.
    pub fn vector(&self, position: usize) -> Option<Cow<'_, [f32]>> {
        if position >= self.chunks.len() {
            return None;
        }
        let start = position * self.dimension;
        match &self.vectors {
            VectorData::Owned(values) => {
                Some(Cow::Borrowed(&values[start..start + self.dimension]))
            }
            VectorData::Mapped(map) => {
                let from = HEADER_LEN + start * 4;
                let bytes = &map[from..from + self.dimension * 4];
                Some(Cow::Owned(
                    bytes
                        .chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect(),
                ))
            }
        }
    }

    /// Top `k` chunk positions by cosine similarity, best first.
    ///
    /// Equal scores keep insertion order. NaN scores rank last.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .filter_map(|i| self.vector(i).map(|v| (i, cosine_similarity(query, &v))))
            .collect();

        let rank = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| {
            rank(b.1)
                .partial_cmp(&rank(a.1))
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Write both artifacts: vectors first, then chunk metadata.
    pub fn persist(&self, location: &IndexLocation) -> IndexResult<()> {
        location.ensure_exists()?;

        let count = self.len();
        write_atomic_with(&location.vectors_path(), |w| {
            w.write_all(VECTORS_MAGIC)?;
            w.write_all(&FORMAT_VERSION.to_le_bytes())?;
            w.write_all(&(self.dimension as u32).to_le_bytes())?;
            w.write_all(&(count as u32).to_le_bytes())?;
            w.write_all(self.build_id.as_bytes())?;
            for i in 0..count {
                if let Some(vector) = self.vector(i) {
                    for value in vector.iter() {
                        w.write_all(&value.to_le_bytes())?;
                    }
                }
            }
            Ok(())
        })?;

        let chunks_file = ChunksFile {
            version: FORMAT_VERSION,
            build_id: self.build_id,
            dimension: self.dimension,
            model_name: self.model_name.clone(),
            chunks: self.chunks.clone(),
        };
        write_atomic(&location.chunks_path(), &serde_json::to_vec(&chunks_file)?)?;

        tracing::debug!(
            target: "builder",
            "persisted build {} ({count} chunks, dimension {})",
            self.build_id,
            self.dimension
        );
        Ok(())
    }

    /// Load both artifacts, rejecting any pair that does not belong together.
    pub fn load(location: &IndexLocation) -> IndexResult<Self> {
        let chunks_path = location.chunks_path();
        let vectors_path = location.vectors_path();

        let chunks_data = read_artifact(&chunks_path)?;
        let chunks_file: ChunksFile = serde_json::from_slice(&chunks_data)
            .map_err(|e| IndexError::corrupt(&chunks_path, e.to_string()))?;
        if chunks_file.version != FORMAT_VERSION {
            return Err(IndexError::corrupt(
                &chunks_path,
                format!("unsupported version {}", chunks_file.version),
            ));
        }

        let file = open_artifact(&vectors_path)?;
        // SAFETY: artifacts are only ever replaced by rename, never written in
        // place, so the mapped file does not change underneath us.
        let map = unsafe { Mmap::map(&file)? };
        let header = parse_header(&vectors_path, &map)?;

        let count = chunks_file.chunks.len();
        if header.build_id != chunks_file.build_id {
            return Err(IndexError::corrupt(
                &vectors_path,
                format!(
                    "build id {} does not match chunk metadata {}",
                    header.build_id, chunks_file.build_id
                ),
            ));
        }
        if header.dimension != chunks_file.dimension || header.count != count {
            return Err(IndexError::corrupt(
                &vectors_path,
                format!(
                    "header says {} x {}, metadata says {} x {}",
                    header.count, header.dimension, count, chunks_file.dimension
                ),
            ));
        }
        let expected_len = HEADER_LEN + count * header.dimension * 4;
        if map.len() != expected_len {
            return Err(IndexError::corrupt(
                &vectors_path,
                format!("expected {expected_len} bytes, found {}", map.len()),
            ));
        }

        Ok(Self {
            build_id: chunks_file.build_id,
            model_name: chunks_file.model_name,
            dimension: header.dimension,
            chunks: chunks_file.chunks,
            vectors: VectorData::Mapped(map),
        })
    }
}

struct VectorsHeader {
    dimension: usize,
    count: usize,
    build_id: Uuid,
}

fn parse_header(path: &Path, bytes: &[u8]) -> IndexResult<VectorsHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(IndexError::corrupt(path, "truncated header"));
    }
    if &bytes[0..4] != VECTORS_MAGIC {
        return Err(IndexError::corrupt(path, "bad magic"));
    }

    let word = |at: usize| {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    };
    let version = word(4);
    if version != FORMAT_VERSION {
        return Err(IndexError::corrupt(path, format!("unsupported version {version}")));
    }

    let mut id = [0u8; 16];
    id.copy_from_slice(&bytes[16..32]);

    Ok(VectorsHeader {
        dimension: word(8) as usize,
        count: word(12) as usize,
        build_id: Uuid::from_bytes(id),
    })
}

fn read_artifact(path: &Path) -> IndexResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| missing_or_io(path, e))
}

fn open_artifact(path: &Path) -> IndexResult<File> {
    File::open(path).map_err(|e| missing_or_io(path, e))
}

fn missing_or_io(path: &Path, e: std::io::Error) -> IndexError {
    if e.kind() == std::io::ErrorKind::NotFound {
        IndexError::corrupt(path, "missing")
    } else {
        IndexError::Io(e)
    }
}
