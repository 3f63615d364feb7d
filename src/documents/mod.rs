//! Corpus records, normalization and chunking.
//!
//! This module provides:
//! - Raw record sources (the crawler's JSON feeds)
//! - Kind-aware normalization of records into documents
//! - Recursive chunking with configurable size and overlap

pub mod chunker;
pub mod config;
pub mod source;
pub mod types;

pub use chunker::{Chunker, RawChunk, RecursiveChunker, chunker_for};
pub use config::{ChunkingConfig, ChunkingStrategy, FeedConfig};
pub use source::{DocumentSource, JsonFeedSource, SourceError, StaticSource};
pub use types::{ChunkId, Document, DocumentChunk, DocumentKind, DocumentMeta, RawRecord};
