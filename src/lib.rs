pub mod cli;
pub mod config;
pub mod documents;
pub mod indexing;
pub mod logging;
pub mod retrieve;
pub mod semantic;
pub mod storage;
pub mod utils;

pub use config::Settings;
pub use documents::{DocumentChunk, DocumentKind, DocumentSource, JsonFeedSource, RawRecord};
pub use indexing::{IndexBuilder, IndexCache, IndexHandle, IndexStatus};
pub use retrieve::{RetrievalError, RetrievalHit, RetrievalService};
pub use semantic::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, TimeoutEmbedder};
pub use storage::{IndexError, IndexGuard, IndexLocation, IndexResult, Manifest, ManifestStore};
