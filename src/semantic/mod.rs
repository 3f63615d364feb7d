//! Embedding providers.
//!
//! The index builder and retrieval path only see `EmbeddingProvider`; the
//! fastembed model and the timeout wrapper plug in behind it.

mod embedder;
#[cfg(test)]
pub(crate) mod mock;
mod provider;
mod timeout;

pub use embedder::{FastEmbedProvider, parse_model};
pub use provider::{EmbeddingError, EmbeddingProvider, cosine_similarity, embed_checked};
pub use timeout::TimeoutEmbedder;
