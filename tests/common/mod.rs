//! Shared fixtures for the index lifecycle tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use libdesk::documents::{ChunkingConfig, FeedConfig};
use libdesk::{
    DocumentKind, EmbeddingError, EmbeddingProvider, IndexBuilder, IndexCache, IndexLocation,
    JsonFeedSource,
};
use tempfile::TempDir;

/// Bag-of-words embedder: texts sharing words land close together.
pub struct WordEmbedder {
    dimension: usize,
    model_name: String,
    fail_marker: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl WordEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_name: "word-hash".to_string(),
            fail_marker: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for WordEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(EmbeddingError::Provider("model offline".to_string()));
            }
        }

        let mut vector = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if word.is_empty() {
                continue;
            }
            let hash = word
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            vector[hash as usize % self.dimension] += 1.0;
        }
        Ok(vector)
    }
}

/// A temp workspace with one notice feed and an index directory.
pub struct Workspace {
    pub dir: TempDir,
    pub feed: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let feed = dir.path().join("notices.json");
        Self { dir, feed }
    }

    pub fn index_root(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    pub fn location(&self) -> IndexLocation {
        IndexLocation::new(self.index_root())
    }

    /// Write notices as `(source, title, content)` triples.
    pub fn write_notices(&self, notices: &[(&str, &str, &str)]) {
        let items: Vec<serde_json::Value> = notices
            .iter()
            .map(|(source, title, content)| {
                serde_json::json!({
                    "source": source,
                    "title": title,
                    "author": "admin",
                    "date": "2024-03-01",
                    "content": content,
                })
            })
            .collect();
        std::fs::write(&self.feed, serde_json::to_string(&items).unwrap()).unwrap();
    }

    pub fn cache(&self, embedder: Arc<dyn EmbeddingProvider>) -> IndexCache {
        self.cache_with(embedder, ChunkingConfig::new(800, 200))
    }

    pub fn cache_with(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
    ) -> IndexCache {
        let feeds = [FeedConfig::new(&self.feed, DocumentKind::Notice)];
        let source = JsonFeedSource::new(self.dir.path(), &feeds);
        let builder = IndexBuilder::new(embedder, chunking).unwrap();
        IndexCache::new(
            self.location(),
            Arc::new(source),
            builder,
            Duration::from_secs(60),
        )
    }
}

pub fn remove(path: &Path) {
    std::fs::remove_file(path).unwrap();
}
