//! Deterministic embedder for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{EmbeddingError, EmbeddingProvider};

/// Bag-of-words hashing embedder.
///
/// Texts sharing words get similar vectors, which is enough to make
/// retrieval order predictable in tests.
pub struct MockEmbedder {
    dimension: usize,
    reported_dimension: usize,
    model_name: String,
    fail_marker: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            reported_dimension: dimension,
            model_name: "mock-bow".to_string(),
            fail_marker: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model_name = name.to_string();
        self
    }

    /// Report a dimension different from the vectors actually produced.
    pub fn with_reported_dimension(mut self, dimension: usize) -> Self {
        self.reported_dimension = dimension;
        self
    }

    /// Fail every call whose text contains `marker`.
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

impl EmbeddingProvider for MockEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.reported_dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(EmbeddingError::Provider(format!("refused '{marker}'")));
            }
        }

        let mut vector = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let hash = word
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            vector[hash as usize % self.dimension] += 1.0;
        }
        Ok(vector)
    }
}
