//! Bounded embedding calls.
//!
//! Each call runs on a worker thread and the caller waits on a channel with
//! `recv_timeout`. A call that overruns is abandoned: its thread finishes in
//! the background and the result is dropped.

use crossbeam_channel::{RecvTimeoutError, bounded};
use std::sync::Arc;
use std::time::Duration;

use super::{EmbeddingError, EmbeddingProvider};

pub struct TimeoutEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl TimeoutEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl EmbeddingProvider for TimeoutEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let (sender, receiver) = bounded(1);
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        std::thread::Builder::new()
            .name("libdesk-embed".to_string())
            .spawn(move || {
                // The receiver is gone if the caller already timed out.
                let _ = sender.send(inner.embed(&text));
            })
            .map_err(|e| EmbeddingError::Provider(format!("failed to spawn worker: {e}")))?;

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    target: "semantic",
                    "embedding call exceeded {:?}, abandoning",
                    self.timeout
                );
                Err(EmbeddingError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(EmbeddingError::Provider(
                "embedding worker exited without a result".to_string(),
            )),
        }
    }
}
