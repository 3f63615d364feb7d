use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::documents::SourceError;
use crate::semantic::EmbeddingError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt index artifact {path}: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("Index build failed: {0}")]
    BuildFailed(#[source] Box<IndexError>),

    #[error("No usable index: {cause}")]
    IndexUnavailable {
        #[source]
        cause: Box<IndexError>,
    },
}

impl IndexError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap as a build failure unless it already is one.
    pub fn into_build_failed(self) -> Self {
        match self {
            IndexError::BuildFailed(_) => self,
            other => IndexError::BuildFailed(Box::new(other)),
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
