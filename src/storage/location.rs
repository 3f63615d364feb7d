use std::path::{Path, PathBuf};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const LOCK_FILE: &str = "build.lock";

/// The directory holding one logical index: both artifacts, the manifest
/// and the transient build lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLocation {
    root: PathBuf,
}

impl IndexLocation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.root.join(VECTORS_FILE)
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.root.join(CHUNKS_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// True when both index artifacts are on disk.
    pub fn has_artifacts(&self) -> bool {
        self.vectors_path().is_file() && self.chunks_path().is_file()
    }
}
